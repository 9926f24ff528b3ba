//! Schema validation for candidate chapter records.
//!
//! Validation is a pure function over untyped JSON: every problem found in a
//! record is reported, not only the first one, and unknown keys are rejected.

use serde_json::{Map, Value};
use thiserror::Error;

use super::chapters::{ALLOWED_YEARS, ChapterStatus, NewChapter, YearWiseCounts};

const SUBJECT: &str = "subject";
const CHAPTER: &str = "chapter";
const CLASS: &str = "class";
const UNIT: &str = "unit";
const YEAR_WISE: &str = "yearWiseQuestionCount";
const SOLVED: &str = "questionSolved";
const STATUS: &str = "status";
const WEAK: &str = "isWeakChapter";

const KNOWN_FIELDS: [&str; 8] = [SUBJECT, CHAPTER, CLASS, UNIT, YEAR_WISE, SOLVED, STATUS, WEAK];

/// One problem with one field of a candidate record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldIssue {
    pub path: String,
    pub kind: IssueKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssueKind {
    Required,
    NotAllowed,
    Empty,
    NotString,
    NotNumber,
    NotInteger,
    Negative,
    TooLarge,
    NotBoolean,
    NotObject,
    NoEntries,
    InvalidStatus,
}

impl FieldIssue {
    fn new(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }

    pub fn message(&self) -> String {
        let path = &self.path;
        match self.kind {
            IssueKind::Required => format!("\"{path}\" is required"),
            IssueKind::NotAllowed => format!("\"{path}\" is not allowed"),
            IssueKind::Empty => format!("\"{path}\" is not allowed to be empty"),
            IssueKind::NotString => format!("\"{path}\" must be a string"),
            IssueKind::NotNumber => format!("\"{path}\" must be a number"),
            IssueKind::NotInteger => format!("\"{path}\" must be an integer"),
            IssueKind::Negative => format!("\"{path}\" must be greater than or equal to 0"),
            IssueKind::TooLarge => format!("\"{path}\" must be less than or equal to {}", u32::MAX),
            IssueKind::NotBoolean => format!("\"{path}\" must be a boolean"),
            IssueKind::NotObject => format!("\"{path}\" must be of type object"),
            IssueKind::NoEntries => format!("\"{path}\" must have at least 1 key"),
            IssueKind::InvalidStatus => {
                let allowed = ChapterStatus::ALL.map(ChapterStatus::as_str).join(", ");
                format!("\"{path}\" must be one of [{allowed}]")
            }
        }
    }
}

/// Every issue found in one candidate record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", self.message())]
pub struct ChapterValidationError {
    pub issues: Vec<FieldIssue>,
}

impl ChapterValidationError {
    /// Issue messages joined with `, `.
    pub fn message(&self) -> String {
        self.issues
            .iter()
            .map(FieldIssue::message)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Default)]
struct Issues(Vec<FieldIssue>);

impl Issues {
    fn check<T>(&mut self, result: Result<T, FieldIssue>) -> Option<T> {
        result.map_err(|issue| self.0.push(issue)).ok()
    }

    fn check_all<T>(&mut self, result: Result<T, Vec<FieldIssue>>) -> Option<T> {
        result.map_err(|issues| self.0.extend(issues)).ok()
    }
}

/// Validate a candidate chapter, producing a trimmed draft ready to persist.
pub fn validate_chapter(candidate: &Value) -> Result<NewChapter, ChapterValidationError> {
    let Some(object) = candidate.as_object() else {
        return Err(ChapterValidationError {
            issues: vec![FieldIssue::new("value", IssueKind::NotObject)],
        });
    };

    let mut issues = Issues::default();
    let subject = issues.check(required_text(object, SUBJECT));
    let chapter = issues.check(required_text(object, CHAPTER));
    let class = issues.check(required_text(object, CLASS));
    let unit = issues.check(required_text(object, UNIT));
    let year_wise = issues.check_all(year_wise_counts(object));
    let solved = issues.check(required_count(object, SOLVED));
    let status = issues.check(required_status(object));
    let weak = issues.check(required_bool(object, WEAK));

    for key in object.keys() {
        if !KNOWN_FIELDS.contains(&key.as_str()) {
            issues.0.push(FieldIssue::new(key.as_str(), IssueKind::NotAllowed));
        }
    }

    if !issues.0.is_empty() {
        return Err(ChapterValidationError { issues: issues.0 });
    }

    let (
        Some(subject),
        Some(chapter),
        Some(class),
        Some(unit),
        Some(year_wise_question_count),
        Some(question_solved),
        Some(status),
        Some(is_weak_chapter),
    ) = (subject, chapter, class, unit, year_wise, solved, status, weak)
    else {
        return Err(ChapterValidationError { issues: issues.0 });
    };

    Ok(NewChapter {
        subject,
        chapter,
        class,
        unit,
        year_wise_question_count,
        question_solved,
        status,
        is_weak_chapter,
    })
}

fn present<'a>(object: &'a Map<String, Value>, field: &str) -> Result<&'a Value, FieldIssue> {
    object
        .get(field)
        .ok_or_else(|| FieldIssue::new(field, IssueKind::Required))
}

fn required_text(object: &Map<String, Value>, field: &str) -> Result<String, FieldIssue> {
    let value = present(object, field)?
        .as_str()
        .ok_or_else(|| FieldIssue::new(field, IssueKind::NotString))?;
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldIssue::new(field, IssueKind::Empty));
    }
    Ok(trimmed.to_string())
}

fn count(value: &Value, path: &str) -> Result<u32, FieldIssue> {
    let Value::Number(number) = value else {
        return Err(FieldIssue::new(path, IssueKind::NotNumber));
    };
    if let Some(unsigned) = number.as_u64() {
        return u32::try_from(unsigned).map_err(|_| FieldIssue::new(path, IssueKind::TooLarge));
    }
    if number.as_i64().is_some() {
        return Err(FieldIssue::new(path, IssueKind::Negative));
    }
    match number.as_f64() {
        Some(float) if float < 0.0 => Err(FieldIssue::new(path, IssueKind::Negative)),
        Some(float) if float.fract() == 0.0 && float <= f64::from(u32::MAX) => Ok(float as u32),
        Some(float) if float.fract() == 0.0 => Err(FieldIssue::new(path, IssueKind::TooLarge)),
        _ => Err(FieldIssue::new(path, IssueKind::NotInteger)),
    }
}

fn required_count(object: &Map<String, Value>, field: &str) -> Result<u32, FieldIssue> {
    count(present(object, field)?, field)
}

fn required_bool(object: &Map<String, Value>, field: &str) -> Result<bool, FieldIssue> {
    present(object, field)?
        .as_bool()
        .ok_or_else(|| FieldIssue::new(field, IssueKind::NotBoolean))
}

fn required_status(object: &Map<String, Value>) -> Result<ChapterStatus, FieldIssue> {
    let raw = present(object, STATUS)?
        .as_str()
        .ok_or_else(|| FieldIssue::new(STATUS, IssueKind::NotString))?;
    raw.parse()
        .map_err(|_| FieldIssue::new(STATUS, IssueKind::InvalidStatus))
}

fn year_wise_counts(object: &Map<String, Value>) -> Result<YearWiseCounts, Vec<FieldIssue>> {
    let entries = present(object, YEAR_WISE)
        .map_err(|issue| vec![issue])?
        .as_object()
        .ok_or_else(|| vec![FieldIssue::new(YEAR_WISE, IssueKind::NotObject)])?;

    if entries.is_empty() {
        return Err(vec![FieldIssue::new(YEAR_WISE, IssueKind::NoEntries)]);
    }

    let mut counts = YearWiseCounts::new();
    let mut issues = Vec::new();
    for (year, value) in entries {
        let path = format!("{YEAR_WISE}.{year}");
        if !ALLOWED_YEARS.contains(&year.as_str()) {
            issues.push(FieldIssue::new(path, IssueKind::NotAllowed));
            continue;
        }
        match count(value, &path) {
            Ok(value) => {
                counts.insert(year.clone(), value);
            }
            Err(issue) => issues.push(issue),
        }
    }

    if issues.is_empty() {
        Ok(counts)
    } else {
        Err(issues)
    }
}
