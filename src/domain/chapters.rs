//! Chapter records and their closed value sets.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::error::DomainError;

/// Years accepted as keys of `yearWiseQuestionCount`.
pub const ALLOWED_YEARS: [&str; 7] = ["2019", "2020", "2021", "2022", "2023", "2024", "2025"];

/// Per-year question counts, ordered by year so serialization is stable.
pub type YearWiseCounts = BTreeMap<String, u32>;

/// Progress of a student through a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChapterStatus {
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "In Progress")]
    InProgress,
    #[serde(rename = "Completed")]
    Completed,
}

impl ChapterStatus {
    pub const ALL: [ChapterStatus; 3] = [Self::NotStarted, Self::InProgress, Self::Completed];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "Not Started",
            Self::InProgress => "In Progress",
            Self::Completed => "Completed",
        }
    }
}

impl Display for ChapterStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChapterStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown chapter status `{s}`")))
    }
}

/// A validated chapter that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChapter {
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    pub year_wise_question_count: YearWiseCounts,
    pub question_solved: u32,
    pub status: ChapterStatus,
    pub is_weak_chapter: bool,
}

/// A chapter as stored and served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterRecord {
    pub id: Uuid,
    pub subject: String,
    pub chapter: String,
    pub class: String,
    pub unit: String,
    pub year_wise_question_count: YearWiseCounts,
    pub question_solved: u32,
    pub status: ChapterStatus,
    pub is_weak_chapter: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl ChapterRecord {
    /// Materialize a stored record from a validated draft.
    pub fn from_new(id: Uuid, chapter: NewChapter, at: OffsetDateTime) -> Self {
        Self {
            id,
            subject: chapter.subject,
            chapter: chapter.chapter,
            class: chapter.class,
            unit: chapter.unit,
            year_wise_question_count: chapter.year_wise_question_count,
            question_solved: chapter.question_solved,
            status: chapter.status,
            is_weak_chapter: chapter.is_weak_chapter,
            created_at: at,
            updated_at: at,
        }
    }
}
