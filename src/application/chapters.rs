//! Chapter reads and bulk ingest.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::application::repos::{
    ChapterQueryFilter, ChaptersRepo, ChaptersWriteRepo, InsertOutcome, RepoError,
};
use crate::cache::CacheInvalidator;
use crate::domain::chapters::{ChapterRecord, NewChapter};
use crate::domain::validation::validate_chapter;

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Error)]
pub enum ChapterServiceError {
    #[error("invalid pagination parameters")]
    InvalidPagination,
    #[error("chapter not found")]
    NotFound,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Raw list query parameters, exactly as they arrive on the query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ChapterListQuery {
    pub class: Option<String>,
    pub unit: Option<String>,
    pub status: Option<String>,
    #[serde(rename = "weakChapters")]
    pub weak_chapters: Option<String>,
    pub subject: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl ChapterListQuery {
    pub fn filter(&self) -> ChapterQueryFilter {
        ChapterQueryFilter {
            class: present(&self.class).map(str::to_string),
            unit: present(&self.unit).map(str::to_string),
            status: present(&self.status).map(str::to_string),
            is_weak_chapter: match present(&self.weak_chapters) {
                Some("true") => Some(true),
                Some("false") => Some(false),
                _ => None,
            },
            subject: present(&self.subject).map(str::to_string),
        }
    }

    pub fn pagination(&self) -> Result<Pagination, ChapterServiceError> {
        Ok(Pagination {
            page: positive(&self.page, DEFAULT_PAGE)?,
            limit: positive(&self.limit, DEFAULT_LIMIT)?,
        })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|value| !value.is_empty())
}

fn positive(value: &Option<String>, default: u32) -> Result<u32, ChapterServiceError> {
    match present(value) {
        None => Ok(default),
        Some(raw) => raw
            .parse::<u32>()
            .ok()
            .filter(|parsed| *parsed > 0)
            .ok_or(ChapterServiceError::InvalidPagination),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub limit: u32,
}

impl Pagination {
    pub fn skip(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.limit)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterPage {
    pub total: u64,
    pub page: u32,
    pub limit: u32,
    pub chapters: Vec<ChapterRecord>,
}

/// A rejected input record and why it was rejected.
#[derive(Debug, Clone, Serialize)]
pub struct FailedChapter {
    pub chapter: Value,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub attempted: usize,
    pub success_count: usize,
    pub failed: Vec<FailedChapter>,
    pub invalidated: u64,
}

#[derive(Clone)]
pub struct ChapterService {
    reader: Arc<dyn ChaptersRepo>,
    writer: Arc<dyn ChaptersWriteRepo>,
    invalidator: CacheInvalidator,
}

impl ChapterService {
    pub fn new(
        reader: Arc<dyn ChaptersRepo>,
        writer: Arc<dyn ChaptersWriteRepo>,
        invalidator: CacheInvalidator,
    ) -> Self {
        Self {
            reader,
            writer,
            invalidator,
        }
    }

    pub async fn list(&self, query: &ChapterListQuery) -> Result<ChapterPage, ChapterServiceError> {
        let pagination = query.pagination()?;
        let filter = query.filter();

        let total = self.reader.count_chapters(&filter).await?;
        let chapters = self
            .reader
            .list_chapters(&filter, pagination.skip(), u64::from(pagination.limit))
            .await?;

        Ok(ChapterPage {
            total,
            page: pagination.page,
            limit: pagination.limit,
            chapters,
        })
    }

    pub async fn ping_store(&self) -> Result<(), ChapterServiceError> {
        self.reader.ping().await.map_err(Into::into)
    }

    /// Look up one chapter. Ids that are not UUIDs cannot exist.
    pub async fn get(&self, id: &str) -> Result<ChapterRecord, ChapterServiceError> {
        let id = Uuid::parse_str(id).map_err(|_| ChapterServiceError::NotFound)?;
        self.reader
            .find_chapter(id)
            .await?
            .ok_or(ChapterServiceError::NotFound)
    }

    /// Validate a batch, persist what passes, and drop cached reads if anything landed.
    pub async fn ingest(&self, batch: Vec<Value>) -> Result<IngestReport, ChapterServiceError> {
        let mut report = self.persist(batch).await?;
        if report.success_count > 0 {
            report.invalidated = self.invalidator.invalidate_all().await;
        }
        Ok(report)
    }

    /// Replace the whole collection with the valid records of `batch`.
    pub async fn replace_all(
        &self,
        batch: Vec<Value>,
    ) -> Result<IngestReport, ChapterServiceError> {
        let deleted = self.writer.delete_all_chapters().await?;
        info!(
            target = "chapterdash::application::chapters",
            deleted, "cleared chapter collection"
        );
        let mut report = self.persist(batch).await?;
        if deleted > 0 || report.success_count > 0 {
            report.invalidated = self.invalidator.invalidate_all().await;
        }
        Ok(report)
    }

    async fn persist(&self, batch: Vec<Value>) -> Result<IngestReport, ChapterServiceError> {
        let attempted = batch.len();
        let mut failures: Vec<(usize, FailedChapter)> = Vec::new();
        let mut valid: Vec<(usize, NewChapter)> = Vec::new();

        for (index, candidate) in batch.iter().enumerate() {
            match validate_chapter(candidate) {
                Ok(chapter) => valid.push((index, chapter)),
                Err(err) => failures.push((
                    index,
                    FailedChapter {
                        chapter: candidate.clone(),
                        error: err.to_string(),
                    },
                )),
            }
        }

        let mut success_count = 0;
        if !valid.is_empty() {
            let (positions, chapters): (Vec<usize>, Vec<NewChapter>) = valid.into_iter().unzip();
            let InsertOutcome {
                inserted,
                failures: write_failures,
            } = self.writer.insert_chapters(chapters).await?;
            success_count = inserted.len();

            for failure in write_failures {
                let Some(&index) = positions.get(failure.index) else {
                    continue;
                };
                failures.push((
                    index,
                    FailedChapter {
                        chapter: batch[index].clone(),
                        error: failure.error.to_string(),
                    },
                ));
            }
        }

        failures.sort_by_key(|(index, _)| *index);

        info!(
            target = "chapterdash::application::chapters",
            attempted,
            succeeded = success_count,
            failed = failures.len(),
            "chapter batch processed"
        );

        Ok(IngestReport {
            attempted,
            success_count,
            failed: failures.into_iter().map(|(_, failed)| failed).collect(),
            invalidated: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;

    use crate::cache::{CacheClient, CacheKeys, InMemoryBackend};
    use crate::infra::memory::InMemoryChaptersRepo;

    fn valid(subject: &str, chapter: &str) -> Value {
        json!({
            "subject": subject,
            "chapter": chapter,
            "class": "11",
            "unit": "1",
            "yearWiseQuestionCount": {"2024": 3},
            "questionSolved": 1,
            "status": "Completed",
            "isWeakChapter": true
        })
    }

    fn service() -> (ChapterService, Arc<InMemoryChaptersRepo>, CacheClient) {
        let repo = Arc::new(InMemoryChaptersRepo::new());
        let client = CacheClient::new(Arc::new(InMemoryBackend::new()), Duration::from_secs(1));
        let invalidator = CacheInvalidator::new(client.clone(), CacheKeys::default());
        (
            ChapterService::new(repo.clone(), repo.clone(), invalidator),
            repo,
            client,
        )
    }

    #[test]
    fn pagination_defaults_and_rejects_bad_values() {
        let query = ChapterListQuery::default();
        assert_eq!(
            query.pagination().unwrap(),
            Pagination { page: 1, limit: 10 }
        );

        let query = ChapterListQuery {
            page: Some("3".into()),
            limit: Some("".into()),
            ..Default::default()
        };
        assert_eq!(query.pagination().unwrap().skip(), 20);

        for bad in ["0", "-1", "abc", "1.5"] {
            let query = ChapterListQuery {
                limit: Some(bad.into()),
                ..Default::default()
            };
            assert!(matches!(
                query.pagination(),
                Err(ChapterServiceError::InvalidPagination)
            ));
        }
    }

    #[test]
    fn weak_flag_filter_only_accepts_booleans() {
        let mut query = ChapterListQuery {
            weak_chapters: Some("true".into()),
            class: Some("".into()),
            ..Default::default()
        };
        assert_eq!(query.filter().is_weak_chapter, Some(true));
        assert_eq!(query.filter().class, None);

        query.weak_chapters = Some("yes".into());
        assert_eq!(query.filter().is_weak_chapter, None);
    }

    #[tokio::test]
    async fn ingest_reports_failures_in_input_order() {
        let (service, repo, _) = service();
        let batch = vec![
            json!({"subject": "X"}),
            valid("Physics", "Optics"),
            json!("not an object"),
            valid("Chemistry", "Bonds"),
        ];

        let report = service.ingest(batch).await.unwrap();
        assert_eq!(report.attempted, 4);
        assert_eq!(report.success_count, 2);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].chapter, json!({"subject": "X"}));
        assert!(report.failed[0].error.contains("\"chapter\" is required"));
        assert_eq!(report.failed[1].chapter, json!("not an object"));
        assert_eq!(repo.len(), 2);
    }

    #[tokio::test]
    async fn ingest_invalidates_only_when_something_landed() {
        let (service, _, client) = service();
        client
            .set("chapters::::::1:10", "{}", Duration::from_secs(60))
            .await
            .unwrap();

        let report = service.ingest(vec![json!({})]).await.unwrap();
        assert_eq!(report.success_count, 0);
        assert_eq!(report.invalidated, 0);
        assert!(client.get("chapters::::::1:10").await.unwrap().is_some());

        let report = service
            .ingest(vec![valid("Physics", "Optics")])
            .await
            .unwrap();
        assert_eq!(report.invalidated, 1);
        assert!(client.get("chapters::::::1:10").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_sorts_and_paginates() {
        let (service, _, _) = service();
        service
            .ingest(vec![
                valid("Physics", "Optics"),
                valid("Chemistry", "Bonds"),
                valid("Physics", "Kinematics"),
            ])
            .await
            .unwrap();

        let page = service
            .list(&ChapterListQuery {
                subject: Some("Physics".into()),
                limit: Some("1".into()),
                page: Some("2".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.chapters.len(), 1);
        assert_eq!(page.chapters[0].chapter, "Optics");
    }

    #[tokio::test]
    async fn get_treats_malformed_ids_as_missing() {
        let (service, _, _) = service();
        assert!(matches!(
            service.get("not-a-uuid").await,
            Err(ChapterServiceError::NotFound)
        ));
        assert!(matches!(
            service.get(&Uuid::new_v4().to_string()).await,
            Err(ChapterServiceError::NotFound)
        ));
    }

    #[tokio::test]
    async fn replace_all_swaps_the_collection() {
        let (service, repo, _) = service();
        service
            .ingest(vec![valid("Physics", "Optics")])
            .await
            .unwrap();

        let report = service
            .replace_all(vec![valid("Biology", "Cells"), valid("Biology", "Genetics")])
            .await
            .unwrap();
        assert_eq!(report.success_count, 2);
        assert_eq!(repo.len(), 2);
    }
}
