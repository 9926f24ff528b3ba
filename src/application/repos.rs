//! Repository traits describing persistence adapters.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::chapters::{ChapterRecord, NewChapter};

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("integrity error: {message}")]
    Integrity { message: String },
    #[error("database timeout")]
    Timeout,
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }
}

/// Equality filters for the chapter list. `None` leaves a field unconstrained.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterQueryFilter {
    pub class: Option<String>,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub is_weak_chapter: Option<bool>,
    pub subject: Option<String>,
}

/// A record that could not be written, by position in the submitted batch.
#[derive(Debug)]
pub struct InsertFailure {
    pub index: usize,
    pub error: RepoError,
}

/// Result of an unordered bulk insert: whatever could be written was written.
#[derive(Debug, Default)]
pub struct InsertOutcome {
    pub inserted: Vec<ChapterRecord>,
    pub failures: Vec<InsertFailure>,
}

#[async_trait]
pub trait ChaptersRepo: Send + Sync {
    async fn count_chapters(&self, filter: &ChapterQueryFilter) -> Result<u64, RepoError>;

    /// Matching chapters ordered by subject, then chapter.
    async fn list_chapters(
        &self,
        filter: &ChapterQueryFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<ChapterRecord>, RepoError>;

    async fn find_chapter(&self, id: Uuid) -> Result<Option<ChapterRecord>, RepoError>;

    /// Cheap liveness probe against the store.
    async fn ping(&self) -> Result<(), RepoError>;
}

#[async_trait]
pub trait ChaptersWriteRepo: Send + Sync {
    async fn insert_chapters(&self, chapters: Vec<NewChapter>) -> Result<InsertOutcome, RepoError>;

    async fn delete_all_chapters(&self) -> Result<u64, RepoError>;
}
