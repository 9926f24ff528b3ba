//! In-process chapter repository with the same ordering and filter semantics
//! as the Postgres adapter. Used by tests and local tooling.

use std::sync::RwLock;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::repos::{
    ChapterQueryFilter, ChaptersRepo, ChaptersWriteRepo, InsertOutcome, RepoError,
};
use crate::domain::chapters::{ChapterRecord, NewChapter};

#[derive(Debug, Default)]
pub struct InMemoryChaptersRepo {
    records: RwLock<Vec<ChapterRecord>>,
}

impl InMemoryChaptersRepo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().map(|records| records.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, Vec<ChapterRecord>>, RepoError> {
        self.records
            .read()
            .map_err(|_| RepoError::from_persistence("chapter store lock poisoned"))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, Vec<ChapterRecord>>, RepoError> {
        self.records
            .write()
            .map_err(|_| RepoError::from_persistence("chapter store lock poisoned"))
    }
}

fn matches(record: &ChapterRecord, filter: &ChapterQueryFilter) -> bool {
    filter.class.as_ref().is_none_or(|class| &record.class == class)
        && filter.unit.as_ref().is_none_or(|unit| &record.unit == unit)
        && filter
            .status
            .as_ref()
            .is_none_or(|status| record.status.as_str() == status)
        && filter
            .is_weak_chapter
            .is_none_or(|weak| record.is_weak_chapter == weak)
        && filter
            .subject
            .as_ref()
            .is_none_or(|subject| &record.subject == subject)
}

#[async_trait]
impl ChaptersRepo for InMemoryChaptersRepo {
    async fn count_chapters(&self, filter: &ChapterQueryFilter) -> Result<u64, RepoError> {
        let records = self.read()?;
        Ok(records.iter().filter(|record| matches(record, filter)).count() as u64)
    }

    async fn list_chapters(
        &self,
        filter: &ChapterQueryFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<ChapterRecord>, RepoError> {
        let records = self.read()?;
        let mut matching: Vec<&ChapterRecord> = records
            .iter()
            .filter(|record| matches(record, filter))
            .collect();
        matching.sort_by(|a, b| {
            (&a.subject, &a.chapter, a.id).cmp(&(&b.subject, &b.chapter, b.id))
        });

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(matching.into_iter().skip(skip).take(limit).cloned().collect())
    }

    async fn find_chapter(&self, id: Uuid) -> Result<Option<ChapterRecord>, RepoError> {
        let records = self.read()?;
        Ok(records.iter().find(|record| record.id == id).cloned())
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.read().map(|_| ())
    }
}

#[async_trait]
impl ChaptersWriteRepo for InMemoryChaptersRepo {
    async fn insert_chapters(&self, chapters: Vec<NewChapter>) -> Result<InsertOutcome, RepoError> {
        let now = OffsetDateTime::now_utc();
        let inserted: Vec<ChapterRecord> = chapters
            .into_iter()
            .map(|chapter| ChapterRecord::from_new(Uuid::new_v4(), chapter, now))
            .collect();

        self.write()?.extend(inserted.iter().cloned());
        Ok(InsertOutcome {
            inserted,
            failures: Vec::new(),
        })
    }

    async fn delete_all_chapters(&self) -> Result<u64, RepoError> {
        let mut records = self.write()?;
        let removed = records.len() as u64;
        records.clear();
        Ok(removed)
    }
}
