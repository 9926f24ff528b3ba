use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, types::Json};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::{
    application::repos::{
        ChapterQueryFilter, ChaptersRepo, ChaptersWriteRepo, InsertFailure, InsertOutcome,
        RepoError,
    },
    domain::chapters::{ChapterRecord, NewChapter, YearWiseCounts},
};

use super::{PostgresRepositories, map_sqlx_error};

const CHAPTER_COLUMNS: &str = "id, subject, chapter, class, unit, year_wise_question_count, \
    question_solved, status, is_weak_chapter, created_at, updated_at";

// 11 binds per row keeps each statement well under the 65535 parameter cap.
const INSERT_CHUNK_ROWS: usize = 1000;

#[derive(sqlx::FromRow)]
struct ChapterRow {
    id: Uuid,
    subject: String,
    chapter: String,
    class: String,
    unit: String,
    year_wise_question_count: Json<YearWiseCounts>,
    question_solved: i64,
    status: String,
    is_weak_chapter: bool,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
}

impl TryFrom<ChapterRow> for ChapterRecord {
    type Error = RepoError;

    fn try_from(row: ChapterRow) -> Result<Self, Self::Error> {
        let status = row.status.parse().map_err(|_| RepoError::Integrity {
            message: format!("chapter `{}` has unknown status `{}`", row.id, row.status),
        })?;
        let question_solved = u32::try_from(row.question_solved).map_err(|_| RepoError::Integrity {
            message: format!("chapter `{}` has out-of-range questionSolved", row.id),
        })?;

        Ok(Self {
            id: row.id,
            subject: row.subject,
            chapter: row.chapter,
            class: row.class,
            unit: row.unit,
            year_wise_question_count: row.year_wise_question_count.0,
            question_solved,
            status,
            is_weak_chapter: row.is_weak_chapter,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn rows_into_records(rows: Vec<ChapterRow>) -> Result<Vec<ChapterRecord>, RepoError> {
    rows.into_iter().map(ChapterRecord::try_from).collect()
}

impl PostgresRepositories {
    async fn insert_batch(
        &self,
        chapters: &[NewChapter],
        now: OffsetDateTime,
    ) -> Result<Vec<ChapterRecord>, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO chapters ({CHAPTER_COLUMNS}) "));
        qb.push_values(chapters, |mut row, chapter| {
            row.push_bind(Uuid::new_v4())
                .push_bind(chapter.subject.as_str())
                .push_bind(chapter.chapter.as_str())
                .push_bind(chapter.class.as_str())
                .push_bind(chapter.unit.as_str())
                .push_bind(Json(&chapter.year_wise_question_count))
                .push_bind(i64::from(chapter.question_solved))
                .push_bind(chapter.status.as_str())
                .push_bind(chapter.is_weak_chapter)
                .push_bind(now)
                .push_bind(now);
        });
        qb.push(format!(" RETURNING {CHAPTER_COLUMNS}"));

        let rows = qb
            .build_query_as::<ChapterRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows_into_records(rows)
    }
}

#[async_trait]
impl ChaptersRepo for PostgresRepositories {
    async fn count_chapters(&self, filter: &ChapterQueryFilter) -> Result<u64, RepoError> {
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM chapters WHERE 1=1");
        Self::apply_chapter_filter(&mut qb, filter);

        let count: i64 = qb
            .build_query_scalar()
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        Self::convert_count(count)
    }

    async fn list_chapters(
        &self,
        filter: &ChapterQueryFilter,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<ChapterRecord>, RepoError> {
        let offset = i64::try_from(skip)
            .map_err(|_| RepoError::from_persistence("offset exceeds supported range"))?;
        let limit = i64::try_from(limit)
            .map_err(|_| RepoError::from_persistence("limit exceeds supported range"))?;

        let mut qb =
            QueryBuilder::<Postgres>::new(format!("SELECT {CHAPTER_COLUMNS} FROM chapters WHERE 1=1"));
        Self::apply_chapter_filter(&mut qb, filter);
        qb.push(r#" ORDER BY subject COLLATE "C", chapter COLLATE "C", id LIMIT "#);
        qb.push_bind(limit);
        qb.push(" OFFSET ");
        qb.push_bind(offset);

        let rows = qb
            .build_query_as::<ChapterRow>()
            .fetch_all(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        rows_into_records(rows)
    }

    async fn find_chapter(&self, id: Uuid) -> Result<Option<ChapterRecord>, RepoError> {
        let row = sqlx::query_as::<_, ChapterRow>(&format!(
            "SELECT {CHAPTER_COLUMNS} FROM chapters WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        row.map(ChapterRecord::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), RepoError> {
        self.health_check().await.map_err(map_sqlx_error)
    }
}

#[async_trait]
impl ChaptersWriteRepo for PostgresRepositories {
    async fn insert_chapters(&self, chapters: Vec<NewChapter>) -> Result<InsertOutcome, RepoError> {
        let now = OffsetDateTime::now_utc();
        let mut outcome = InsertOutcome::default();

        for (chunk_index, chunk) in chapters.chunks(INSERT_CHUNK_ROWS).enumerate() {
            let offset = chunk_index * INSERT_CHUNK_ROWS;
            match self.insert_batch(chunk, now).await {
                Ok(records) => outcome.inserted.extend(records),
                Err(err) => {
                    warn!(
                        target = "chapterdash::infra::db::chapters",
                        rows = chunk.len(),
                        error = %err,
                        "bulk insert failed; retrying rows individually"
                    );
                    for (position, chapter) in chunk.iter().enumerate() {
                        match self.insert_batch(std::slice::from_ref(chapter), now).await {
                            Ok(records) => outcome.inserted.extend(records),
                            Err(error) => outcome.failures.push(InsertFailure {
                                index: offset + position,
                                error,
                            }),
                        }
                    }
                }
            }
        }

        Ok(outcome)
    }

    async fn delete_all_chapters(&self) -> Result<u64, RepoError> {
        let result = sqlx::query("DELETE FROM chapters")
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;
        Ok(result.rows_affected())
    }
}
