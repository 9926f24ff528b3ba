//! Postgres-backed repository implementations.

mod chapters;
mod util;

pub use util::map_sqlx_error;

use std::sync::Arc;

use sqlx::{
    Postgres, QueryBuilder,
    postgres::{PgPool, PgPoolOptions},
    query,
};

use crate::application::repos::{ChapterQueryFilter, RepoError};

#[derive(Clone)]
pub struct PostgresRepositories {
    pool: Arc<PgPool>,
}

impl PostgresRepositories {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn connect(url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
        PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await
    }

    pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(Into::into)
    }

    pub async fn health_check(&self) -> Result<(), sqlx::Error> {
        query("SELECT 1").execute(self.pool()).await.map(|_| ())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn apply_chapter_filter<'q>(qb: &mut QueryBuilder<'q, Postgres>, filter: &'q ChapterQueryFilter) {
        if let Some(class) = filter.class.as_ref() {
            qb.push(" AND class = ");
            qb.push_bind(class);
        }

        if let Some(unit) = filter.unit.as_ref() {
            qb.push(" AND unit = ");
            qb.push_bind(unit);
        }

        if let Some(status) = filter.status.as_ref() {
            qb.push(" AND status = ");
            qb.push_bind(status);
        }

        if let Some(weak) = filter.is_weak_chapter {
            qb.push(" AND is_weak_chapter = ");
            qb.push_bind(weak);
        }

        if let Some(subject) = filter.subject.as_ref() {
            qb.push(" AND subject = ");
            qb.push_bind(subject);
        }
    }

    fn convert_count(value: i64) -> Result<u64, RepoError> {
        value
            .try_into()
            .map_err(|_| RepoError::from_persistence("count exceeds supported range"))
    }
}
