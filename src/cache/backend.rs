//! Key-value store seam used by the response cache.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheBackendError {
    #[error("cache call `{op}` timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },
    #[error("cache client is closed")]
    Closed,
    #[error("cache backend error: {0}")]
    Backend(String),
}

impl CacheBackendError {
    pub fn backend(err: impl std::fmt::Display) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Minimal string key-value operations with per-entry expiry.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &'static str;

    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration)
    -> Result<(), CacheBackendError>;

    /// Every live key starting with `prefix`.
    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheBackendError>;

    /// Delete the given keys, returning how many existed.
    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheBackendError>;

    /// Release the underlying connection.
    async fn close(&self) -> Result<(), CacheBackendError>;
}
