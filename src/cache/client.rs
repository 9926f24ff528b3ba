//! Shared cache client: bounded calls and drain-on-close.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::info;

use super::backend::{CacheBackend, CacheBackendError};

pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(250);

/// Process-wide handle to the cache backend.
///
/// Every call holds a read guard on the close gate for its whole duration, so
/// `close` (which takes the write guard) waits for in-flight calls to drain.
#[derive(Clone)]
pub struct CacheClient {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn CacheBackend>,
    call_timeout: Duration,
    closed: RwLock<bool>,
}

impl CacheClient {
    pub fn new(backend: Arc<dyn CacheBackend>, call_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                call_timeout,
                closed: RwLock::new(false),
            }),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.inner.backend.name()
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        self.call("get", self.inner.backend.get(key)).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        self.call("set", self.inner.backend.set_ex(key, value, ttl))
            .await
    }

    pub async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheBackendError> {
        self.call("scan", self.inner.backend.keys_with_prefix(prefix))
            .await
    }

    pub async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheBackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        self.call("delete", self.inner.backend.delete_many(keys))
            .await
    }

    pub async fn is_closed(&self) -> bool {
        *self.inner.closed.read().await
    }

    /// Stop admitting calls, wait for in-flight ones, then release the backend.
    pub async fn close(&self) -> Result<(), CacheBackendError> {
        let mut closed = self.inner.closed.write().await;
        if *closed {
            return Ok(());
        }
        *closed = true;
        info!(
            target = "chapterdash::cache::client",
            backend = self.inner.backend.name(),
            "closing cache client"
        );
        self.inner.backend.close().await
    }

    async fn call<T, F>(&self, op: &'static str, call: F) -> Result<T, CacheBackendError>
    where
        F: Future<Output = Result<T, CacheBackendError>>,
    {
        let closed = self.inner.closed.read().await;
        if *closed {
            return Err(CacheBackendError::Closed);
        }
        let timeout = self.inner.call_timeout;
        let result = tokio::time::timeout(timeout, call)
            .await
            .unwrap_or(Err(CacheBackendError::Timeout { op, timeout }));
        drop(closed);
        result
    }
}
