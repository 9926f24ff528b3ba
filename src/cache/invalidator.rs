//! Bulk invalidation of the resource family.

use metrics::counter;
use tracing::{info, warn};

use super::{
    METRIC_CACHE_ERROR, METRIC_CACHE_INVALIDATED,
    client::CacheClient,
    keys::CacheKeys,
};

/// Drops every cached response under the namespace after a write.
#[derive(Clone)]
pub struct CacheInvalidator {
    client: CacheClient,
    keys: CacheKeys,
}

impl CacheInvalidator {
    pub fn new(client: CacheClient, keys: CacheKeys) -> Self {
        Self { client, keys }
    }

    /// Delete every key in the family, returning how many were removed.
    ///
    /// Never fails: backend errors are logged and reported as zero removals.
    pub async fn invalidate_all(&self) -> u64 {
        let prefix = self.keys.prefix();
        let keys = match self.client.keys_with_prefix(&prefix).await {
            Ok(keys) => keys,
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "scan").increment(1);
                warn!(
                    target = "chapterdash::cache::invalidator",
                    prefix = %prefix,
                    error = %err,
                    "failed to enumerate cache keys"
                );
                return 0;
            }
        };

        if keys.is_empty() {
            return 0;
        }

        match self.client.delete_many(&keys).await {
            Ok(removed) => {
                counter!(METRIC_CACHE_INVALIDATED).increment(removed);
                info!(
                    target = "chapterdash::cache::invalidator",
                    prefix = %prefix,
                    removed,
                    "cache invalidated"
                );
                removed
            }
            Err(err) => {
                counter!(METRIC_CACHE_ERROR, "op" => "delete").increment(1);
                warn!(
                    target = "chapterdash::cache::invalidator",
                    prefix = %prefix,
                    keys = keys.len(),
                    error = %err,
                    "failed to delete cache keys"
                );
                0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use crate::cache::InMemoryBackend;

    #[tokio::test]
    async fn removes_only_the_family_and_is_idempotent() {
        let backend = Arc::new(InMemoryBackend::new());
        let client = CacheClient::new(backend.clone(), Duration::from_millis(250));
        let ttl = Duration::from_secs(60);
        client.set("chapters:11::::::1:10", "{}", ttl).await.unwrap();
        client.set("chapters:id:abc", "{}", ttl).await.unwrap();
        client.set("chaptersx:other", "{}", ttl).await.unwrap();

        let invalidator = CacheInvalidator::new(client, CacheKeys::default());
        assert_eq!(invalidator.invalidate_all().await, 2);
        assert_eq!(invalidator.invalidate_all().await, 0);
        assert_eq!(backend.len(), 1);
    }

    #[tokio::test]
    async fn swallows_backend_errors() {
        let client = CacheClient::new(
            Arc::new(InMemoryBackend::new()),
            Duration::from_millis(250),
        );
        client.close().await.unwrap();

        let invalidator = CacheInvalidator::new(client, CacheKeys::default());
        assert_eq!(invalidator.invalidate_all().await, 0);
    }
}
