//! Cache configuration.
//!
//! Controls the read-through response cache via the `[cache]` settings section.

use std::time::Duration;

use super::keys::KeyScope;

const DEFAULT_NAMESPACE: &str = "chapters";
const DEFAULT_TTL_SECONDS: u64 = 3600;
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

/// Runtime cache configuration derived from settings.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Serve and store responses at all.
    pub enabled: bool,
    /// Resource-family prefix shared by every key.
    pub namespace: String,
    /// Default entry lifetime.
    pub ttl: Duration,
    /// Overrides `ttl` for list responses.
    pub list_ttl: Option<Duration>,
    /// Overrides `ttl` for by-id responses.
    pub item_ttl: Option<Duration>,
    /// Largest response body buffered for storage.
    pub max_body_bytes: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: DEFAULT_NAMESPACE.to_string(),
            ttl: Duration::from_secs(DEFAULT_TTL_SECONDS),
            list_ttl: None,
            item_ttl: None,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            namespace: settings.namespace.clone(),
            ttl: Duration::from_secs(settings.ttl_seconds.get()),
            list_ttl: settings
                .list_ttl_seconds
                .map(|secs| Duration::from_secs(secs.get())),
            item_ttl: settings
                .item_ttl_seconds
                .map(|secs| Duration::from_secs(secs.get())),
            max_body_bytes: usize::try_from(settings.max_body_bytes.get()).unwrap_or(usize::MAX),
        }
    }
}

impl CacheConfig {
    /// Entry lifetime for responses of the given route scope.
    pub fn ttl_for(&self, scope: KeyScope) -> Duration {
        let specific = match scope {
            KeyScope::List => self.list_ttl,
            KeyScope::Item => self.item_ttl,
        };
        specific.unwrap_or(self.ttl)
    }
}
