//! Chapterdash response cache.
//!
//! A read-through cache in front of the chapter read routes, backed by a
//! shared key-value store (Redis, or an in-process map when none is
//! configured). Every key lives under one namespace so that a bulk write can
//! drop the whole family at once.
//!
//! ```toml
//! [cache]
//! enabled = true
//! namespace = "chapters"
//! ttl_seconds = 3600
//! ```

mod backend;
mod client;
mod codec;
mod config;
mod invalidator;
mod keys;
mod memory;
mod middleware;

pub use backend::{CacheBackend, CacheBackendError};
pub use client::{CacheClient, DEFAULT_CALL_TIMEOUT};
pub use codec::{CodecError, decode, encode};
pub use config::CacheConfig;
pub use invalidator::CacheInvalidator;
pub use keys::{CacheKeys, KeyScope};
pub use memory::InMemoryBackend;
pub use middleware::{ReadThroughState, RouteCache, read_through_layer};

pub const METRIC_CACHE_HIT: &str = "chapterdash_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "chapterdash_cache_miss_total";
pub const METRIC_CACHE_STORE: &str = "chapterdash_cache_store_total";
pub const METRIC_CACHE_ERROR: &str = "chapterdash_cache_error_total";
pub const METRIC_CACHE_INVALIDATED: &str = "chapterdash_cache_invalidated_total";
