//! Live Redis tests.
//!
//! - Need a disposable Redis at `REDIS_URL` (default `redis://127.0.0.1:6379`).
//! - Marked `#[ignore]`; run with `cargo test --test live_cache -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use chapterdash::cache::{CacheBackendError, CacheClient, CacheInvalidator, CacheKeys};
use chapterdash::infra::redis::RedisBackend;
use uuid::Uuid;

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

fn redis_url() -> String {
    std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string())
}

fn client() -> TestResult<CacheClient> {
    let backend = RedisBackend::open(&redis_url())?;
    Ok(CacheClient::new(Arc::new(backend), Duration::from_secs(2)))
}

/// Keys go under a throwaway namespace so parallel runs never collide.
fn scratch_keys() -> CacheKeys {
    CacheKeys::new(format!("chapterdash-test-{}", Uuid::new_v4().simple()))
}

#[tokio::test]
#[ignore]
async fn live_set_get_and_invalidate() -> TestResult<()> {
    let client = client()?;
    let keys = scratch_keys();
    let item = keys.derive_item_key("abc");
    let list = format!("{}one:two", keys.prefix());

    client.set(&item, "{\"a\":1}", Duration::from_secs(30)).await?;
    client.set(&list, "[]", Duration::from_secs(30)).await?;
    assert_eq!(client.get(&item).await?.as_deref(), Some("{\"a\":1}"));

    let mut found = client.keys_with_prefix(&keys.prefix()).await?;
    found.sort();
    assert_eq!(found, vec![item.clone(), list.clone()]);

    let invalidator = CacheInvalidator::new(client.clone(), keys.clone());
    assert_eq!(invalidator.invalidate_all().await, 2);
    assert!(client.get(&item).await?.is_none());

    client.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_entries_expire() -> TestResult<()> {
    let client = client()?;
    let keys = scratch_keys();
    let key = keys.derive_item_key("short-lived");

    client.set(&key, "{}", Duration::from_secs(1)).await?;
    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert!(client.get(&key).await?.is_none());

    client.close().await?;
    Ok(())
}

#[tokio::test]
#[ignore]
async fn live_calls_after_close_fail_fast() -> TestResult<()> {
    let client = client()?;
    client.get("chapterdash-test-warmup").await?;
    client.close().await?;

    assert!(matches!(
        client.get("chapterdash-test-warmup").await,
        Err(CacheBackendError::Closed)
    ));
    Ok(())
}
