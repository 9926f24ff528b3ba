//! Redis cache backend.
//!
//! The connection is established lazily on first use and shared through a
//! `ConnectionManager`, which reconnects on its own after transient failures.
//! Connecting runs in its own task under `CONNECT_TIMEOUT`, so a caller that
//! gives up on its per-call timeout never aborts the attempt.
//! Key enumeration uses `SCAN`, never `KEYS`.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use redis::{AsyncCommands, Client, aio::ConnectionManager};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cache::{CacheBackend, CacheBackendError};

const SCAN_BATCH: usize = 500;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

enum ConnectAttempt {
    Pending,
    Ready(ConnectionManager),
    Failed(String),
}

pub struct RedisBackend {
    client: Client,
    attempt: Mutex<Option<watch::Receiver<ConnectAttempt>>>,
}

impl RedisBackend {
    /// Validate the URL without connecting.
    pub fn open(url: &str) -> Result<Self, CacheBackendError> {
        let client = Client::open(url).map_err(CacheBackendError::backend)?;
        Ok(Self {
            client,
            attempt: Mutex::new(None),
        })
    }

    async fn connection(&self) -> Result<ConnectionManager, CacheBackendError> {
        let mut attempt = self.current_attempt()?;
        let outcome = attempt
            .wait_for(|state| !matches!(state, ConnectAttempt::Pending))
            .await
            .map_err(|_| CacheBackendError::backend("redis connect task ended early"))?;
        match &*outcome {
            ConnectAttempt::Ready(manager) => Ok(manager.clone()),
            ConnectAttempt::Failed(message) => Err(CacheBackendError::backend(message)),
            ConnectAttempt::Pending => Err(CacheBackendError::backend("redis connection pending")),
        }
    }

    /// Join the attempt in flight, or start a new one if none is usable.
    fn current_attempt(&self) -> Result<watch::Receiver<ConnectAttempt>, CacheBackendError> {
        let mut slot = self
            .attempt
            .lock()
            .map_err(|_| CacheBackendError::backend("redis connection state poisoned"))?;
        if let Some(existing) = slot.as_ref() {
            let connecting = existing.has_changed().is_ok();
            let usable = match &*existing.borrow() {
                ConnectAttempt::Ready(_) => true,
                ConnectAttempt::Pending => connecting,
                ConnectAttempt::Failed(_) => false,
            };
            if usable {
                return Ok(existing.clone());
            }
        }

        let receiver = spawn_connect(self.client.clone());
        *slot = Some(receiver.clone());
        Ok(receiver)
    }
}

fn spawn_connect(client: Client) -> watch::Receiver<ConnectAttempt> {
    let (sender, receiver) = watch::channel(ConnectAttempt::Pending);
    tokio::spawn(async move {
        let outcome =
            match tokio::time::timeout(CONNECT_TIMEOUT, ConnectionManager::new(client)).await {
                Ok(Ok(manager)) => {
                    info!(target = "chapterdash::infra::redis", "redis connection established");
                    ConnectAttempt::Ready(manager)
                }
                Ok(Err(err)) => {
                    warn!(
                        target = "chapterdash::infra::redis",
                        error = %err,
                        "redis connection failed"
                    );
                    ConnectAttempt::Failed(err.to_string())
                }
                Err(_) => {
                    warn!(
                        target = "chapterdash::infra::redis",
                        timeout = ?CONNECT_TIMEOUT,
                        "redis connection timed out"
                    );
                    ConnectAttempt::Failed(format!(
                        "redis connect timed out after {CONNECT_TIMEOUT:?}"
                    ))
                }
            };
        let _ = sender.send(outcome);
    });
    receiver
}

/// Escape glob metacharacters so a prefix matches literally in `SCAN MATCH`.
fn match_pattern(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len() + 1);
    for ch in prefix.chars() {
        if matches!(ch, '*' | '?' | '[' | ']' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('*');
    pattern
}

#[async_trait]
impl CacheBackend for RedisBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheBackendError> {
        let mut conn = self.connection().await?;
        let value: Option<String> = conn.get(key).await.map_err(CacheBackendError::backend)?;
        Ok(value)
    }

    async fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> Result<(), CacheBackendError> {
        let mut conn = self.connection().await?;
        let seconds = ttl.as_secs().max(1);
        let _: () = conn
            .set_ex(key, value, seconds)
            .await
            .map_err(CacheBackendError::backend)?;
        Ok(())
    }

    async fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, CacheBackendError> {
        let mut conn = self.connection().await?;
        let pattern = match_pattern(prefix);
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .map_err(CacheBackendError::backend)?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        keys.sort();
        keys.dedup();
        Ok(keys)
    }

    async fn delete_many(&self, keys: &[String]) -> Result<u64, CacheBackendError> {
        if keys.is_empty() {
            return Ok(0);
        }
        let mut conn = self.connection().await?;
        let removed: u64 = conn.del(keys).await.map_err(CacheBackendError::backend)?;
        Ok(removed)
    }

    async fn close(&self) -> Result<(), CacheBackendError> {
        let released = self
            .attempt
            .lock()
            .map_err(|_| CacheBackendError::backend("redis connection state poisoned"))?
            .take();
        let connected = released
            .as_ref()
            .is_some_and(|attempt| matches!(&*attempt.borrow(), ConnectAttempt::Ready(_)));
        if connected {
            info!(target = "chapterdash::infra::redis", "redis connection released");
        }
        Ok(())
    }
}
