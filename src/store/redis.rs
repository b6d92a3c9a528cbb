//! Redis-backed counter store.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use ::redis::aio::ConnectionManager;
use ::redis::{AsyncCommands, RedisError};
use tracing::{debug, info, warn};

use super::{CounterStore, StoreError};
use crate::config::StoreConfig;

/// Counter store using Redis `INCR` and `DEL`.
///
/// The connection manager reconnects on its own; commands issued while the
/// server is unreachable fail with [`StoreError::Backend`].
#[derive(Clone)]
pub struct RedisCounterStore {
    conn: ConnectionManager,
    key_prefix: String,
    /// Counter lifetime set on the increment that creates a record
    window: Option<Duration>,
    command_timeout: Duration,
}

impl std::fmt::Debug for RedisCounterStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCounterStore")
            .field("key_prefix", &self.key_prefix)
            .field("window", &self.window)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

impl RedisCounterStore {
    /// Connect to the Redis server described by `config`.
    pub async fn connect(config: &StoreConfig, window: Option<Duration>) -> Result<Self, StoreError> {
        info!(url = %config.redacted_url(), "Connecting to Redis counter store");

        let client = ::redis::Client::open(config.redis_url.as_str()).map_err(backend_error)?;
        let command_timeout = config.command_timeout();
        let conn = with_deadline(command_timeout, ConnectionManager::new(client)).await?;

        Ok(Self {
            conn,
            key_prefix: config.key_prefix.clone(),
            window,
            command_timeout,
        })
    }

    fn record_key(&self, key: &str) -> String {
        format!("{}{}", self.key_prefix, key)
    }
}

#[async_trait]
impl CounterStore for RedisCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let record = self.record_key(key);
        let mut conn = self.conn.clone();

        let count: u64 = with_deadline(self.command_timeout, conn.incr(&record, 1u64)).await?;

        // Only the increment that created the record starts its window.
        if count == 1 {
            if let Some(window) = self.window {
                let secs = window.as_secs().max(1) as i64;
                let _: bool = with_deadline(self.command_timeout, conn.expire(&record, secs)).await?;
            }
        }

        debug!(key = %record, count = count, "Incremented counter");
        Ok(count)
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        let record = self.record_key(key);
        let mut conn = self.conn.clone();

        let removed: u64 = with_deadline(self.command_timeout, conn.del(&record)).await?;

        debug!(key = %record, removed = removed, "Reset counter");
        Ok(())
    }
}

async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, RedisError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result.map_err(backend_error),
        Err(_) => {
            warn!(timeout = ?deadline, "Redis command timed out");
            Err(StoreError::Timeout(deadline))
        }
    }
}

fn backend_error(e: RedisError) -> StoreError {
    warn!(error = %e, "Redis command failed");
    StoreError::Backend(e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_deadline_maps_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<u64, RedisError>(1)
        };

        let result = with_deadline(Duration::from_millis(10), slow).await;
        assert!(matches!(result, Err(StoreError::Timeout(d)) if d == Duration::from_millis(10)));
    }

    #[tokio::test]
    async fn test_with_deadline_maps_backend_error() {
        let failing = async {
            Err::<u64, RedisError>(RedisError::from((::redis::ErrorKind::IoError, "connection refused")))
        };

        let result = with_deadline(Duration::from_secs(1), failing).await;
        assert!(matches!(result, Err(StoreError::Backend(msg)) if msg.contains("connection refused")));
    }

    #[tokio::test]
    async fn test_connect_rejects_bad_url() {
        let config = StoreConfig {
            redis_url: "not a url".to_string(),
            ..Default::default()
        };

        let result = RedisCounterStore::connect(&config, None).await;
        assert!(matches!(result, Err(StoreError::Backend(_))));
    }
}
