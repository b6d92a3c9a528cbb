//! Core admission decision engine.

use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use super::blocklist::BlockTable;
use super::key::{IdentityKey, LimitClass};
use crate::error::AdmissionError;
use crate::store::CounterStore;

/// Default quota for IP-classified identities.
const DEFAULT_LIMIT_PER_IP: u64 = 10;
/// Default quota for token-classified identities.
const DEFAULT_LIMIT_PER_TOKEN: u64 = 100;
/// Default block applied to an identity that exceeds its quota.
const DEFAULT_BLOCK_DURATION: Duration = Duration::from_secs(10);
/// Default shard count for [`LockMode::Sharded`].
const DEFAULT_SHARDS: usize = 64;
/// Block horizon used when `now + block_duration` does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// Lock grain for the block table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// A single lock serializes every decision in the process
    Global,
    /// Keys are hashed over this many independent locks
    Sharded(usize),
}

impl LockMode {
    fn shard_count(&self) -> usize {
        match self {
            LockMode::Global => 1,
            LockMode::Sharded(shards) => (*shards).max(1),
        }
    }
}

/// Configuration for the decision engine.
#[derive(Debug, Clone)]
pub struct LimiterConfig {
    /// Requests allowed per IP-classified identity before blocking
    pub limit_per_ip: u64,
    /// Requests allowed per token-classified identity before blocking
    pub limit_per_token: u64,
    /// How long an identity stays blocked once over quota
    pub block_duration: Duration,
    /// Lock grain for the block table
    pub lock_mode: LockMode,
    /// Prefix store and block keys with the limit class
    pub namespace_keys: bool,
}

impl LimiterConfig {
    /// The quota that applies to `class`.
    pub fn quota(&self, class: LimitClass) -> u64 {
        match class {
            LimitClass::Ip => self.limit_per_ip,
            LimitClass::Token => self.limit_per_token,
        }
    }
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            limit_per_ip: DEFAULT_LIMIT_PER_IP,
            limit_per_token: DEFAULT_LIMIT_PER_TOKEN,
            block_duration: DEFAULT_BLOCK_DURATION,
            lock_mode: LockMode::Sharded(DEFAULT_SHARDS),
            namespace_keys: true,
        }
    }
}

/// Decides whether a request from an identity may proceed.
///
/// Counts live in the shared [`CounterStore`]; which identities are blocked,
/// and until when, is local to this instance. The lock guarding a key is held
/// for the whole decision, store round trips included, so concurrent
/// decisions for one key never interleave.
pub struct RateLimiter<S> {
    store: S,
    config: LimiterConfig,
    blocks: BlockTable,
}

impl<S: CounterStore> RateLimiter<S> {
    /// Create a new rate limiter over `store`.
    pub fn new(store: S, config: LimiterConfig) -> Self {
        let blocks = BlockTable::new(config.lock_mode.shard_count());
        Self {
            store,
            config,
            blocks,
        }
    }

    /// Admit or reject one request from `key` under `class`'s quota.
    ///
    /// Returns `RateLimited` while the identity is blocked (without touching
    /// the store) or when this request pushes it over quota. Store failures
    /// come back as `StoreUnavailable`: a failed increment never creates a
    /// block, and a failed reset keeps the lapsed block in place.
    pub async fn allow_request(&self, class: LimitClass, key: &str) -> Result<(), AdmissionError> {
        let identity = IdentityKey::new(class, key);
        let lookup = identity.lookup_key(self.config.namespace_keys);

        let mut shard = self.blocks.lock(&lookup).await;

        if let Some(&unblock_at) = shard.get(&lookup) {
            let now = Instant::now();
            if now < unblock_at {
                trace!(key = %identity, "Rejected blocked identity");
                return Err(AdmissionError::RateLimited {
                    retry_after: unblock_at - now,
                });
            }

            self.store.reset(&lookup).await.map_err(|e| {
                warn!(key = %identity, error = %e, "Failed to reset counter after block expiry");
                e
            })?;
            shard.remove(&lookup);
            debug!(key = %identity, "Block expired, counter reset");
        }

        let count = self.store.increment(&lookup).await.map_err(|e| {
            warn!(key = %identity, error = %e, "Failed to increment counter");
            e
        })?;

        let quota = self.config.quota(class);
        trace!(key = %identity, count = count, quota = quota, "Counted request");

        if count > quota {
            let block = self.config.block_duration;
            let now = Instant::now();
            let unblock_at = now.checked_add(block).unwrap_or_else(|| now + FAR_FUTURE);
            shard.insert(lookup, unblock_at);
            debug!(
                key = %identity,
                count = count,
                quota = quota,
                block_secs = block.as_secs(),
                "Quota exceeded, identity blocked"
            );
            return Err(AdmissionError::RateLimited { retry_after: block });
        }

        Ok(())
    }

    /// Whether `key` is currently inside a block window.
    pub async fn is_blocked(&self, class: LimitClass, key: &str) -> bool {
        let lookup = IdentityKey::new(class, key).lookup_key(self.config.namespace_keys);
        self.blocks.is_blocked(&lookup).await
    }

    /// Number of block entries held, including lapsed ones not yet cleared.
    pub async fn blocked_count(&self) -> usize {
        self.blocks.len().await
    }

    /// The counter store.
    pub fn store(&self) -> &S {
        &self.store
    }
}
