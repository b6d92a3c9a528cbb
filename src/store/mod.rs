//! Counter store abstraction backing per-identity request counts.
//!
//! The engine only ever needs two primitives from the store: an atomic
//! increment that returns the new value, and a delete. Per-key atomicity is
//! delegated to the backend.

mod memory;
mod redis;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::{MemoryCounterStore, StoreOp};
pub use self::redis::RedisCounterStore;

/// Errors reported by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or replied with an error.
    #[error("backend error: {0}")]
    Backend(String),
    /// The command did not complete before its deadline.
    #[error("command timed out after {0:?}")]
    Timeout(Duration),
}

/// Atomic counter operations over `key -> count`.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment the count for `key` by one, creating it at 1 if absent.
    ///
    /// Returns the post-increment value. On error the increment may or may
    /// not have happened.
    async fn increment(&self, key: &str) -> Result<u64, StoreError>;

    /// Delete the count for `key`. Deleting an absent key succeeds.
    async fn reset(&self, key: &str) -> Result<(), StoreError>;
}

#[async_trait]
impl<S: CounterStore + ?Sized> CounterStore for std::sync::Arc<S> {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        (**self).increment(key).await
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        (**self).reset(key).await
    }
}
