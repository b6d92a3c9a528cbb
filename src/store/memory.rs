//! In-process counter store.
//!
//! Backs single-process deployments (`store.backend: memory`) and serves as a
//! test double: every call is recorded, calls can be slowed down to widen race
//! windows, and the store can be switched into a failing mode.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

use super::{CounterStore, StoreError};

/// A call made against a [`MemoryCounterStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    Increment(String),
    Reset(String),
}

#[derive(Debug, Clone, Copy)]
struct CounterEntry {
    count: u64,
    expires_at: Option<Instant>,
}

/// Counter store held entirely in local memory.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    counters: DashMap<String, CounterEntry>,
    /// Counter lifetime, measured from the increment that created it
    window: Option<Duration>,
    latency: Option<Duration>,
    failing: AtomicBool,
    ops: Mutex<Vec<StoreOp>>,
}

impl MemoryCounterStore {
    /// Create an empty store whose counters never expire.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expire each counter `window` after the increment that created it.
    pub fn with_window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// Delay every call by `latency` before it takes effect.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Current count for `key`, if a live record exists.
    pub fn count(&self, key: &str) -> Option<u64> {
        let now = Instant::now();
        self.counters
            .get(key)
            .filter(|entry| entry.expires_at.map_or(true, |at| at > now))
            .map(|entry| entry.count)
    }

    /// Every call made so far, in order.
    pub fn ops(&self) -> Vec<StoreOp> {
        self.ops.lock().clone()
    }

    /// Number of calls made so far.
    pub fn op_count(&self) -> usize {
        self.ops.lock().len()
    }

    async fn begin(&self, op: StoreOp) -> Result<(), StoreError> {
        self.ops.lock().push(op);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("memory store set to fail".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        self.begin(StoreOp::Increment(key.to_string())).await?;

        let now = Instant::now();
        let mut entry = self.counters.entry(key.to_string()).or_insert(CounterEntry {
            count: 0,
            expires_at: None,
        });

        if entry.expires_at.is_some_and(|at| at <= now) {
            entry.count = 0;
            entry.expires_at = None;
        }
        if entry.count == 0 {
            entry.expires_at = self.window.and_then(|window| now.checked_add(window));
        }
        entry.count += 1;

        trace!(key = %key, count = entry.count, "Incremented memory counter");
        Ok(entry.count)
    }

    async fn reset(&self, key: &str) -> Result<(), StoreError> {
        self.begin(StoreOp::Reset(key.to_string())).await?;
        self.counters.remove(key);
        trace!(key = %key, "Reset memory counter");
        Ok(())
    }
}
