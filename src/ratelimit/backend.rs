//! Admission trait for abstracting over concrete counter stores.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use super::key::LimitClass;
use super::limiter::RateLimiter;
use crate::config::{StoreBackend, TurnstileConfig};
use crate::error::{AdmissionError, Result};
use crate::store::{CounterStore, MemoryCounterStore, RedisCounterStore};

/// Trait for admission decision implementations.
///
/// This trait erases the counter store type so the HTTP layer can hold any
/// `RateLimiter` behind an `Arc<dyn AdmissionControl>`.
#[async_trait]
pub trait AdmissionControl: Send + Sync {
    /// Admit or reject one request from `key` under `class`'s quota.
    async fn allow_request(&self, class: LimitClass, key: &str) -> std::result::Result<(), AdmissionError>;
}

#[async_trait]
impl<S: CounterStore + 'static> AdmissionControl for RateLimiter<S> {
    async fn allow_request(&self, class: LimitClass, key: &str) -> std::result::Result<(), AdmissionError> {
        RateLimiter::allow_request(self, class, key).await
    }
}

/// Build the engine over the counter store selected by `config.store.backend`.
pub async fn from_config(config: &TurnstileConfig) -> Result<Arc<dyn AdmissionControl>> {
    let limits = config.rate_limiting.limiter_config();
    let window = config.rate_limiting.window();

    let limiter: Arc<dyn AdmissionControl> = match config.store.backend {
        StoreBackend::Redis => {
            let store = RedisCounterStore::connect(&config.store, window).await?;
            Arc::new(RateLimiter::new(store, limits))
        }
        StoreBackend::Memory => {
            let store = match window {
                Some(window) => MemoryCounterStore::new().with_window(window),
                None => MemoryCounterStore::new(),
            };
            Arc::new(RateLimiter::new(store, limits))
        }
    };

    info!(backend = ?config.store.backend, "Rate limiter initialized");
    Ok(limiter)
}
