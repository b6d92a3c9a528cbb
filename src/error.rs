//! Error types for the Turnstile service.

use std::time::Duration;
use thiserror::Error;

use crate::store::StoreError;

/// Main error type for Turnstile operations.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Counter store errors while connecting the backend
    #[error("Counter store error: {0}")]
    Store(#[from] StoreError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;

/// Outcome of a rejected admission decision.
#[derive(Error, Debug)]
pub enum AdmissionError {
    /// The identity is over quota or still inside its block window.
    #[error("you have reached the maximum number of requests or actions allowed within a certain time frame")]
    RateLimited {
        /// Time left until the block on this identity lifts.
        retry_after: Duration,
    },

    /// The counter store could not complete the increment or reset.
    #[error("counter store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}
