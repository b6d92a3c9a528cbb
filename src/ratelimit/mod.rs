//! Rate limiting logic and state management.

mod backend;
mod blocklist;
mod key;
mod limiter;

pub use backend::{from_config, AdmissionControl};
pub use blocklist::{BlockShard, BlockTable};
pub use key::{IdentityKey, LimitClass};
pub use limiter::{LimiterConfig, LockMode, RateLimiter};
