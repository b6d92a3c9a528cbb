//! HTTP surface: identity resolution, the rate-limit middleware and the server.

mod handlers;
pub mod identity;
mod middleware;
mod server;

pub use handlers::{health, whoami, HealthResponse};
pub use identity::{client_address, resolve_identity};
pub use middleware::{rate_limit, RateLimitState, RATE_LIMITED_MESSAGE};
pub use server::{router, HttpServer};
