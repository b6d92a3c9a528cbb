//! Rate-limit middleware mapping admission decisions to HTTP responses.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderName, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use tracing::{debug, error, instrument};

use super::identity::resolve_identity;
use crate::error::AdmissionError;
use crate::ratelimit::{AdmissionControl, IdentityKey};

/// Body of every `429` response.
pub const RATE_LIMITED_MESSAGE: &str =
    "you have reached the maximum number of requests or actions allowed within a certain time frame";

/// Body of the `503` response returned when the counter store fails.
const STORE_UNAVAILABLE_MESSAGE: &str = "rate limiter temporarily unavailable";

/// State shared by the rate-limit middleware and the handlers behind it.
#[derive(Clone)]
pub struct RateLimitState {
    /// The admission decision engine
    pub limiter: Arc<dyn AdmissionControl>,
    /// Request header carrying the client API token
    pub token_header: HeaderName,
}

/// Admit the request or answer it directly with `429` / `503`.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn rate_limit(
    State(state): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let identity = resolve_identity(request.headers(), peer, &state.token_header);

    match state.limiter.allow_request(identity.class, &identity.value).await {
        Ok(()) => next.run(request).await,
        Err(err) => rejection(&identity, err),
    }
}

fn rejection(identity: &IdentityKey, err: AdmissionError) -> Response {
    match err {
        AdmissionError::RateLimited { retry_after } => {
            debug!(key = %identity, retry_after = ?retry_after, "Request rate limited");
            (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_secs(retry_after).to_string())],
                RATE_LIMITED_MESSAGE,
            )
                .into_response()
        }
        AdmissionError::StoreUnavailable(e) => {
            error!(key = %identity, error = %e, "Counter store unavailable, rejecting request");
            (StatusCode::SERVICE_UNAVAILABLE, STORE_UNAVAILABLE_MESSAGE).into_response()
        }
    }
}

/// Whole seconds until retrying makes sense, rounded up.
fn retry_after_secs(retry_after: Duration) -> u64 {
    retry_after
        .as_secs()
        .saturating_add(u64::from(retry_after.subsec_nanos() > 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_after_rounds_up() {
        assert_eq!(retry_after_secs(Duration::from_secs(10)), 10);
        assert_eq!(retry_after_secs(Duration::from_millis(5_200)), 6);
        assert_eq!(retry_after_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_after_secs(Duration::ZERO), 0);
        assert_eq!(retry_after_secs(Duration::MAX), u64::MAX);
    }
}
