//! HTTP server implementation.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{http::HeaderName, middleware, routing::get, Router};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use super::handlers::{health, whoami};
use super::middleware::{rate_limit, RateLimitState};
use crate::error::{Result, TurnstileError};
use crate::ratelimit::AdmissionControl;

/// Build the application router.
///
/// Every route except `/health` sits behind the rate-limit middleware.
pub fn router(state: RateLimitState) -> Router {
    let limited = Router::new()
        .route("/whoami", get(whoami))
        .route_layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .with_state(state);

    Router::new()
        .route("/health", get(health))
        .merge(limited)
        .layer(TraceLayer::new_for_http())
}

/// HTTP server fronting the admission engine.
pub struct HttpServer {
    /// Address to bind to
    addr: SocketAddr,
    /// Shared middleware state
    state: RateLimitState,
}

impl HttpServer {
    /// Create a new HTTP server.
    pub fn new(
        addr: SocketAddr,
        limiter: Arc<dyn AdmissionControl>,
        token_header: &str,
    ) -> Result<Self> {
        let token_header = HeaderName::from_bytes(token_header.as_bytes()).map_err(|e| {
            TurnstileError::Config(format!("invalid token header {:?}: {}", token_header, e))
        })?;

        Ok(Self {
            addr,
            state: RateLimitState {
                limiter,
                token_header,
            },
        })
    }

    /// Start the HTTP server with graceful shutdown.
    ///
    /// The server will shut down when the provided signal resolves.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind(self.addr).await?;
        info!(addr = %self.addr, "HTTP server listening");

        let app = router(self.state);
        axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| {
                error!(error = %e, "HTTP server failed");
                TurnstileError::Io(e)
            })
    }
}
