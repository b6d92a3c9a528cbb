//! HTTP handlers.

use std::net::SocketAddr;

use axum::{
    extract::{ConnectInfo, Request, State},
    Json,
};
use serde::Serialize;

use super::identity::client_address;
use super::middleware::RateLimitState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
}

/// Health check endpoint. Never rate limited.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "turnstile",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Echo the address and token the request was seen with.
pub async fn whoami(State(state): State<RateLimitState>, request: Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_address(request.headers(), peer);
    let token = request
        .headers()
        .get(&state.token_header)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    format!("IP: {}, Token: {}", ip, token)
}
