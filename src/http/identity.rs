//! Resolves the rate-limited identity of an HTTP request.
//!
//! The client address is taken from the first `X-Forwarded-For` entry, then
//! `X-Real-IP`, then the transport peer. A non-empty token header overrides
//! the address and classifies the request under the token quota.

use std::net::SocketAddr;

use axum::http::{HeaderMap, HeaderName};

use crate::ratelimit::{IdentityKey, LimitClass};

/// Forwarded-for header set by proxies and load balancers.
pub static X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");
/// Real-IP header set by some reverse proxies.
pub static X_REAL_IP: HeaderName = HeaderName::from_static("x-real-ip");

/// Address used when neither headers nor the transport name a client.
const UNKNOWN_ADDRESS: &str = "unknown";

/// Best-effort client address for a request.
pub fn client_address(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    if let Some(first) = header_str(headers, &X_FORWARDED_FOR)
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
    {
        return first.to_string();
    }

    if let Some(real_ip) = header_str(headers, &X_REAL_IP).map(str::trim).filter(|ip| !ip.is_empty()) {
        return real_ip.to_string();
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string())
}

/// Resolve the `(class, key)` pair the engine should decide on.
pub fn resolve_identity(
    headers: &HeaderMap,
    peer: Option<SocketAddr>,
    token_header: &HeaderName,
) -> IdentityKey {
    match header_str(headers, token_header).filter(|token| !token.is_empty()) {
        Some(token) => IdentityKey::new(LimitClass::Token, token),
        None => IdentityKey::new(LimitClass::Ip, &client_address(headers, peer)),
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn token_header() -> HeaderName {
        HeaderName::from_static("api_key")
    }

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
        }
        map
    }

    fn peer() -> Option<SocketAddr> {
        Some("172.16.0.9:51234".parse().unwrap())
    }

    #[test]
    fn test_forwarded_for_takes_first_entry() {
        let h = headers(&[
            ("x-forwarded-for", " 203.0.113.7 , 10.0.0.1"),
            ("x-real-ip", "198.51.100.1"),
        ]);
        assert_eq!(client_address(&h, peer()), "203.0.113.7");
    }

    #[test]
    fn test_real_ip_when_no_forwarded_for() {
        let h = headers(&[("x-real-ip", "198.51.100.1")]);
        assert_eq!(client_address(&h, peer()), "198.51.100.1");
    }

    #[test]
    fn test_peer_address_strips_port() {
        assert_eq!(client_address(&HeaderMap::new(), peer()), "172.16.0.9");

        let v6: SocketAddr = "[2001:db8::1]:443".parse().unwrap();
        assert_eq!(client_address(&HeaderMap::new(), Some(v6)), "2001:db8::1");
    }

    #[test]
    fn test_unknown_without_peer() {
        assert_eq!(client_address(&HeaderMap::new(), None), "unknown");
    }

    #[test]
    fn test_empty_headers_fall_through() {
        let h = headers(&[("x-forwarded-for", ""), ("x-real-ip", " ")]);
        assert_eq!(client_address(&h, peer()), "172.16.0.9");
    }

    #[test]
    fn test_token_header_selects_token_class() {
        let h = headers(&[("api_key", "secret-token"), ("x-real-ip", "192.168.1.1")]);
        let identity = resolve_identity(&h, peer(), &token_header());

        assert_eq!(identity.class, LimitClass::Token);
        assert_eq!(identity.value, "secret-token");
    }

    #[test]
    fn test_empty_token_falls_back_to_ip() {
        let h = headers(&[("api_key", ""), ("x-real-ip", "192.168.1.2")]);
        let identity = resolve_identity(&h, peer(), &token_header());

        assert_eq!(identity.class, LimitClass::Ip);
        assert_eq!(identity.value, "192.168.1.2");
    }
}
