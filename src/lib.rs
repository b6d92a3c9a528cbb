//! Turnstile - Per-Identity HTTP Admission Control
//!
//! This crate throttles HTTP requests by client identity (address or API
//! token). Request counts live in a shared counter store such as Redis; an
//! identity that goes over its quota is blocked locally for a fixed duration,
//! during which its requests are refused without a store round trip.

pub mod config;
pub mod error;
pub mod http;
pub mod ratelimit;
pub mod store;
