//! Resilient client for the sports-data API
//!
//! This module composes the resilience primitives from `statline-common`
//! around the HTTP transport.
//!
//! # Architecture
//!
//! - One [`ResilientClient`] per API key; cheap to share behind an `Arc`
//! - Cache, circuit breaker, retry loop and throttle per logical fetch
//! - Every physical attempt recorded through the telemetry sink
//! - Every terminal failure reported exactly once
//! - Fallback values only through the opt-in
//!   [`ResilientClient::fetch_with_fallbacks`]

pub mod client;
pub mod fallback;
pub mod operations;

pub use client::{ResilientClient, ResilientClientBuilder};
pub use fallback::{Fallback, FallbackRegistry, FnFallback, Recovery, StaticFallback};
