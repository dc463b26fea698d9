//! Modular common building blocks shared across Statline crates.
//!
//! Everything here is free of network and file I/O: the resilience
//! primitives (clock, rate limiter, retry policy, circuit breaker), the TTL
//! response cache and the error taxonomy used to classify failed attempts.
//!
//! # Feature Tiers
//!
//! Enable cargo features to opt into the tiers you need:
//! - `foundation`: error taxonomy, lifecycle metadata, serde helpers
//! - `runtime`: concurrency-aware infrastructure (cache, resilience)
//! - `observability`: tracing (implied by `runtime`)

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

// Foundation tier
// -----------------------------------------------------------------
#[cfg(feature = "foundation")]
pub mod error;
#[cfg(feature = "foundation")]
pub mod lifecycle;
#[cfg(feature = "foundation")]
pub mod utils;

// Runtime tier
// --------------------------------------------------------------------
#[cfg(feature = "runtime")]
pub mod cache;
#[cfg(feature = "runtime")]
pub mod resilience;

// Re-export commonly used types and traits for convenience
// ------------------------
#[cfg(feature = "foundation")]
pub use error::{
    ErrorCategory, ErrorClassification, ErrorClassifier, ErrorSeverity, TransportFailureKind,
};
#[cfg(feature = "foundation")]
pub use lifecycle::{ComponentDescriptor, LifecycleStatus};
#[cfg(feature = "runtime")]
pub use resilience::{
    AttemptFailure, BackoffStrategy, CircuitBreaker, CircuitBreakerConfig,
    CircuitBreakerRecord, CircuitBreakerRegistry, CircuitState, Clock, Jitter, MockClock,
    RateLimiter, ResilienceError, ResilienceResult, RetryConfig, RetryDecision, RetryError,
    RetryPolicy, StopReason, SystemClock,
};
#[cfg(feature = "foundation")]
pub use utils::serde::{duration_millis, duration_secs};
