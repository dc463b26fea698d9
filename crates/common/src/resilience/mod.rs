//! Resilience patterns for calling an unreliable upstream
//!
//! This module provides **generic, reusable** building blocks:
//! - **Clock**: injectable time source; every wait goes through it
//! - **Rate Limiter**: minimum spacing between request starts
//! - **Retry Policy**: category-aware backoff and a blocking retry loop
//! - **Circuit Breaker**: per-name failure isolation with a registry
//!
//! Nothing here performs I/O. The primitives are composed around a single
//! physical request by the API client in `statline-infra`:
//!
//! ```text
//! breaker.call(name, || retry.run(clock, |attempt| {
//!     limiter.throttle();
//!     send_and_classify(attempt)
//! }))
//! ```
//!
//! All components are synchronous. Sleeps block only the calling thread
//! and are never taken while a lock is held.

pub mod circuit_breaker;
pub mod clock;
pub mod rate_limiter;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerRecord,
    CircuitBreakerRegistry, CircuitState, ConfigError, ConfigResult, ResilienceError,
    ResilienceResult,
};
pub use clock::{Clock, MockClock, SystemClock};
pub use rate_limiter::{RateLimiter, RateLimiterConfig};
// Re-export retry types
pub use retry::{
    AttemptFailure, BackoffStrategy, Jitter, RetryConfig, RetryConfigBuilder, RetryDecision,
    RetryError, RetryPolicy, RetryResult, StopReason,
};
