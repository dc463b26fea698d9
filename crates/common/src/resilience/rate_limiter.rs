//! Minimum-interval rate limiting for outbound requests
//!
//! [`RateLimiter::throttle`] spaces out request *starts*: each call returns
//! no earlier than `min_interval` after the previous call's start. Callers
//! reserve their start slot under a short critical section and then sleep
//! on their own thread, so a waiting caller never holds the lock.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Clock, SystemClock};
use crate::utils::serde::duration_millis;

/// Configuration for the rate limiter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimiterConfig {
    /// Minimum spacing between the starts of two throttled calls
    #[serde(with = "duration_millis")]
    pub min_interval: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { min_interval: Duration::from_millis(500) }
    }
}

/// Shared request-start limiter for one endpoint family
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use statline_common::resilience::RateLimiter;
///
/// let limiter = RateLimiter::new(Duration::from_millis(10));
/// limiter.throttle();
/// limiter.throttle(); // returns at least 10ms after the first call
/// ```
pub struct RateLimiter<C: Clock = SystemClock> {
    min_interval: Duration,
    last_start: Arc<Mutex<Option<Instant>>>,
    clock: Arc<C>,
}

impl RateLimiter<SystemClock> {
    /// Create a limiter using the system clock
    pub fn new(min_interval: Duration) -> Self {
        Self::with_clock(min_interval, SystemClock)
    }

    /// Create a limiter from configuration using the system clock
    pub fn from_config(config: &RateLimiterConfig) -> Self {
        Self::new(config.min_interval)
    }
}

impl<C: Clock> RateLimiter<C> {
    /// Create a limiter with a custom clock
    pub fn with_clock(min_interval: Duration, clock: C) -> Self {
        Self::with_shared_clock(min_interval, Arc::new(clock))
    }

    /// Create a limiter sharing an existing clock handle
    pub fn with_shared_clock(min_interval: Duration, clock: Arc<C>) -> Self {
        Self { min_interval, last_start: Arc::new(Mutex::new(None)), clock }
    }

    /// Configured minimum interval
    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Block until the caller may start its request
    ///
    /// Returns how long the caller waited.
    pub fn throttle(&self) -> Duration {
        let wait = self.reserve();
        if !wait.is_zero() {
            debug!(wait_ms = wait.as_millis() as u64, "throttling outbound request");
            self.clock.sleep(wait);
        }
        wait
    }

    /// Claim the next start slot and return the delay until it
    fn reserve(&self) -> Duration {
        let now = self.clock.now();
        let mut last_start = self.last_start.lock();

        let start = match *last_start {
            Some(previous) => {
                let earliest = previous + self.min_interval;
                if earliest > now {
                    earliest
                } else {
                    now
                }
            }
            None => now,
        };

        *last_start = Some(start);
        start.saturating_duration_since(now)
    }

    /// Forget the previous start so the next call proceeds immediately
    pub fn reset(&self) {
        *self.last_start.lock() = None;
    }
}

impl<C: Clock> Clone for RateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            min_interval: self.min_interval,
            last_start: Arc::clone(&self.last_start),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> std::fmt::Debug for RateLimiter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("min_interval", &self.min_interval)
            .field("last_start", &*self.last_start.lock())
            .finish()
    }
}
