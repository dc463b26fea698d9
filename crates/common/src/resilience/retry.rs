//! Category-aware retry policy
//!
//! The policy answers two questions for a failed attempt: should another
//! attempt be made, and how long to wait first. Both answers depend only on
//! the failure's [`ErrorCategory`] and the attempt index.
//!
//! | Category | Retried | Delay before next attempt |
//! |---|---|---|
//! | `network`, `timeout`, `server_error` | yes | exponential backoff + jitter |
//! | `rate_limit` | yes | fixed `rate_limit_delay` (or the server's hint) |
//! | `auth`, `client_error`, `unknown` | no | n/a |
//!
//! Attempts are numbered from 1. After attempt `max_attempts` fails with a
//! retryable category the policy stops with [`StopReason::Exhausted`].

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use super::Clock;
use crate::error::ErrorCategory;
use crate::utils::serde::{duration_millis, duration_secs};

/// Errors returned once the retry loop gives up
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The failure was not eligible for retry
    #[error("non-retryable {category} failure on attempt {attempts}")]
    NonRetryable {
        attempts: u32,
        category: ErrorCategory,
        #[source]
        source: E,
    },

    /// Every allowed attempt failed with a retryable category
    #[error("retries exhausted after {attempts} attempts (last failure: {category})")]
    Exhausted {
        attempts: u32,
        category: ErrorCategory,
        #[source]
        last: E,
    },
}

impl<E> RetryError<E> {
    /// Number of attempts made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::NonRetryable { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Category of the last failure
    pub fn category(&self) -> ErrorCategory {
        match self {
            RetryError::NonRetryable { category, .. } | RetryError::Exhausted { category, .. } => {
                *category
            }
        }
    }

    /// Whether the loop stopped because attempts ran out
    pub fn is_exhausted(&self) -> bool {
        matches!(self, RetryError::Exhausted { .. })
    }

    /// The last attempt's error
    pub fn into_inner(self) -> E {
        match self {
            RetryError::NonRetryable { source, .. } => source,
            RetryError::Exhausted { last, .. } => last,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

/// A failed attempt as seen by the retry loop
#[derive(Debug)]
pub struct AttemptFailure<E> {
    /// Classification of the failure
    pub category: ErrorCategory,
    /// Server-provided wait hint (`Retry-After`)
    pub retry_after: Option<Duration>,
    /// The attempt's own error
    pub error: E,
}

impl<E> AttemptFailure<E> {
    pub fn new(category: ErrorCategory, error: E) -> Self {
        Self { category, retry_after: None, error }
    }

    pub fn with_retry_after(mut self, retry_after: Option<Duration>) -> Self {
        self.retry_after = retry_after;
        self
    }
}

/// Why the policy stopped retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The category is never retried
    NonRetryable,
    /// `max_attempts` attempts have been made
    Exhausted,
}

/// Decision for a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then make another attempt
    Retry(Duration),
    /// Give up
    Stop(StopReason),
}

/// Backoff strategy for transient failures
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Fixed delay between retries
    Fixed {
        #[serde(with = "duration_millis")]
        delay: Duration,
    },
    /// `initial_delay * factor^(attempt - 1)`, capped at `max_delay`
    Exponential {
        #[serde(with = "duration_millis")]
        initial_delay: Duration,
        factor: f64,
        #[serde(with = "duration_millis")]
        max_delay: Duration,
    },
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential {
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl BackoffStrategy {
    /// Delay after the failure of attempt `attempt` (1-based), before jitter
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        match self {
            BackoffStrategy::Fixed { delay } => *delay,
            BackoffStrategy::Exponential { initial_delay, factor, max_delay } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let delay_ms = initial_delay.as_millis() as f64 * factor.powi(exponent);
                let capped = delay_ms.min(max_delay.as_millis() as f64);
                Duration::from_millis(capped.max(0.0) as u64)
            }
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if let BackoffStrategy::Exponential { factor, .. } = self {
            if !factor.is_finite() || *factor < 1.0 {
                return Err(ConfigError::invalid("backoff factor must be >= 1.0"));
            }
        }
        Ok(())
    }
}

/// Randomization applied to backoff delays
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Use the computed delay as-is
    None,
    /// Scale the delay by a random factor in `[1 - r, 1 + r]`
    Proportional(f64),
}

impl Default for Jitter {
    fn default() -> Self {
        Jitter::Proportional(0.5)
    }
}

impl Jitter {
    /// Apply jitter to `delay`
    pub fn apply(&self, delay: Duration) -> Duration {
        match *self {
            Jitter::None => delay,
            Jitter::Proportional(ratio) if ratio <= 0.0 || delay.is_zero() => delay,
            Jitter::Proportional(ratio) => {
                let offset = rand::thread_rng().gen_range(-ratio..=ratio);
                delay.mul_f64((1.0 + offset).max(0.0))
            }
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts per logical operation, including the first
    pub max_attempts: u32,
    /// Backoff for network, timeout and server errors
    pub backoff: BackoffStrategy,
    /// Randomization applied to backoff delays
    pub jitter: Jitter,
    /// Fixed wait after a rate-limited attempt
    #[serde(with = "duration_secs")]
    pub rate_limit_delay: Duration,
    /// Prefer the server's `Retry-After` hint when one is present
    pub honor_retry_after: bool,
    /// Upper bound applied to a server hint
    #[serde(with = "duration_secs")]
    pub max_retry_after: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::default(),
            jitter: Jitter::default(),
            rate_limit_delay: Duration::from_secs(60),
            honor_retry_after: true,
            max_retry_after: Duration::from_secs(300),
        }
    }
}

impl RetryConfig {
    /// Create a configuration builder
    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::invalid("max_attempts must be greater than 0"));
        }

        self.backoff.validate()?;

        if let Jitter::Proportional(ratio) = self.jitter {
            if !(0.0..=1.0).contains(&ratio) {
                return Err(ConfigError::invalid("jitter ratio must be within 0.0..=1.0"));
            }
        }

        Ok(())
    }
}

/// Builder for RetryConfig
#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    config: RetryConfig,
}

impl RetryConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    pub fn fixed_backoff(mut self, delay: Duration) -> Self {
        self.config.backoff = BackoffStrategy::Fixed { delay };
        self
    }

    pub fn exponential_backoff(
        mut self,
        initial_delay: Duration,
        factor: f64,
        max_delay: Duration,
    ) -> Self {
        self.config.backoff = BackoffStrategy::Exponential { initial_delay, factor, max_delay };
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.config.jitter = Jitter::None;
        self
    }

    pub fn jitter(mut self, ratio: f64) -> Self {
        self.config.jitter = Jitter::Proportional(ratio);
        self
    }

    pub fn rate_limit_delay(mut self, delay: Duration) -> Self {
        self.config.rate_limit_delay = delay;
        self
    }

    pub fn honor_retry_after(mut self, honor: bool) -> Self {
        self.config.honor_retry_after = honor;
        self
    }

    pub fn max_retry_after(mut self, cap: Duration) -> Self {
        self.config.max_retry_after = cap;
        self
    }

    pub fn build(self) -> ConfigResult<RetryConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Stateless retry decisions plus a blocking retry loop
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use statline_common::error::ErrorCategory;
/// use statline_common::resilience::{RetryConfig, RetryPolicy};
///
/// let policy = RetryPolicy::new(RetryConfig::builder().no_jitter().build().unwrap());
/// assert!(!policy.should_retry(ErrorCategory::Auth, 1));
/// assert_eq!(policy.delay_for(ErrorCategory::ServerError, 2), Duration::from_secs(2));
/// assert_eq!(policy.delay_for(ErrorCategory::RateLimit, 2), Duration::from_secs(60));
/// ```
#[derive(Debug, Clone, Default)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    pub fn max_attempts(&self) -> u32 {
        self.config.max_attempts
    }

    /// Whether attempt `attempt` failing with `category` warrants another try
    pub fn should_retry(&self, category: ErrorCategory, attempt: u32) -> bool {
        self.should_retry_within(category, attempt, self.config.max_attempts)
    }

    /// Like [`should_retry`](Self::should_retry) with an explicit attempt cap
    pub fn should_retry_within(
        &self,
        category: ErrorCategory,
        attempt: u32,
        max_attempts: u32,
    ) -> bool {
        category.is_retryable() && attempt < max_attempts
    }

    /// Wait before the attempt following failed attempt `attempt`
    ///
    /// Non-retryable categories yield `Duration::ZERO`.
    pub fn delay_for(&self, category: ErrorCategory, attempt: u32) -> Duration {
        match category {
            ErrorCategory::RateLimit => self.config.rate_limit_delay,
            ErrorCategory::Network | ErrorCategory::Timeout | ErrorCategory::ServerError => {
                self.config.jitter.apply(self.config.backoff.calculate_delay(attempt))
            }
            ErrorCategory::Auth | ErrorCategory::ClientError | ErrorCategory::Unknown => {
                Duration::ZERO
            }
        }
    }

    /// Wait before the next attempt, preferring a server hint when allowed
    pub fn delay_with_hint(
        &self,
        category: ErrorCategory,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> Duration {
        match retry_after {
            Some(hint) if self.config.honor_retry_after && category.is_retryable() => {
                hint.min(self.config.max_retry_after)
            }
            _ => self.delay_for(category, attempt),
        }
    }

    /// Decide what happens after attempt `attempt` fails
    pub fn decide(
        &self,
        category: ErrorCategory,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if !category.is_retryable() {
            RetryDecision::Stop(StopReason::NonRetryable)
        } else if attempt >= self.config.max_attempts {
            RetryDecision::Stop(StopReason::Exhausted)
        } else {
            RetryDecision::Retry(self.delay_with_hint(category, attempt, retry_after))
        }
    }

    /// Run `operation` until it succeeds or the policy stops
    ///
    /// `operation` receives the 1-based attempt index. Waits go through
    /// `clock`, so tests with a mock clock never block.
    pub fn run<T, E, C, F>(&self, clock: &C, mut operation: F) -> RetryResult<T, E>
    where
        C: Clock + ?Sized,
        F: FnMut(u32) -> Result<T, AttemptFailure<E>>,
    {
        let mut attempt = 1;
        loop {
            let failure = match operation(attempt) {
                Ok(value) => return Ok(value),
                Err(failure) => failure,
            };

            let category = failure.category;
            match self.decide(category, attempt, failure.retry_after) {
                RetryDecision::Retry(delay) => {
                    warn!(
                        attempt,
                        %category,
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed, retrying"
                    );
                    clock.sleep(delay);
                    attempt += 1;
                }
                RetryDecision::Stop(StopReason::NonRetryable) => {
                    debug!(attempt, %category, "attempt failed with non-retryable category");
                    return Err(RetryError::NonRetryable {
                        attempts: attempt,
                        category,
                        source: failure.error,
                    });
                }
                RetryDecision::Stop(StopReason::Exhausted) => {
                    warn!(attempt, %category, "retries exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        category,
                        last: failure.error,
                    });
                }
            }
        }
    }
}
