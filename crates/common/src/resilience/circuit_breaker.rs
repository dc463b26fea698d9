//! Circuit breaker for named operation families
//!
//! Each breaker owns a single record guarded by one mutex. Admission and
//! outcome recording each take that lock exactly once, so state transitions
//! are atomic with respect to concurrent callers and are applied in the
//! order calls complete. The wrapped operation itself always runs with the
//! lock released.
//!
//! ```text
//!            failures >= failure_threshold
//!   CLOSED ───────────────────────────────▶ OPEN
//!     ▲                                      │ now - last_transition
//!     │ successes >= success_threshold       │   >= recovery_timeout
//!     │                                      ▼
//!     └──────────────────────────────── HALF_OPEN
//!                                            │ any failure
//!                                            └──────────▶ OPEN
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::{Clock, SystemClock};
use crate::utils::serde::duration_secs;

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

impl ConfigError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid { message: message.into() }
    }
}

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors produced by a call guarded by a circuit breaker
///
/// Generic over the wrapped operation's error type so the original failure
/// is preserved untouched.
#[derive(Debug, Error)]
pub enum ResilienceError<E> {
    /// The breaker rejected the call without invoking the operation
    #[error("circuit breaker '{name}' is open; next trial in {retry_in:?}")]
    CircuitOpen {
        /// Breaker (operation family) name
        name: String,
        /// Time until a trial call becomes eligible
        retry_in: Duration,
    },

    /// The underlying operation failed
    #[error("operation failed")]
    OperationFailed {
        #[source]
        source: E,
    },
}

impl<E> ResilienceError<E> {
    /// Whether the breaker rejected the call
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, ResilienceError::CircuitOpen { .. })
    }

    /// The wrapped operation's error, if the operation ran
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            ResilienceError::OperationFailed { source } => Some(source),
            ResilienceError::CircuitOpen { .. } => None,
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing a trial request to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub failure_threshold: u32,
    /// Consecutive half-open successes that close the circuit
    pub success_threshold: u32,
    /// Time to wait before an open circuit admits a trial call
    #[serde(with = "duration_secs")]
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 3,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::invalid("failure_threshold must be greater than 0"));
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::invalid("success_threshold must be greater than 0"));
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Breaker
//==============================================================================

/// Point-in-time view of one breaker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerRecord {
    pub name: String,
    pub state: CircuitState,
    pub consecutive_failures: u32,
    pub consecutive_successes: u32,
    pub last_transition_time: DateTime<Utc>,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    consecutive_failures: u32,
    consecutive_successes: u32,
    last_transition: Instant,
    last_transition_time: DateTime<Utc>,
    trial_in_flight: bool,
}

impl BreakerState {
    fn transition(&mut self, to: CircuitState, now: Instant, wall: DateTime<Utc>) {
        self.state = to;
        self.consecutive_failures = 0;
        self.consecutive_successes = 0;
        self.last_transition = now;
        self.last_transition_time = wall;
    }
}

/// Circuit breaker guarding one named operation family
///
/// # Examples
///
/// ```rust
/// use statline_common::resilience::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
///
/// let breaker = CircuitBreaker::new("games", CircuitBreakerConfig::default()).unwrap();
/// let value: Result<u32, _> = breaker.call(|| Ok::<_, std::io::Error>(7));
/// assert_eq!(value.unwrap(), 7);
/// assert_eq!(breaker.state(), CircuitState::Closed);
/// ```
pub struct CircuitBreaker<C: Clock = SystemClock> {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    clock: Arc<C>,
}

impl<C: Clock> fmt::Debug for CircuitBreaker<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &*self.inner.lock())
            .finish()
    }
}

impl CircuitBreaker<SystemClock> {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, SystemClock)
    }
}

impl<C: Clock> CircuitBreaker<C> {
    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: C,
    ) -> ConfigResult<Self> {
        Self::with_shared_clock(name, config, Arc::new(clock))
    }

    /// Create a new circuit breaker sharing an existing clock handle
    pub fn with_shared_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: Arc<C>,
    ) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self::from_parts(name.into(), config, clock))
    }

    fn from_parts(name: String, config: CircuitBreakerConfig, clock: Arc<C>) -> Self {
        let inner = BreakerState {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            consecutive_successes: 0,
            last_transition: clock.now(),
            last_transition_time: DateTime::<Utc>::from(clock.system_time()),
            trial_in_flight: false,
        };

        Self { name, config, inner: Mutex::new(inner), clock }
    }

    /// Breaker name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Active configuration
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state
    ///
    /// An open breaker whose recovery timeout has elapsed still reports
    /// `Open` here; the transition happens when the next call is admitted.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Snapshot of the breaker's record
    pub fn record(&self) -> CircuitBreakerRecord {
        let inner = self.inner.lock();
        CircuitBreakerRecord {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            consecutive_successes: inner.consecutive_successes,
            last_transition_time: inner.last_transition_time,
        }
    }

    /// Execute a synchronous operation with circuit breaker protection
    ///
    /// Any `Err` returned by `operation` counts as a failure.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub fn call<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let permit = match self.acquire() {
            Ok(permit) => permit,
            Err(retry_in) => {
                debug!(retry_in_ms = retry_in.as_millis() as u64, "circuit breaker rejecting call");
                return Err(ResilienceError::CircuitOpen { name: self.name.clone(), retry_in });
            }
        };

        match operation() {
            Ok(value) => {
                permit.succeed();
                Ok(value)
            }
            Err(source) => {
                permit.fail();
                Err(ResilienceError::OperationFailed { source })
            }
        }
    }

    /// Admit a call or return the time until the next trial
    fn acquire(&self) -> Result<Permit<'_, C>, Duration> {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed => Ok(Permit { breaker: self, trial: false, settled: false }),
            CircuitState::Open => {
                let elapsed = now.saturating_duration_since(inner.last_transition);
                if elapsed >= self.config.recovery_timeout {
                    let wall = DateTime::<Utc>::from(self.clock.system_time());
                    inner.transition(CircuitState::HalfOpen, now, wall);
                    inner.trial_in_flight = true;
                    info!(breaker = %self.name, "circuit breaker half-open, admitting trial call");
                    Ok(Permit { breaker: self, trial: true, settled: false })
                } else {
                    Err(self.config.recovery_timeout - elapsed)
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    Err(Duration::ZERO)
                } else {
                    inner.trial_in_flight = true;
                    Ok(Permit { breaker: self, trial: true, settled: false })
                }
            }
        }
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        }

        match inner.state {
            CircuitState::Closed => inner.consecutive_failures = 0,
            CircuitState::HalfOpen if trial => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.success_threshold {
                    let successes = inner.consecutive_successes;
                    let wall = DateTime::<Utc>::from(self.clock.system_time());
                    inner.transition(CircuitState::Closed, self.clock.now(), wall);
                    info!(breaker = %self.name, successes, "circuit breaker closed");
                }
            }
            // A call admitted before the breaker opened finished late
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.inner.lock();
        if trial {
            inner.trial_in_flight = false;
        }

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    let failures = inner.consecutive_failures;
                    let wall = DateTime::<Utc>::from(self.clock.system_time());
                    inner.transition(CircuitState::Open, self.clock.now(), wall);
                    warn!(breaker = %self.name, failures, "circuit breaker opened");
                }
            }
            CircuitState::HalfOpen if trial => {
                let wall = DateTime::<Utc>::from(self.clock.system_time());
                inner.transition(CircuitState::Open, self.clock.now(), wall);
                warn!(breaker = %self.name, "circuit breaker reopened after failed trial");
            }
            CircuitState::HalfOpen | CircuitState::Open => {}
        }
    }

    /// Force the breaker back to `Closed`
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        let wall = DateTime::<Utc>::from(self.clock.system_time());
        inner.transition(CircuitState::Closed, self.clock.now(), wall);
        inner.trial_in_flight = false;
    }
}

/// Admission ticket for one call
///
/// Dropping an unsettled permit (the operation panicked) records a failure
/// so a half-open breaker never stays blocked on a trial that will not
/// finish.
struct Permit<'a, C: Clock> {
    breaker: &'a CircuitBreaker<C>,
    trial: bool,
    settled: bool,
}

impl<C: Clock> Permit<'_, C> {
    fn succeed(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    fn fail(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl<C: Clock> Drop for Permit<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_failure(self.trial);
        }
    }
}

//==============================================================================
// Registry
//==============================================================================

/// Lazily created breakers keyed by operation name
///
/// Every name gets its own breaker and its own lock, so unrelated
/// operations never contend.
pub struct CircuitBreakerRegistry<C: Clock = SystemClock> {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker<C>>>,
    clock: Arc<C>,
}

impl CircuitBreakerRegistry<SystemClock> {
    /// Create a registry using the system clock
    pub fn new(config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> CircuitBreakerRegistry<C> {
    /// Create a registry with a custom clock
    pub fn with_clock(config: CircuitBreakerConfig, clock: C) -> ConfigResult<Self> {
        Self::with_shared_clock(config, Arc::new(clock))
    }

    /// Create a registry sharing an existing clock handle
    pub fn with_shared_clock(config: CircuitBreakerConfig, clock: Arc<C>) -> ConfigResult<Self> {
        config.validate()?;
        Ok(Self { config, breakers: DashMap::new(), clock })
    }

    /// Breaker for `name`, created on first use
    pub fn breaker(&self, name: &str) -> Arc<CircuitBreaker<C>> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::from_parts(
                name.to_string(),
                self.config.clone(),
                Arc::clone(&self.clock),
            ))
        });
        Arc::clone(entry.value())
    }

    /// Run `operation` through the breaker named `name`
    pub fn call<F, T, E>(&self, name: &str, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
    {
        // The map shard guard is released before the operation runs.
        let breaker = self.breaker(name);
        breaker.call(operation)
    }

    /// State of the breaker named `name` (`Closed` if it has never run)
    pub fn state(&self, name: &str) -> CircuitState {
        self.breakers.get(name).map(|b| b.state()).unwrap_or(CircuitState::Closed)
    }

    /// Record of the breaker named `name`, if it exists
    pub fn record(&self, name: &str) -> Option<CircuitBreakerRecord> {
        self.breakers.get(name).map(|b| b.record())
    }

    /// Records of every breaker, sorted by name
    pub fn records(&self) -> Vec<CircuitBreakerRecord> {
        let mut records: Vec<_> = self.breakers.iter().map(|b| b.record()).collect();
        records.sort_by(|a, b| a.name.cmp(&b.name));
        records
    }

    /// Force the breaker named `name` back to `Closed`
    pub fn reset(&self, name: &str) {
        if let Some(breaker) = self.breakers.get(name) {
            breaker.reset();
        }
    }

    /// Number of breakers created so far
    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}

impl<C: Clock> fmt::Debug for CircuitBreakerRegistry<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircuitBreakerRegistry")
            .field("config", &self.config)
            .field("breakers", &self.records())
            .finish()
    }
}
