//! Time abstraction for testability
//!
//! Every component that reads time or waits goes through [`Clock`]: the
//! rate limiter, retry backoff, circuit breaker recovery windows and cache
//! expiry. Production code uses [`SystemClock`]; tests use [`MockClock`],
//! whose `sleep` advances virtual time instantly.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Trait for time operations to enable deterministic testing
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Block the calling thread for `duration`
    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Implement Clock for Arc<T> where T: Clock for convenient cloning
impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }

    fn sleep(&self, duration: Duration) {
        (**self).sleep(duration)
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same virtual timeline. `sleep` never blocks: it
/// advances the timeline and records the requested duration so tests can
/// assert on backoff and throttling delays.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    epoch_offset: Duration,
    elapsed: Arc<Mutex<Duration>>,
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self::with_current_time(Instant::now())
    }

    /// Create a new mock clock with a specific start time
    pub fn with_current_time(start: Instant) -> Self {
        Self {
            start,
            epoch_offset: Duration::ZERO,
            elapsed: Arc::new(Mutex::new(Duration::ZERO)),
            sleeps: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Anchor the wall clock at `since_epoch` after the UNIX epoch
    ///
    /// Useful when timestamps end up in reports and need to look realistic.
    pub fn with_wall_time(mut self, since_epoch: Duration) -> Self {
        self.epoch_offset = since_epoch;
        self
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed += duration;
        }
    }

    /// Advance the mock clock by milliseconds (convenience method)
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        if let Ok(mut elapsed) = self.elapsed.lock() {
            *elapsed = duration;
        }
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        self.elapsed.lock().map(|e| *e).unwrap_or(Duration::ZERO)
    }

    /// Every duration passed to `sleep`, in call order
    pub fn sleeps(&self) -> Vec<Duration> {
        self.sleeps.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Sum of all recorded sleeps
    pub fn total_slept(&self) -> Duration {
        self.sleeps().iter().sum()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.epoch_offset + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if let Ok(mut sleeps) = self.sleeps.lock() {
            sleeps.push(duration);
        }
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for clock implementations.

    use super::*;

    /// Validates the system clock now scenario.
    ///
    /// Assertions:
    /// - Ensures `now2 >= now1` evaluates to true.
    #[test]
    fn test_system_clock_now() {
        let clock = SystemClock;
        let now1 = clock.now();
        let now2 = clock.now();
        assert!(now2 >= now1, "System clock should advance");
    }

    /// Validates `MockClock::advance` behavior.
    ///
    /// Assertions:
    /// - Confirms `after.duration_since(start)` equals
    ///   `Duration::from_secs(5)`.
    #[test]
    fn test_mock_clock_advance() {
        let clock = MockClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(5));
        let after = clock.now();

        assert_eq!(
            after.duration_since(start),
            Duration::from_secs(5),
            "Mock clock should advance by specified duration"
        );
    }

    /// Validates that mock sleeps are recorded and move time forward
    /// without blocking.
    ///
    /// Assertions:
    /// - Confirms `clock.sleeps()` equals the requested durations.
    /// - Confirms `clock.elapsed()` equals their sum.
    #[test]
    fn test_mock_clock_sleep_advances_time() {
        let clock = MockClock::new();
        clock.sleep(Duration::from_secs(60));
        clock.sleep(Duration::from_millis(250));

        assert_eq!(clock.sleeps(), vec![Duration::from_secs(60), Duration::from_millis(250)]);
        assert_eq!(clock.elapsed(), Duration::from_millis(60_250));
        assert_eq!(clock.total_slept(), Duration::from_millis(60_250));
    }

    /// Validates that clones share one timeline.
    ///
    /// Assertions:
    /// - Confirms `clock1.elapsed()` equals `Duration::from_secs(15)`.
    /// - Confirms the sleep recorded through the clone is visible on the
    ///   original.
    #[test]
    fn test_mock_clock_clone_shares_timeline() {
        let clock1 = MockClock::new();
        clock1.advance(Duration::from_secs(10));

        let clock2 = clock1.clone();
        clock2.sleep(Duration::from_secs(5));

        assert_eq!(clock1.elapsed(), Duration::from_secs(15));
        assert_eq!(clock1.sleeps().len(), 1);
    }

    /// Validates wall-clock anchoring.
    ///
    /// Assertions:
    /// - Confirms `millis_since_epoch` equals the anchor plus elapsed time.
    #[test]
    fn test_mock_clock_wall_time() {
        let clock = MockClock::new().with_wall_time(Duration::from_secs(1_750_000_000));
        clock.advance_millis(1500);

        assert_eq!(clock.millis_since_epoch(), 1_750_000_001_500);
    }
}
