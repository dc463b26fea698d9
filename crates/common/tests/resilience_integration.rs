//! Integration tests for resilience module
//!
//! Tests the composition used by the API client: a circuit breaker wrapping
//! a retry loop whose attempts are throttled by a rate limiter, all driven
//! by one shared mock clock.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use statline_common::error::ErrorCategory;
use statline_common::resilience::{
    AttemptFailure, CircuitBreakerConfig, CircuitBreakerRegistry, CircuitState, Clock, MockClock,
    RateLimiter, ResilienceError, RetryConfig, RetryError, RetryPolicy,
};

/// Custom error type for testing
#[derive(Debug, Clone, PartialEq)]
struct TestError {
    status: u16,
}

impl std::fmt::Display for TestError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "upstream returned {}", self.status)
    }
}

impl std::error::Error for TestError {}

struct Harness {
    clock: MockClock,
    limiter: RateLimiter<MockClock>,
    retry: RetryPolicy,
    breakers: CircuitBreakerRegistry<MockClock>,
}

impl Harness {
    fn new() -> Self {
        let clock = MockClock::new();
        Self {
            limiter: RateLimiter::with_clock(Duration::from_millis(500), clock.clone()),
            retry: RetryPolicy::new(RetryConfig::builder().no_jitter().build().unwrap()),
            breakers: CircuitBreakerRegistry::with_clock(
                CircuitBreakerConfig::default(),
                clock.clone(),
            )
            .unwrap(),
            clock,
        }
    }

    /// One logical call whose attempts return the scripted statuses
    fn call(
        &self,
        name: &str,
        statuses: &[u16],
        sends: &AtomicU32,
    ) -> Result<u16, ResilienceError<RetryError<TestError>>> {
        self.breakers.call(name, || {
            self.retry.run(&self.clock, |attempt| {
                self.limiter.throttle();
                sends.fetch_add(1, Ordering::SeqCst);
                let status = statuses[(attempt as usize - 1).min(statuses.len() - 1)];
                match classify(status) {
                    None => Ok(status),
                    Some(category) => Err(AttemptFailure::new(category, TestError { status })),
                }
            })
        })
    }
}

fn classify(status: u16) -> Option<ErrorCategory> {
    statline_common::ErrorClassifier::classify_status(status)
}

/// Validates recovery from a rate-limited first attempt.
///
/// # Test Steps
/// 1. Script a 429 followed by a 200
/// 2. Run one logical call through breaker, retry and limiter
/// 3. Verify the value, the number of sends and the waits taken
///
/// Assertions:
/// - Confirms the call returns 200 after two sends.
/// - Confirms the only wait recorded is the fixed 60s rate-limit delay
///   (the limiter needs no extra wait after it).
#[test]
fn test_rate_limited_attempt_recovers() {
    let harness = Harness::new();
    let sends = AtomicU32::new(0);

    let status = harness.call("lines", &[429, 200], &sends).unwrap();

    assert_eq!(status, 200);
    assert_eq!(sends.load(Ordering::SeqCst), 2);
    assert_eq!(harness.clock.sleeps(), vec![Duration::from_secs(60)]);
}

/// Validates that exhausted retries count as one breaker failure.
///
/// Assertions:
/// - Confirms `RetryError::Exhausted` with three attempts surfaces as the
///   breaker's operation error.
/// - Confirms the breaker records exactly one consecutive failure.
#[test]
fn test_exhausted_retries_feed_breaker_once() {
    let harness = Harness::new();
    let sends = AtomicU32::new(0);

    let err = harness.call("games", &[500], &sends).unwrap_err();

    match err {
        ResilienceError::OperationFailed { source } => {
            assert!(source.is_exhausted());
            assert_eq!(source.attempts(), 3);
            assert_eq!(source.into_inner(), TestError { status: 500 });
        }
        other => panic!("expected OperationFailed, got {other:?}"),
    }
    assert_eq!(sends.load(Ordering::SeqCst), 3);
    assert_eq!(harness.breakers.record("games").unwrap().consecutive_failures, 1);
}

/// Validates that five failed logical calls trip the breaker and the sixth
/// never reaches the operation.
///
/// Assertions:
/// - Confirms the breaker is `Open` after five 401 calls.
/// - Confirms the sixth call is `CircuitOpen` and sends stay at five.
/// - Confirms an unrelated operation is unaffected.
#[test]
fn test_breaker_trips_after_five_failed_calls() {
    let harness = Harness::new();
    let sends = AtomicU32::new(0);

    for _ in 0..5 {
        let err = harness.call("games", &[401], &sends).unwrap_err();
        assert!(!err.is_circuit_open());
    }
    assert_eq!(harness.breakers.state("games"), CircuitState::Open);

    let err = harness.call("games", &[200], &sends).unwrap_err();
    assert!(err.is_circuit_open());
    assert_eq!(sends.load(Ordering::SeqCst), 5);

    let other = AtomicU32::new(0);
    assert_eq!(harness.call("lines", &[200], &other).unwrap(), 200);
}

/// Validates recovery of an open breaker through three trial calls.
///
/// Assertions:
/// - Confirms the first call after 60s runs and leaves the breaker
///   half-open.
/// - Confirms the breaker closes after the third successful trial.
#[test]
fn test_breaker_recovers_after_timeout() {
    let harness = Harness::new();
    let sends = AtomicU32::new(0);

    for _ in 0..5 {
        let _ = harness.call("media", &[403], &sends);
    }
    harness.clock.advance(Duration::from_secs(60));

    assert_eq!(harness.call("media", &[200], &sends).unwrap(), 200);
    assert_eq!(harness.breakers.state("media"), CircuitState::HalfOpen);

    harness.call("media", &[200], &sends).unwrap();
    harness.call("media", &[200], &sends).unwrap();
    assert_eq!(harness.breakers.state("media"), CircuitState::Closed);
}

/// Validates concurrent throttling on the real clock.
///
/// # Test Steps
/// 1. Share one limiter with a 20ms interval across four threads
/// 2. Let each thread throttle once
/// 3. Verify the total span covers three intervals
///
/// Assertions:
/// - Ensures the elapsed wall time is at least 60ms.
#[test]
fn test_limiter_spaces_concurrent_threads() {
    let limiter = Arc::new(RateLimiter::new(Duration::from_millis(20)));
    let clock = statline_common::SystemClock;
    let start = clock.now();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let limiter = Arc::clone(&limiter);
            thread::spawn(move || {
                limiter.throttle();
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("throttling thread panicked");
    }

    assert!(clock.now().duration_since(start) >= Duration::from_millis(60));
}
