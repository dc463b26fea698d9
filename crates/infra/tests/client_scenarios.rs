//! End-to-end scenarios for the resilient client
//!
//! Every test drives a real `ResilientClient` over a scripted transport and
//! a mock clock, so backoff and cache expiry are observed without waiting.

mod support;

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use statline_common::cache::CacheConfig;
use statline_common::error::{ErrorCategory, ErrorClassification, ErrorSeverity};
use statline_common::resilience::CircuitState;
use statline_domain::{ClientError, GamesQuery, Operation, Params, SeasonType};
use statline_infra::{FnFallback, RawResponse, StaticFallback, TelemetrySink, TransportError};
use support::{config, ok, status, Harness};

fn games_params() -> Params {
    Params::new().with("year", 2025).with("week", 1)
}

/// Validates a first successful fetch.
///
/// Assertions:
/// - Confirms the decoded body is returned.
/// - Confirms one attempt was recorded as a success with its latency.
/// - Confirms the value was stored in the cache.
#[test]
fn test_success_is_cached() {
    let harness = Harness::new([ok(r#"[{"id": 401}]"#)]);

    let value = harness.client.fetch(Operation::Games, games_params()).unwrap();
    assert_eq!(value, json!([{"id": 401}]));

    let metrics = harness.client.metrics();
    assert_eq!(metrics.total_requests, 1);
    assert_eq!(metrics.successful_requests, 1);
    assert_eq!(metrics.total_latency_ms, 120);
    assert_eq!(harness.client.cache_stats().size, 1);
    assert!(harness.sink.reports().is_empty());
}

/// Validates that a repeat fetch inside the TTL is served from the cache.
///
/// Assertions:
/// - Confirms the transport is called once for two fetches.
/// - Confirms the second fetch records no attempt.
/// - Confirms the cache reports one hit.
#[test]
fn test_repeat_fetch_hits_cache() {
    let harness = Harness::new([ok("[1, 2]")]);

    let first = harness.client.fetch(Operation::Games, games_params()).unwrap();
    harness.clock.advance(Duration::from_secs(10));
    let second = harness.client.fetch(Operation::Games, games_params()).unwrap();

    assert_eq!(first, second);
    assert_eq!(harness.transport.calls(), 1);
    assert_eq!(harness.client.metrics().total_requests, 1);
    assert_eq!(harness.client.cache_stats().hits, 1);
}

/// Validates that an entry past its TTL is fetched again.
///
/// Assertions:
/// - Confirms the games entry is still served just before 900 seconds.
/// - Confirms it is refetched once 900 seconds have passed.
#[test]
fn test_expired_entry_is_refetched() {
    let harness = Harness::new([ok("[1]"), ok("[2]")]);

    harness.client.fetch(Operation::Games, games_params()).unwrap();
    harness.clock.advance(Duration::from_secs(899));
    assert_eq!(harness.client.fetch(Operation::Games, games_params()).unwrap(), json!([1]));
    harness.clock.advance(Duration::from_secs(1));
    let refreshed = harness.client.fetch(Operation::Games, games_params()).unwrap();

    assert_eq!(refreshed, json!([2]));
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates that different parameters are cached independently.
///
/// Assertions:
/// - Confirms two distinct queries each reach the transport.
/// - Confirms the parameters were sent as given.
#[test]
fn test_params_partition_cache() {
    let harness = Harness::new([ok("[1]"), ok("[2]")]);

    harness.client.fetch(Operation::Games, games_params()).unwrap();
    let week_two = Params::new().with("year", 2025).with("week", 2);
    assert_eq!(harness.client.fetch(Operation::Games, week_two).unwrap(), json!([2]));

    let requests = harness.transport.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].params().get("week"), Some("2"));
}

/// Validates the rate-limit path with the default fixed delay.
///
/// Assertions:
/// - Confirms the fetch succeeds on the second attempt.
/// - Confirms the client waited sixty seconds before retrying.
/// - Confirms one rate-limit hit and one retry were counted.
#[test]
fn test_rate_limited_then_success() {
    let harness = Harness::new([status(429), ok(r#"[{"spread": -3.5}]"#)]);

    let lines = harness.client.lines(2025, 3).unwrap();
    assert_eq!(lines, vec![json!({"spread": -3.5})]);

    assert_eq!(harness.retry_sleeps(), vec![Duration::from_secs(60)]);
    let metrics = harness.client.metrics();
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.rate_limit_hits, 1);
    assert_eq!(metrics.retries, 1);
    assert_eq!(metrics.successful_requests, 1);
}

/// Validates that a `Retry-After` hint replaces the fixed delay.
///
/// Assertions:
/// - Confirms the client waited the hinted seven seconds.
#[test]
fn test_retry_after_hint_is_honored() {
    let throttled = RawResponse::new(429, "").with_retry_after(Duration::from_secs(7));
    let harness = Harness::new([Ok(throttled), ok("[]")]);

    harness.client.fetch(Operation::Lines, Params::new().with("year", 2024)).unwrap();
    assert_eq!(harness.retry_sleeps(), vec![Duration::from_secs(7)]);
}

/// Validates persistent server errors.
///
/// Assertions:
/// - Confirms three attempts were made with exponential backoff.
/// - Confirms the error is `RetriesExhausted` classified as a server error.
/// - Confirms three server errors and two retries were counted.
/// - Confirms a single error report was emitted.
#[test]
fn test_server_errors_exhaust_retries() {
    let harness = Harness::new([status(500), status(502), status(503)]);

    let err = harness.client.fetch(Operation::Recruiting, Params::new()).unwrap_err();
    match &err {
        ClientError::RetriesExhausted { attempts, last, .. } => {
            assert_eq!(*attempts, 3);
            assert_eq!(last.status, Some(503));
        }
        other => panic!("expected exhausted retries, got {other:?}"),
    }
    assert_eq!(err.category(), ErrorCategory::ServerError);

    assert_eq!(harness.transport.calls(), 3);
    assert_eq!(harness.retry_sleeps(), vec![Duration::from_secs(1), Duration::from_secs(2)]);

    let metrics = harness.client.metrics();
    assert_eq!(metrics.server_errors, 3);
    assert_eq!(metrics.retries, 2);
    assert_eq!(metrics.successful_requests, 0);

    let reports = harness.sink.reports();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].category(), ErrorCategory::ServerError);
    assert_eq!(reports[0].context().get("attempts").map(String::as_str), Some("3"));
}

/// Validates that rejected credentials fail fast.
///
/// Assertions:
/// - Confirms a single attempt is made.
/// - Confirms the error is `InvalidCredentials` with high severity.
/// - Confirms nothing is cached and the next fetch goes to the network.
#[test]
fn test_auth_failure_is_not_retried() {
    let harness = Harness::new([status(401), ok("[]")]);

    let err = harness.client.fetch(Operation::Games, games_params()).unwrap_err();
    assert!(matches!(err, ClientError::InvalidCredentials { status: 401, .. }));
    assert_eq!(err.severity(), ErrorSeverity::High);
    assert_eq!(harness.transport.calls(), 1);
    assert!(harness.retry_sleeps().is_empty());
    assert_eq!(harness.client.metrics().auth_errors, 1);
    assert_eq!(harness.client.cache_stats().size, 0);

    harness.client.fetch(Operation::Games, games_params()).unwrap();
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates breaker tripping and the fast-fail that follows.
///
/// Assertions:
/// - Confirms five failed fetches open the games breaker.
/// - Confirms the sixth fetch fails with `BreakerOpen` without a send.
/// - Confirms other operations keep their own closed breaker.
#[test]
fn test_breaker_opens_after_threshold() {
    let script = std::iter::repeat_with(|| status(401)).take(5).chain([ok("[]")]);
    let harness = Harness::new(script);

    for _ in 0..5 {
        assert!(harness.client.fetch(Operation::Games, games_params()).is_err());
    }
    assert_eq!(harness.client.breaker_state(Operation::Games), CircuitState::Open);

    let err = harness.client.fetch(Operation::Games, games_params()).unwrap_err();
    match err {
        ClientError::BreakerOpen { operation, retry_in } => {
            assert_eq!(operation, Operation::Games);
            assert!(retry_in <= Duration::from_secs(60));
        }
        other => panic!("expected open breaker, got {other:?}"),
    }
    assert_eq!(harness.transport.calls(), 5);
    assert_eq!(harness.sink.reports().len(), 6);

    assert_eq!(harness.client.breaker_state(Operation::Media), CircuitState::Closed);
    harness.client.fetch(Operation::Media, Params::new()).unwrap();
}

/// Validates recovery through half-open after the recovery timeout.
///
/// Assertions:
/// - Confirms a trial call is admitted after sixty seconds.
/// - Confirms three successes close the breaker again.
#[test]
fn test_breaker_recovers_after_timeout() {
    let script = std::iter::repeat_with(|| status(403))
        .take(5)
        .chain(std::iter::repeat_with(|| ok("[]")).take(3));
    let mut cfg = config();
    cfg.cache = CacheConfig::builder().disable("weather").build();
    let harness = Harness::with_config(cfg, script);

    for _ in 0..5 {
        let _ = harness.client.fetch(Operation::Weather, Params::new());
    }
    assert_eq!(harness.client.breaker_state(Operation::Weather), CircuitState::Open);

    harness.clock.advance(Duration::from_secs(61));
    harness.client.fetch(Operation::Weather, Params::new()).unwrap();
    assert_eq!(harness.client.breaker_state(Operation::Weather), CircuitState::HalfOpen);

    harness.client.fetch(Operation::Weather, Params::new()).unwrap();
    harness.client.fetch(Operation::Weather, Params::new()).unwrap();
    assert_eq!(harness.client.breaker_state(Operation::Weather), CircuitState::Closed);
}

/// Validates transport failures.
///
/// Assertions:
/// - Confirms timeouts and refused connections are retried.
/// - Confirms both count as network errors.
#[test]
fn test_timeouts_are_retried() {
    let harness = Harness::new([
        Err(TransportError::timeout("deadline elapsed")),
        Err(TransportError::connect("connection refused")),
        ok("[]"),
    ]);

    harness.client.fetch(Operation::Media, Params::new()).unwrap();
    let metrics = harness.client.metrics();
    assert_eq!(metrics.network_errors, 2);
    assert_eq!(metrics.retries, 2);
}

/// Validates other 4xx responses.
///
/// Assertions:
/// - Confirms `RequestRejected` is returned after one attempt.
/// - Confirms the report context carries the endpoint and body.
#[test]
fn test_bad_request_is_rejected() {
    let harness =
        Harness::new([Ok(RawResponse::new(400, r#"{"error":"year must be numeric"}"#))]);

    let params = Params::new().with("year", "x");
    let err = harness.client.fetch(Operation::Ratings, params).unwrap_err();
    assert!(matches!(err, ClientError::RequestRejected { status: 400, .. }));
    assert_eq!(harness.transport.calls(), 1);

    let report = &harness.sink.reports()[0];
    assert_eq!(report.category(), ErrorCategory::ClientError);
    assert_eq!(report.context().get("endpoint").map(String::as_str), Some("/ratings/elo"));
    assert!(report.context()["body"].contains("year must be numeric"));
    assert!(!report.recovery_attempted());
}

/// Validates that report timestamps follow the injected clock.
///
/// Assertions:
/// - Confirms the report time matches the mock wall clock.
#[test]
fn test_report_uses_client_clock() {
    let harness = Harness::new([status(404)]);

    harness.client.fetch(Operation::Games, games_params()).unwrap_err();
    let report = &harness.sink.reports()[0];
    assert!(report.timestamp().timestamp() >= 1_760_000_000);
    assert!(report.timestamp().timestamp() < 1_760_000_060);
}

/// Validates typed decoding.
///
/// Assertions:
/// - Confirms matching records deserialize.
/// - Confirms a mismatched shape fails with `Decode` and is reported.
#[test]
fn test_fetch_as_decodes_records() {
    #[derive(Debug, Deserialize, PartialEq)]
    struct Talent {
        school: String,
        talent: f64,
    }

    let harness = Harness::new([
        ok(r#"[{"school": "Georgia", "talent": 1012.5}]"#),
        ok(r#"{"unexpected": true}"#),
    ]);

    let talent: Vec<Talent> =
        harness.client.fetch_as(Operation::TeamTalent, Params::new().with("year", 2024)).unwrap();
    assert_eq!(talent, vec![Talent { school: "Georgia".into(), talent: 1012.5 }]);

    let err = harness
        .client
        .fetch_as::<Vec<Talent>>(Operation::TeamTalent, Params::new().with("year", 2023))
        .unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
    assert_eq!(harness.sink.reports().len(), 1);
}

/// Validates the typed games operation.
///
/// Assertions:
/// - Confirms the query is rendered with the API's parameter names.
/// - Confirms a non-array body is a reported `Decode` error.
#[test]
fn test_games_operation() {
    let harness = Harness::new([ok(r#"[{"id": 1}, {"id": 2}]"#), ok(r#"{"id": 3}"#)]);

    let query =
        GamesQuery::new(2024).week(3).season_type(SeasonType::Postseason).team("Ohio State");
    let games = harness.client.games(&query).unwrap();
    assert_eq!(games.len(), 2);

    let request = &harness.transport.requests()[0];
    assert_eq!(request.path(), "/games");
    assert_eq!(request.params().get("seasonType"), Some("postseason"));
    assert_eq!(request.params().get("team"), Some("Ohio State"));

    let err = harness.client.sp_ratings(2024, Some("Michigan")).unwrap_err();
    assert!(matches!(err, ClientError::Decode { operation: Operation::SpRatings, .. }));
    assert_eq!(harness.sink.reports().len(), 1);
}

/// Validates that a wrongly shaped body is never cached.
///
/// Assertions:
/// - Confirms an object body for lines fails with `Decode`.
/// - Confirms the shape failure counts against the breaker.
/// - Confirms the next call reaches the transport and gets the array.
#[test]
fn test_wrong_shape_is_not_cached() {
    let harness = Harness::new([ok(r#"{"error": "maintenance"}"#), ok("[1]")]);

    let err = harness.client.lines(2025, 3).unwrap_err();
    assert!(matches!(err, ClientError::Decode { operation: Operation::Lines, .. }));
    assert_eq!(harness.sink.reports().len(), 1);
    assert_eq!(harness.client.cache_stats().inserts, 0);

    let record = harness
        .client
        .breaker_records()
        .into_iter()
        .find(|record| record.name == "lines")
        .unwrap();
    assert_eq!(record.consecutive_failures, 1);

    let lines = harness.client.lines(2025, 3).unwrap();
    assert_eq!(lines, vec![json!(1)]);
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates that an empty body is not cached for a typed fetch.
///
/// Assertions:
/// - Confirms a 204 read as null fails to decode into a list.
/// - Confirms the retry after it fetches again and decodes.
#[test]
fn test_empty_body_is_not_cached_for_fetch_as() {
    let harness = Harness::new([status(204), ok(r#"[{"outlet": "ESPN"}]"#)]);
    let params = || Params::new().with("year", 2024);

    let err = harness.client.fetch_as::<Vec<serde_json::Value>>(Operation::Media, params());
    assert!(matches!(err, Err(ClientError::Decode { .. })));

    let media: Vec<serde_json::Value> =
        harness.client.fetch_as(Operation::Media, params()).unwrap();
    assert_eq!(media, vec![json!({"outlet": "ESPN"})]);
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates a label disabled in the cache config.
///
/// Assertions:
/// - Confirms predicted points always reach the transport.
#[test]
fn test_disabled_label_bypasses_cache() {
    let mut cfg = config();
    cfg.cache = CacheConfig::builder().disable("predicted_points").build();
    let harness = Harness::with_config(cfg, [ok("[1]"), ok("[2]")]);

    harness.client.predicted_points(2024, Some(1)).unwrap();
    let second = harness.client.predicted_points(2024, Some(1)).unwrap();
    assert_eq!(second, vec![json!(2)]);
    assert_eq!(harness.transport.calls(), 2);
}

/// Validates explicit invalidation.
///
/// Assertions:
/// - Confirms invalidating one operation leaves the others cached.
/// - Confirms invalidating everything empties the cache.
#[test]
fn test_invalidate() {
    let harness = Harness::new([ok("[]"), ok("[]")]);

    harness.client.recruiting(2024).unwrap();
    harness.client.team_talent(2024).unwrap();
    assert_eq!(harness.client.invalidate(Some(Operation::Recruiting)), 1);
    assert_eq!(harness.client.cache_stats().size, 1);
    assert_eq!(harness.client.invalidate(None), 1);
    assert_eq!(harness.client.cache_stats().size, 0);
}

/// Validates the opt-in fallback path.
///
/// Assertions:
/// - Confirms the first strategy that yields a value wins.
/// - Confirms the report marks the recovery as attempted and successful.
/// - Confirms the plain fetch path does not use fallbacks.
#[test]
fn test_fallback_recovers_failure() {
    let clock = statline_common::resilience::MockClock::new();
    let transport = support::ScriptedTransport::new([status(500), status(500), status(500)]);
    let sink = std::sync::Arc::new(statline_infra::MemorySink::new());
    let client = statline_infra::ResilientClient::builder(config())
        .transport(transport.clone())
        .telemetry(sink.clone())
        .clock(clock)
        .fallback(Operation::Lines, FnFallback::new("none", |_, _| None))
        .fallback(Operation::Lines, StaticFallback::empty_list("empty-lines"))
        .build()
        .unwrap();

    let recovery = client.fetch_with_fallbacks(Operation::Lines, Params::new()).unwrap();
    assert!(recovery.is_fallback());
    assert_eq!(recovery.strategy.as_deref(), Some("empty-lines"));
    assert_eq!(recovery.value, json!([]));

    let report = recovery.report.unwrap();
    assert!(report.recovery_attempted());
    assert!(report.recovery_successful());
    assert_eq!(sink.reports().len(), 1);
    assert_eq!(client.cache_stats().size, 0, "fallback values are not cached");

    assert!(client.fetch(Operation::Lines, Params::new()).is_err());
}

/// Validates fallbacks when no strategy applies.
///
/// Assertions:
/// - Confirms a successful fetch is returned unchanged.
/// - Confirms an unrecovered failure returns the original error.
#[test]
fn test_fallback_without_strategy() {
    let harness = Harness::new([ok("[7]"), status(401)]);

    let recovery = harness.client.fetch_with_fallbacks(Operation::Media, Params::new()).unwrap();
    assert!(!recovery.is_fallback());
    assert_eq!(recovery.value, json!([7]));

    let err = harness
        .client
        .fetch_with_fallbacks(Operation::Media, Params::new().with("year", 2020))
        .unwrap_err();
    assert!(matches!(err, ClientError::InvalidCredentials { .. }));

    let reports = harness.sink.reports();
    assert_eq!(reports.len(), 1);
    assert!(!reports[0].recovery_attempted());
}

/// Validates that the client is shareable across threads.
///
/// Assertions:
/// - Confirms concurrent fetches of distinct queries all succeed.
/// - Confirms every attempt was recorded.
#[test]
fn test_concurrent_fetches() {
    let script = (0..8).map(|i| ok(&format!("[{i}]")));
    let harness = Harness::new(script);

    std::thread::scope(|scope| {
        for week in 0..8u8 {
            let client = &harness.client;
            scope.spawn(move || {
                client.fetch(Operation::Weather, Params::new().with("week", week)).unwrap();
            });
        }
    });

    assert_eq!(harness.transport.calls(), 8);
    assert_eq!(harness.sink.snapshot().successful_requests, 8);
}
