//! Integration tests for statline-domain configuration and error types.

use std::time::Duration;

use chrono::Utc;
use statline_common::cache::CacheTtl;
use statline_common::error::{ErrorCategory, ErrorClassification, ErrorSeverity};
use statline_domain::{
    ApiHost, AttemptOutcome, ClientConfig, ClientError, ErrorReport, GamesQuery, Operation,
    SeasonType,
};

/// Validates that a partial TOML file fills the rest from defaults.
///
/// Assertions:
/// - Confirms named values are applied (host, timeout, retry attempts).
/// - Confirms untouched sections keep their defaults.
/// - Confirms the key is read even though it is never written back.
#[test]
fn test_partial_toml_config() {
    let raw = r#"
        [api]
        host = "next"
        api_key = "abc123"
        timeout_secs = 10

        [retry]
        max_attempts = 5

        [cache]
        default_ttl = 60

        [cache.ttl_overrides]
        lines = 0
    "#;

    let config: ClientConfig = toml::from_str(raw).unwrap();
    assert_eq!(config.api.host, ApiHost::Next);
    assert_eq!(config.api.timeout, Duration::from_secs(10));
    assert_eq!(config.api.api_key.as_ref().map(|k| k.expose()), Some("abc123"));
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.circuit_breaker.failure_threshold, 5);
    assert_eq!(config.rate_limit.min_interval, Duration::from_millis(500));
    assert_eq!(config.cache.ttl_for("lines"), CacheTtl::Disabled);
    assert_eq!(config.cache.ttl_for("games"), CacheTtl::Expires(Duration::from_secs(60)));
    assert!(config.validate().is_ok());
}

/// Validates that invalid nested values are reported by section.
///
/// Assertions:
/// - Ensures zero retry attempts fail validation with a `retry:` prefix.
/// - Ensures a zero breaker threshold fails with a `circuit_breaker:` prefix.
#[test]
fn test_validation_names_section() {
    let mut config = ClientConfig::new("key");
    config.retry.max_attempts = 0;
    let err = config.validate().unwrap_err();
    assert!(matches!(err, ClientError::Config(_)));
    assert!(err.to_string().contains("retry:"));

    let mut config = ClientConfig::new("key");
    config.circuit_breaker.failure_threshold = 0;
    assert!(config.validate().unwrap_err().to_string().contains("circuit_breaker:"));
}

/// Validates that an error becomes a report carrying its context.
///
/// Assertions:
/// - Confirms category and severity flow from the classification.
/// - Confirms operation, endpoint and attempts land in the context.
#[test]
fn test_error_to_report() {
    let last = AttemptOutcome::failure(
        None,
        ErrorCategory::Timeout,
        Duration::from_secs(30),
        3,
        Utc::now(),
    );
    let err = ClientError::RetriesExhausted {
        operation: Operation::Weather,
        endpoint: "/games/weather".into(),
        attempts: 3,
        last,
    };

    let report = ErrorReport::builder(err.category(), err.to_string())
        .severity(Some(err.severity()))
        .extend_context(err.context())
        .build();

    assert_eq!(report.category(), ErrorCategory::Timeout);
    assert_eq!(report.severity(), ErrorSeverity::Medium);
    assert_eq!(report.context()["operation"], "weather");
    assert_eq!(report.context()["endpoint"], "/games/weather");
    assert_eq!(report.context()["attempts"], "3");
    assert!(report.message().contains("attempt 3 failed (timeout)"));
}

/// Validates that the games query drives the request descriptor.
///
/// Assertions:
/// - Confirms the descriptor path and rendered query string.
/// - Confirms season types parse case-insensitively.
#[test]
fn test_games_request() {
    let season: SeasonType = "Postseason".parse().unwrap();
    let query = GamesQuery::new(2024).season_type(season).week(1);
    let request = Operation::Games.request(query.to_params());

    assert_eq!(request.to_string(), "GET /games?seasonType=postseason&week=1&year=2024");
    assert!("preseason".parse::<SeasonType>().is_err());
}
