//! Client configuration
//!
//! [`ClientConfig`] groups every tunable of the client. All sections have
//! defaults, so a config file only needs to name what it changes. Loading
//! from files and the environment lives in the infra crate.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use statline_common::cache::CacheConfig;
use statline_common::lifecycle::ComponentDescriptor;
use statline_common::resilience::{CircuitBreakerConfig, RateLimiterConfig, RetryConfig};
use statline_common::utils::serde::duration_secs;

use crate::constants::{
    DEFAULT_TIMEOUT_SECS, DEFAULT_USER_AGENT, ERROR_REPORT_CAPACITY, NEXT_BASE_URL,
    PRODUCTION_BASE_URL,
};
use crate::errors::{ClientError, Result};
use crate::impl_domain_enum_conversions;
use crate::types::Operation;

/// Top-level client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub api: ApiConfig,
    pub rate_limit: RateLimiterConfig,
    pub retry: RetryConfig,
    pub circuit_breaker: CircuitBreakerConfig,
    #[serde(deserialize_with = "deserialize_cache")]
    pub cache: CacheConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            rate_limit: RateLimiterConfig::default(),
            retry: RetryConfig::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            cache: default_cache_config(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Defaults with the given API key
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.api.api_key = Some(ApiKey::new(api_key));
        config
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        self.api.base_url()
    }

    /// Check every section
    ///
    /// # Errors
    /// Returns `ClientError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.retry.validate().map_err(|e| ClientError::Config(format!("retry: {e}")))?;
        self.circuit_breaker
            .validate()
            .map_err(|e| ClientError::Config(format!("circuit_breaker: {e}")))?;
        if self.telemetry.report_capacity == 0 {
            return Err(ClientError::Config(
                "telemetry: report_capacity must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Cache defaults with the built-in TTL of every operation
pub fn default_cache_config() -> CacheConfig {
    Operation::ALL
        .iter()
        .filter_map(|op| op.default_ttl().map(|ttl| (op.name(), ttl)))
        .fold(CacheConfig::builder(), |builder, (label, ttl)| builder.ttl(label, ttl))
        .build()
}

/// Layer a configured cache section over [`default_cache_config`]
///
/// Configured overrides win per label; operations the section does not name
/// keep their built-in TTL. A label listed as no-expiry drops its built-in
/// TTL.
pub fn merge_cache_config(configured: CacheConfig) -> CacheConfig {
    let mut merged = default_cache_config();
    for label in &configured.no_expiry_labels {
        merged.ttl_overrides.remove(label);
    }
    merged.default_ttl = configured.default_ttl;
    merged.ttl_overrides.extend(configured.ttl_overrides);
    merged.no_expiry_labels = configured.no_expiry_labels;
    merged
}

fn deserialize_cache<'de, D>(deserializer: D) -> std::result::Result<CacheConfig, D::Error>
where
    D: Deserializer<'de>,
{
    CacheConfig::deserialize(deserializer).map(merge_cache_config)
}

/// Upstream API selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiHost {
    #[default]
    Production,
    /// Pre-release host with newer endpoints
    Next,
}

impl_domain_enum_conversions!(ApiHost {
    Production => "production",
    Next => "next",
});

impl ApiHost {
    pub fn base_url(&self) -> &'static str {
        match self {
            ApiHost::Production => PRODUCTION_BASE_URL,
            ApiHost::Next => NEXT_BASE_URL,
        }
    }

    /// Lifecycle metadata of the host
    pub fn descriptor(&self) -> ComponentDescriptor {
        match self {
            ApiHost::Production => ComponentDescriptor::stable("api", "v1"),
            ApiHost::Next => ComponentDescriptor::preview("api-next", "v2"),
        }
    }
}

/// Bearer token for the API
///
/// Never printed by `Debug` and never serialized back out.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiKey(String);

impl ApiKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Raw key, for the `Authorization` header only
    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Connection settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: ApiHost,
    #[serde(skip_serializing)]
    pub api_key: Option<ApiKey>,
    /// Per-request timeout
    #[serde(rename = "timeout_secs", with = "duration_secs")]
    pub timeout: Duration,
    pub user_agent: String,
    /// Replaces the host's base URL (local mocks, proxies)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url_override: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: ApiHost::default(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            base_url_override: None,
        }
    }
}

impl ApiConfig {
    pub fn base_url(&self) -> &str {
        self.base_url_override.as_deref().unwrap_or_else(|| self.host.base_url())
    }

    fn validate(&self) -> Result<()> {
        match &self.api_key {
            Some(key) if !key.is_empty() => {}
            _ => return Err(ClientError::Config("api: an API key is required".to_string())),
        }
        if self.timeout.is_zero() {
            return Err(ClientError::Config("api: timeout must be greater than 0".to_string()));
        }
        let base_url = self.base_url();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::Config(format!(
                "api: base URL must be http(s), got {base_url}"
            )));
        }
        Ok(())
    }
}

/// Telemetry settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Append one JSON line per attempt to this file
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_path: Option<PathBuf>,
    /// Number of recent error reports kept in memory
    pub report_capacity: usize,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self { log_path: None, report_capacity: ERROR_REPORT_CAPACITY }
    }
}
