//! Resilient API client
//!
//! Wraps every logical fetch in the same layers, outermost first:
//!
//! 1. **Cache**: a fresh entry for (operation, params) is returned without
//!    touching the network
//! 2. **Circuit breaker**: one breaker per operation name; an open breaker
//!    rejects the fetch before any attempt is made
//! 3. **Retry loop**: up to `max_attempts` attempts, waiting per category
//! 4. **Attempt**: throttle, send, classify, record telemetry
//!
//! A whole retry loop counts as one breaker outcome, and only successful
//! values are cached.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use statline_common::cache::{CacheStats, TtlCache};
use statline_common::error::{ErrorCategory, ErrorClassification, ErrorClassifier};
use statline_common::lifecycle::ComponentDescriptor;
use statline_common::resilience::{
    AttemptFailure, CircuitBreakerRecord, CircuitBreakerRegistry, CircuitState, Clock,
    RateLimiter, ResilienceError, RetryError, RetryPolicy, SystemClock,
};
use statline_domain::{
    ApiHost, AttemptEvent, AttemptOutcome, ClientConfig, ClientError, ErrorReport,
    MetricsSnapshot, Operation, Params, RequestDescriptor, Result,
};
use tracing::{debug, info, instrument, warn};

use super::fallback::{Fallback, FallbackRegistry, Recovery};
use crate::errors::conversions::config_error;
use crate::http::{HttpTransport, RawResponse, Transport};
use crate::observability::{Telemetry, TelemetrySink};

/// Longest response body kept on a rejected-request error
const MAX_ERROR_BODY_CHARS: usize = 1024;

/// Outcome of one attempt as seen by the retry loop
type AttemptReturn = std::result::Result<Value, AttemptFailure<ClientError>>;

/// Shape check applied to a freshly fetched body before it is cached
pub(crate) type BodyCheck<'a> = dyn Fn(&Value) -> std::result::Result<(), String> + 'a;

fn accept_any(_: &Value) -> std::result::Result<(), String> {
    Ok(())
}

/// API client with throttling, retries, circuit breaking and caching
///
/// Safe to share between threads; every fetch blocks only its caller.
pub struct ResilientClient<C: Clock = SystemClock> {
    config: ClientConfig,
    transport: Arc<dyn Transport>,
    telemetry: Arc<dyn TelemetrySink>,
    limiter: RateLimiter<C>,
    retry: RetryPolicy,
    breakers: CircuitBreakerRegistry<C>,
    cache: TtlCache<Value, C>,
    fallbacks: FallbackRegistry,
    clock: Arc<C>,
}

impl ResilientClient<SystemClock> {
    /// Create a builder for fluent configuration
    pub fn builder(config: ClientConfig) -> ResilientClientBuilder<SystemClock> {
        ResilientClientBuilder::new(config)
    }

    /// Client with the HTTP transport and telemetry described by `config`
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration is invalid, the
    /// HTTP client cannot be built or the telemetry log cannot be opened.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }
}

impl<C: Clock> ResilientClient<C> {
    /// Fetch `operation` with `params`
    ///
    /// # Errors
    ///
    /// Returns the terminal [`ClientError`] of the fetch. An
    /// [`ErrorReport`] for it has already been handed to the telemetry
    /// sink.
    pub fn fetch(&self, operation: Operation, params: Params) -> Result<Value> {
        self.fetch_checked(operation, params, &accept_any)
    }

    /// Fetch and deserialize into `T`
    ///
    /// A fresh body that does not match `T` is rejected before it reaches
    /// the cache.
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Decode` when the body does not match `T`, or
    /// any error of [`fetch`](Self::fetch).
    pub fn fetch_as<T: DeserializeOwned>(&self, operation: Operation, params: Params) -> Result<T> {
        let value = self.fetch_checked(operation, params, &|body: &Value| {
            T::deserialize(body).map(drop).map_err(|e| e.to_string())
        })?;
        serde_json::from_value(value).map_err(|e| {
            let err = ClientError::Decode {
                operation,
                endpoint: operation.path().to_string(),
                message: e.to_string(),
            };
            self.report_failure(&err, false, false);
            err
        })
    }

    /// [`fetch`](Self::fetch) with a shape check on fresh bodies
    ///
    /// A body failing `check` becomes `ClientError::Decode`, counts as a
    /// breaker failure and is never cached.
    #[instrument(skip(self, params, check), fields(operation = %operation))]
    pub(crate) fn fetch_checked(
        &self,
        operation: Operation,
        params: Params,
        check: &BodyCheck<'_>,
    ) -> Result<Value> {
        let request = operation.request(params);
        self.fetch_request(operation, &request, check).map_err(|err| {
            self.report_failure(&err, false, false);
            err
        })
    }

    /// Fetch, substituting a registered fallback value on failure
    ///
    /// Strategies registered for `operation` are tried in order. The
    /// returned [`Recovery`] carries the report of the recovered failure.
    ///
    /// # Errors
    ///
    /// Returns the original error when no strategy produced a value.
    #[instrument(skip(self, params), fields(operation = %operation))]
    pub fn fetch_with_fallbacks(&self, operation: Operation, params: Params) -> Result<Recovery> {
        let request = operation.request(params);
        let err = match self.fetch_request(operation, &request, &accept_any) {
            Ok(value) => return Ok(Recovery { value, strategy: None, report: None }),
            Err(err) => err,
        };

        match self.fallbacks.recover(operation, &request, &err) {
            Some((strategy, value)) => {
                info!(%strategy, error = %err, "fetch recovered by fallback");
                let report = self.report_failure(&err, true, true);
                Ok(Recovery { value, strategy: Some(strategy), report: Some(report) })
            }
            None => {
                self.report_failure(&err, self.fallbacks.has_strategies(operation), false);
                Err(err)
            }
        }
    }

    /// Current telemetry counters
    pub fn metrics(&self) -> MetricsSnapshot {
        self.telemetry.snapshot()
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Drop cached responses of `operation`, or of every operation
    pub fn invalidate(&self, operation: Option<Operation>) -> usize {
        self.cache.invalidate(operation.as_ref().map(Operation::name))
    }

    pub fn breaker_state(&self, operation: Operation) -> CircuitState {
        self.breakers.state(operation.name())
    }

    /// Records of every breaker that has seen traffic
    pub fn breaker_records(&self) -> Vec<CircuitBreakerRecord> {
        self.breakers.records()
    }

    /// Force the breaker of `operation` back to closed
    pub fn reset_breaker(&self, operation: Operation) {
        self.breakers.reset(operation.name());
    }

    /// Lifecycle metadata; preview when pointed at the next host
    pub fn descriptor(&self) -> ComponentDescriptor {
        let version = env!("CARGO_PKG_VERSION");
        match self.config.api.host {
            ApiHost::Production => ComponentDescriptor::stable("statline-client", version),
            ApiHost::Next => ComponentDescriptor::preview("statline-client", version),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn telemetry(&self) -> &Arc<dyn TelemetrySink> {
        &self.telemetry
    }

    pub fn fallbacks(&self) -> &FallbackRegistry {
        &self.fallbacks
    }

    /// Cache, then breaker, then retry loop
    fn fetch_request(
        &self,
        operation: Operation,
        request: &RequestDescriptor,
        check: &BodyCheck<'_>,
    ) -> Result<Value> {
        self.cache.get_or_fetch(operation.name(), request.params(), || {
            self.load(operation, request, check)
        })
    }

    fn load(
        &self,
        operation: Operation,
        request: &RequestDescriptor,
        check: &BodyCheck<'_>,
    ) -> Result<Value> {
        let guarded = || {
            let value = self.run_attempts(operation, request)?;
            if let Err(message) = check(&value) {
                warn!(%operation, %message, "response body has the wrong shape");
                return Err(ClientError::Decode {
                    operation,
                    endpoint: request.path().to_string(),
                    message,
                });
            }
            Ok(value)
        };

        self.breakers.call(operation.name(), guarded).map_err(|err| match err {
            ResilienceError::CircuitOpen { retry_in, .. } => {
                warn!(
                    %operation,
                    retry_in_ms = retry_in.as_millis() as u64,
                    "circuit open, fetch rejected"
                );
                ClientError::BreakerOpen { operation, retry_in }
            }
            ResilienceError::OperationFailed { source } => source,
        })
    }

    fn run_attempts(&self, operation: Operation, request: &RequestDescriptor) -> Result<Value> {
        self.retry
            .run(&*self.clock, |attempt| self.attempt(operation, request, attempt))
            .map_err(RetryError::into_inner)
    }

    /// One physical send
    ///
    /// Failures carry the error the caller would see if this attempt were
    /// the last one.
    fn attempt(
        &self,
        operation: Operation,
        request: &RequestDescriptor,
        attempt: u32,
    ) -> AttemptReturn {
        let waited = self.limiter.throttle();
        debug!(
            attempt,
            method = %request.method(),
            endpoint = request.path(),
            waited_ms = waited.as_millis() as u64,
            "sending request"
        );

        let started = self.clock.now();
        let sent = self.transport.send(request);
        let latency = self.clock.now().saturating_duration_since(started);
        let timestamp = self.timestamp();

        let response = match sent {
            Ok(response) => response,
            Err(err) => {
                let category = err.category();
                let outcome = AttemptOutcome::failure(None, category, latency, attempt, timestamp);
                self.record(operation, request, &outcome);

                let error = if category.is_retryable() {
                    self.exhausted(operation, request, attempt, outcome)
                } else {
                    ClientError::UnexpectedResponse {
                        operation,
                        endpoint: request.path().to_string(),
                        status: None,
                        message: err.to_string(),
                    }
                };
                return Err(AttemptFailure::new(category, error));
            }
        };

        let status = response.status;
        let Some(category) = ErrorClassifier::classify_status(status) else {
            return match decode_body(&response) {
                Ok(value) => {
                    let outcome = AttemptOutcome::success(status, latency, attempt, timestamp);
                    self.record(operation, request, &outcome);
                    Ok(value)
                }
                Err(message) => {
                    let outcome = AttemptOutcome::failure(
                        Some(status),
                        ErrorCategory::Unknown,
                        latency,
                        attempt,
                        timestamp,
                    );
                    self.record(operation, request, &outcome);
                    let error = ClientError::Decode {
                        operation,
                        endpoint: request.path().to_string(),
                        message,
                    };
                    Err(AttemptFailure::new(ErrorCategory::Unknown, error))
                }
            };
        };

        let outcome = AttemptOutcome::failure(Some(status), category, latency, attempt, timestamp);
        self.record(operation, request, &outcome);

        let endpoint = request.path().to_string();
        let error = match category {
            ErrorCategory::Auth => ClientError::InvalidCredentials {
                operation,
                endpoint,
                status,
                params: request.params().clone(),
            },
            ErrorCategory::ClientError => ClientError::RequestRejected {
                operation,
                endpoint,
                status,
                params: request.params().clone(),
                body: error_body(&response),
            },
            category if category.is_retryable() => {
                self.exhausted(operation, request, attempt, outcome)
            }
            _ => ClientError::UnexpectedResponse {
                operation,
                endpoint,
                status: Some(status),
                message: format!("unexpected HTTP status {status}"),
            },
        };
        Err(AttemptFailure::new(category, error).with_retry_after(response.retry_after))
    }

    fn exhausted(
        &self,
        operation: Operation,
        request: &RequestDescriptor,
        attempts: u32,
        last: AttemptOutcome,
    ) -> ClientError {
        ClientError::RetriesExhausted {
            operation,
            endpoint: request.path().to_string(),
            attempts,
            last,
        }
    }

    fn record(&self, operation: Operation, request: &RequestDescriptor, outcome: &AttemptOutcome) {
        let event = AttemptEvent::new(operation, request.clone(), outcome.clone());
        self.telemetry.record_attempt(&event);
    }

    /// Build and emit the report of a terminal failure
    pub(crate) fn report_failure(
        &self,
        err: &ClientError,
        recovery_attempted: bool,
        recovery_successful: bool,
    ) -> ErrorReport {
        let report = self
            .telemetry
            .report_builder(err.category(), &err.to_string())
            .severity(Some(err.severity()))
            .extend_context(err.context())
            .recovery(recovery_attempted, recovery_successful)
            .timestamp(self.timestamp())
            .build();
        self.telemetry.report_error(&report);
        report
    }

    fn timestamp(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }
}

impl<C: Clock> fmt::Debug for ResilientClient<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClient")
            .field("base_url", &self.config.base_url())
            .field("limiter", &self.limiter)
            .field("breakers", &self.breakers)
            .field("cache", &self.cache)
            .field("fallbacks", &self.fallbacks)
            .finish_non_exhaustive()
    }
}

/// Parse a 2xx body; an empty body is `null`
fn decode_body(response: &RawResponse) -> std::result::Result<Value, String> {
    if response.body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(&response.body).map_err(|e| format!("invalid JSON body: {e}"))
}

fn error_body(response: &RawResponse) -> Option<String> {
    let text = response.text();
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.chars().take(MAX_ERROR_BODY_CHARS).collect())
    }
}

/// Builder for [`ResilientClient`]
pub struct ResilientClientBuilder<C: Clock = SystemClock> {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    telemetry: Option<Arc<dyn TelemetrySink>>,
    fallbacks: FallbackRegistry,
    clock: Arc<C>,
}

impl ResilientClientBuilder<SystemClock> {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            telemetry: None,
            fallbacks: FallbackRegistry::new(),
            clock: Arc::new(SystemClock),
        }
    }
}

impl<C: Clock> ResilientClientBuilder<C> {
    /// Replace the HTTP transport
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    pub fn shared_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Replace the telemetry sink built from the config
    pub fn telemetry(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.telemetry = Some(sink);
        self
    }

    /// Register a fallback strategy for `operation`
    pub fn fallback(mut self, operation: Operation, fallback: impl Fallback + 'static) -> Self {
        self.fallbacks.register(operation, fallback);
        self
    }

    pub fn fallbacks(mut self, fallbacks: FallbackRegistry) -> Self {
        self.fallbacks = fallbacks;
        self
    }

    /// Use `clock` for throttling, backoff, breaker windows and cache expiry
    pub fn clock<C2: Clock>(self, clock: C2) -> ResilientClientBuilder<C2> {
        self.shared_clock(Arc::new(clock))
    }

    pub fn shared_clock<C2: Clock>(self, clock: Arc<C2>) -> ResilientClientBuilder<C2> {
        ResilientClientBuilder {
            config: self.config,
            transport: self.transport,
            telemetry: self.telemetry,
            fallbacks: self.fallbacks,
            clock,
        }
    }

    /// Build the client
    ///
    /// # Errors
    ///
    /// Returns `ClientError::Config` if the configuration is invalid or a
    /// default transport or telemetry sink cannot be created.
    pub fn build(self) -> Result<ResilientClient<C>> {
        let config = self.config;
        config.validate()?;

        let breakers = CircuitBreakerRegistry::with_shared_clock(
            config.circuit_breaker.clone(),
            Arc::clone(&self.clock),
        )
        .map_err(|e| config_error("circuit_breaker", e))?;
        let limiter =
            RateLimiter::with_shared_clock(config.rate_limit.min_interval, Arc::clone(&self.clock));
        let cache = TtlCache::with_shared_clock(config.cache.clone(), Arc::clone(&self.clock));
        let retry = RetryPolicy::new(config.retry.clone());

        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::from_config(&config.api)?),
        };
        let telemetry = match self.telemetry {
            Some(telemetry) => telemetry,
            None => Arc::new(
                Telemetry::from_config(&config.telemetry)
                    .map_err(|e| config_error("Failed to open telemetry log", e))?,
            ),
        };

        info!(
            host = %config.api.host,
            base_url = config.base_url(),
            max_attempts = config.retry.max_attempts,
            "resilient client ready"
        );

        Ok(ResilientClient {
            config,
            transport,
            telemetry,
            limiter,
            retry,
            breakers,
            cache,
            fallbacks: self.fallbacks,
            clock: self.clock,
        })
    }
}

impl<C: Clock> fmt::Debug for ResilientClientBuilder<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResilientClientBuilder")
            .field("config", &self.config)
            .field("custom_transport", &self.transport.is_some())
            .field("custom_telemetry", &self.telemetry.is_some())
            .field("fallbacks", &self.fallbacks)
            .finish()
    }
}
