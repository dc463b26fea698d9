//! Attempt records and aggregated metrics
//!
//! One [`AttemptOutcome`] is produced per physical send and never changes
//! afterwards. Sinks fold outcomes into a [`MetricsSnapshot`], whose
//! counters only ever grow.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statline_common::error::ErrorCategory;
use statline_common::utils::serde::duration_millis;

use super::operation::Operation;
use super::request::RequestDescriptor;

/// Result of a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", content = "category", rename_all = "snake_case")]
pub enum AttemptResult {
    Success,
    Failure(ErrorCategory),
}

impl AttemptResult {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptResult::Success)
    }

    /// Failure category; `None` for a success
    pub fn category(&self) -> Option<ErrorCategory> {
        match self {
            AttemptResult::Success => None,
            AttemptResult::Failure(category) => Some(*category),
        }
    }

    /// `"success"` or `"failure"`
    pub fn label(&self) -> &'static str {
        match self {
            AttemptResult::Success => "success",
            AttemptResult::Failure(_) => "failure",
        }
    }
}

/// Record of one physical send
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptOutcome {
    /// HTTP status; `None` when the transport failed before a response
    pub status: Option<u16>,
    #[serde(rename = "latency_ms", with = "duration_millis")]
    pub latency: Duration,
    /// 1-based attempt index within the logical fetch
    pub attempt: u32,
    #[serde(flatten)]
    pub result: AttemptResult,
    pub timestamp: DateTime<Utc>,
}

impl AttemptOutcome {
    pub fn success(status: u16, latency: Duration, attempt: u32, timestamp: DateTime<Utc>) -> Self {
        Self { status: Some(status), latency, attempt, result: AttemptResult::Success, timestamp }
    }

    pub fn failure(
        status: Option<u16>,
        category: ErrorCategory,
        latency: Duration,
        attempt: u32,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self { status, latency, attempt, result: AttemptResult::Failure(category), timestamp }
    }

    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn category(&self) -> Option<ErrorCategory> {
        self.result.category()
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.result) {
            (Some(status), AttemptResult::Success) => {
                write!(f, "attempt {} succeeded with HTTP {status}", self.attempt)
            }
            (Some(status), AttemptResult::Failure(category)) => {
                write!(f, "attempt {} failed with HTTP {status} ({category})", self.attempt)
            }
            (None, result) => match result.category() {
                Some(category) => write!(f, "attempt {} failed ({category})", self.attempt),
                None => write!(f, "attempt {} succeeded", self.attempt),
            },
        }
    }
}

/// Everything a telemetry sink learns about one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptEvent {
    pub operation: Operation,
    pub request: RequestDescriptor,
    pub outcome: AttemptOutcome,
}

impl AttemptEvent {
    pub fn new(operation: Operation, request: RequestDescriptor, outcome: AttemptOutcome) -> Self {
        Self { operation, request, outcome }
    }
}

/// Additive request counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub retries: u64,
    pub rate_limit_hits: u64,
    pub server_errors: u64,
    pub client_errors: u64,
    pub auth_errors: u64,
    /// Network failures and timeouts
    pub network_errors: u64,
    /// Summed latency of successful attempts
    pub total_latency_ms: u64,
}

impl MetricsSnapshot {
    /// Mean latency of successful attempts, 0 when there were none
    pub fn average_latency_ms(&self) -> f64 {
        if self.successful_requests == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.successful_requests as f64
        }
    }

    /// Attempts that did not succeed
    pub fn failed_requests(&self) -> u64 {
        self.total_requests.saturating_sub(self.successful_requests)
    }
}
