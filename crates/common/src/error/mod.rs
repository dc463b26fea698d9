//! Error taxonomy shared by every layer of the client
//!
//! Every failed attempt against the upstream API is reduced to exactly one
//! [`ErrorCategory`]. The category drives retry decisions, metrics counters
//! and the default [`ErrorSeverity`] of the error report that reaches the
//! caller.
//!
//! # Error Handling Architecture
//!
//! 1. **`ErrorCategory`**: closed set of failure kinds (`network`,
//!    `timeout`, `auth`, `rate_limit`, `server_error`, `client_error`,
//!    `unknown`)
//!
//! 2. **`ErrorClassifier`**: maps an HTTP status or a transport failure to a
//!    category (see [`classifier`])
//!
//! 3. **`ErrorClassification` trait**: a standard interface that terminal
//!    error types implement so callers can treat them uniformly
//!
//! ## Categories
//!
//! | Category | Retried | Default severity |
//! |----------|---------|------------------|
//! | `network` | exponential backoff | medium |
//! | `timeout` | exponential backoff | medium |
//! | `server_error` | exponential backoff | medium |
//! | `rate_limit` | fixed delay | medium |
//! | `auth` | never | high |
//! | `client_error` | never | high |
//! | `unknown` | never | medium |

pub mod classifier;

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use classifier::{ErrorClassifier, TransportFailureKind};

/// Closed set of failure categories for a single attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Connection-level failure (DNS, refused, reset, broken body)
    Network,
    /// The request did not complete within its deadline
    Timeout,
    /// Credentials rejected (401 / 403)
    Auth,
    /// Provider-side throttling (429)
    RateLimit,
    /// 5xx responses
    ServerError,
    /// Other 4xx responses
    ClientError,
    /// Anything the classification table does not cover
    Unknown,
}

impl ErrorCategory {
    /// All categories, in declaration order
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::Network,
        ErrorCategory::Timeout,
        ErrorCategory::Auth,
        ErrorCategory::RateLimit,
        ErrorCategory::ServerError,
        ErrorCategory::ClientError,
        ErrorCategory::Unknown,
    ];

    /// Stable snake_case label used in logs and reports
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Auth => "auth",
            ErrorCategory::RateLimit => "rate_limit",
            ErrorCategory::ServerError => "server_error",
            ErrorCategory::ClientError => "client_error",
            ErrorCategory::Unknown => "unknown",
        }
    }

    /// Whether failures of this category are transient and may be retried
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::RateLimit
                | ErrorCategory::ServerError
        )
    }

    /// Severity assigned to a terminal failure of this category when the
    /// caller does not override it
    pub fn default_severity(&self) -> ErrorSeverity {
        match self {
            ErrorCategory::Auth | ErrorCategory::ClientError => ErrorSeverity::High,
            ErrorCategory::RateLimit
            | ErrorCategory::ServerError
            | ErrorCategory::Network
            | ErrorCategory::Timeout
            | ErrorCategory::Unknown => ErrorSeverity::Medium,
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified severity levels for error reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorSeverity {
    /// Informational, expected conditions
    Low,
    /// Degraded but recoverable
    Medium,
    /// Requires attention (bad credentials, malformed requests)
    High,
    /// Integrity at risk
    Critical,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Low => write!(f, "low"),
            ErrorSeverity::Medium => write!(f, "medium"),
            ErrorSeverity::High => write!(f, "high"),
            ErrorSeverity::Critical => write!(f, "critical"),
        }
    }
}

/// Standard interface for classifying terminal errors
///
/// Implemented by the client-facing error type so that logging, reporting
/// and caller-side fallback logic never need to match on concrete variants.
pub trait ErrorClassification {
    /// Category of the failure that produced this error
    fn category(&self) -> ErrorCategory;

    /// Whether retrying the whole logical operation later could succeed
    fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    /// Severity used for reporting
    fn severity(&self) -> ErrorSeverity {
        self.category().default_severity()
    }

    /// Whether the error requires immediate attention
    fn is_critical(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    /// Suggested delay before the operation is attempted again
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}
