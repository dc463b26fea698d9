//! Attempt classification
//!
//! Status codes are matched first-match-wins:
//!
//! | Condition | Category |
//! |---|---|
//! | 200–299 | success (no category) |
//! | 401, 403 | `auth` |
//! | 429 | `rate_limit` |
//! | 500–599 | `server_error` |
//! | other 4xx | `client_error` |
//! | anything else | `unknown` |
//!
//! Transport failures go through a typed lookup on
//! [`TransportFailureKind`]. Only failures the transport could not type
//! ([`TransportFailureKind::Other`]) fall back to inspecting the message.

use serde::{Deserialize, Serialize};

use super::ErrorCategory;

/// Typed reason a request never produced an HTTP status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportFailureKind {
    /// Per-call deadline elapsed
    Timeout,
    /// Could not establish a connection
    Connect,
    /// The request could not be sent
    Request,
    /// Reading the response body failed
    Body,
    /// The response could not be decoded
    Decode,
    /// Untyped failure; classified from its message
    Other,
}

/// Maps raw failures to an [`ErrorCategory`]
///
/// Pure and stateless.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorClassifier;

impl ErrorClassifier {
    /// Classify an HTTP status code
    ///
    /// Returns `None` for 2xx responses, which are not errors.
    pub fn classify_status(status: u16) -> Option<ErrorCategory> {
        match status {
            200..=299 => None,
            401 | 403 => Some(ErrorCategory::Auth),
            429 => Some(ErrorCategory::RateLimit),
            500..=599 => Some(ErrorCategory::ServerError),
            400..=499 => Some(ErrorCategory::ClientError),
            _ => Some(ErrorCategory::Unknown),
        }
    }

    /// Classify a transport-level failure
    pub fn classify_transport(kind: TransportFailureKind, message: &str) -> ErrorCategory {
        match kind {
            TransportFailureKind::Timeout => ErrorCategory::Timeout,
            TransportFailureKind::Connect
            | TransportFailureKind::Request
            | TransportFailureKind::Body => ErrorCategory::Network,
            TransportFailureKind::Decode => ErrorCategory::Unknown,
            TransportFailureKind::Other => Self::classify_message(message),
        }
    }

    /// Last-resort classification by message content
    pub fn classify_message(message: &str) -> ErrorCategory {
        let lower = message.to_ascii_lowercase();
        if lower.contains("timeout") || lower.contains("timed out") {
            ErrorCategory::Timeout
        } else {
            ErrorCategory::Network
        }
    }
}
