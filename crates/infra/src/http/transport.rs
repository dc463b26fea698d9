//! Transport seam between the client and the wire
//!
//! The client only ever sees a [`RawResponse`] or a [`TransportError`].
//! Status interpretation happens above this layer, so a transport never
//! decides whether a response is a failure.

use std::time::Duration;

use chrono::{DateTime, Utc};
use statline_common::error::{ErrorCategory, ErrorClassifier, TransportFailureKind};
use statline_domain::RequestDescriptor;
use thiserror::Error;

/// One physical send
///
/// Implementations must be safe to share between threads; the client calls
/// `send` concurrently from every thread that fetches.
pub trait Transport: Send + Sync {
    /// Send `request` and return whatever the server answered
    ///
    /// # Errors
    /// Returns a [`TransportError`] when no HTTP status was obtained.
    fn send(&self, request: &RequestDescriptor) -> Result<RawResponse, TransportError>;
}

/// Status, retry hint and body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    /// Parsed `Retry-After` header
    pub retry_after: Option<Duration>,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, retry_after: None, body: body.into() }
    }

    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = Some(retry_after);
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body as text, invalid UTF-8 replaced
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Failure before an HTTP status was obtained
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport failure ({kind:?}): {message}")]
pub struct TransportError {
    pub kind: TransportFailureKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportFailureKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(TransportFailureKind::Connect, message)
    }

    /// Category this failure is counted under
    pub fn category(&self) -> ErrorCategory {
        ErrorClassifier::classify_transport(self.kind, &self.message)
    }
}

/// Parse a `Retry-After` header value
///
/// Accepts delta-seconds or an HTTP date. Dates in the past yield zero.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }

    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}
