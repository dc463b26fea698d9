//! Error types returned by the client

use std::collections::BTreeMap;
use std::time::Duration;

use statline_common::cache::CacheKeyError;
use statline_common::error::{ErrorCategory, ErrorClassification};
use thiserror::Error;

use crate::types::{AttemptOutcome, Operation, Params};

/// Terminal failure of a logical fetch
///
/// Every variant carries the operation it belongs to so that a single
/// error value is enough to build a report.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("{operation}: credentials rejected by {endpoint} (HTTP {status})")]
    InvalidCredentials { operation: Operation, endpoint: String, status: u16, params: Params },

    #[error("{operation}: request rejected by {endpoint} (HTTP {status})")]
    RequestRejected {
        operation: Operation,
        endpoint: String,
        status: u16,
        params: Params,
        body: Option<String>,
    },

    #[error("{operation}: unexpected response from {endpoint}: {message}")]
    UnexpectedResponse {
        operation: Operation,
        endpoint: String,
        status: Option<u16>,
        message: String,
    },

    #[error("{operation}: gave up on {endpoint} after {attempts} attempts, last {last}")]
    RetriesExhausted {
        operation: Operation,
        endpoint: String,
        attempts: u32,
        last: AttemptOutcome,
    },

    #[error("{operation}: circuit open, retry in {}ms", retry_in.as_millis())]
    BreakerOpen { operation: Operation, retry_in: Duration },

    #[error("{operation}: could not decode response from {endpoint}: {message}")]
    Decode { operation: Operation, endpoint: String, message: String },

    #[error(transparent)]
    CacheKey(#[from] CacheKeyError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Operation the failure belongs to, if any
    pub fn operation(&self) -> Option<Operation> {
        match self {
            ClientError::InvalidCredentials { operation, .. }
            | ClientError::RequestRejected { operation, .. }
            | ClientError::UnexpectedResponse { operation, .. }
            | ClientError::RetriesExhausted { operation, .. }
            | ClientError::BreakerOpen { operation, .. }
            | ClientError::Decode { operation, .. } => Some(*operation),
            ClientError::CacheKey(_) | ClientError::Config(_) => None,
        }
    }

    /// Physical attempts made before giving up (0 when nothing was sent)
    pub fn attempts(&self) -> u32 {
        match self {
            ClientError::RetriesExhausted { attempts, .. } => *attempts,
            ClientError::InvalidCredentials { .. }
            | ClientError::RequestRejected { .. }
            | ClientError::UnexpectedResponse { .. }
            | ClientError::Decode { .. } => 1,
            ClientError::BreakerOpen { .. }
            | ClientError::CacheKey(_)
            | ClientError::Config(_) => 0,
        }
    }

    /// HTTP status of the final attempt
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::InvalidCredentials { status, .. }
            | ClientError::RequestRejected { status, .. } => Some(*status),
            ClientError::UnexpectedResponse { status, .. } => *status,
            ClientError::RetriesExhausted { last, .. } => last.status,
            _ => None,
        }
    }

    /// Key/value context attached to error reports
    pub fn context(&self) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        if let Some(operation) = self.operation() {
            context.insert("operation".to_string(), operation.to_string());
        }
        if let Some(status) = self.status() {
            context.insert("status".to_string(), status.to_string());
        }

        match self {
            ClientError::InvalidCredentials { endpoint, params, .. } => {
                context.insert("endpoint".to_string(), endpoint.clone());
                context.insert("params".to_string(), params.to_string());
            }
            ClientError::RequestRejected { endpoint, params, body, .. } => {
                context.insert("endpoint".to_string(), endpoint.clone());
                context.insert("params".to_string(), params.to_string());
                if let Some(body) = body {
                    context.insert("body".to_string(), body.clone());
                }
            }
            ClientError::UnexpectedResponse { endpoint, .. }
            | ClientError::Decode { endpoint, .. } => {
                context.insert("endpoint".to_string(), endpoint.clone());
            }
            ClientError::RetriesExhausted { endpoint, attempts, .. } => {
                context.insert("endpoint".to_string(), endpoint.clone());
                context.insert("attempts".to_string(), attempts.to_string());
            }
            ClientError::BreakerOpen { retry_in, .. } => {
                context.insert("retry_in_ms".to_string(), retry_in.as_millis().to_string());
            }
            ClientError::CacheKey(_) | ClientError::Config(_) => {}
        }

        context
    }
}

impl ErrorClassification for ClientError {
    fn category(&self) -> ErrorCategory {
        match self {
            ClientError::InvalidCredentials { .. } => ErrorCategory::Auth,
            ClientError::RequestRejected { .. } => ErrorCategory::ClientError,
            ClientError::RetriesExhausted { last, .. } => {
                last.category().unwrap_or(ErrorCategory::Unknown)
            }
            ClientError::UnexpectedResponse { .. }
            | ClientError::BreakerOpen { .. }
            | ClientError::Decode { .. }
            | ClientError::CacheKey(_)
            | ClientError::Config(_) => ErrorCategory::Unknown,
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            ClientError::BreakerOpen { .. } => true,
            _ => self.category().is_retryable(),
        }
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            ClientError::BreakerOpen { retry_in, .. } => Some(*retry_in),
            _ => None,
        }
    }
}

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, ClientError>;
