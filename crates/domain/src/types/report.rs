//! Error reports
//!
//! An [`ErrorReport`] is the structured record of one terminal failure
//! that reached a caller. Reports are immutable once built.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statline_common::error::{ErrorCategory, ErrorSeverity};
use uuid::Uuid;

/// Structured record of a terminal failure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    id: Uuid,
    timestamp: DateTime<Utc>,
    category: ErrorCategory,
    severity: ErrorSeverity,
    message: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    context: BTreeMap<String, String>,
    recovery_attempted: bool,
    recovery_successful: bool,
}

impl ErrorReport {
    /// Start a report; severity defaults to the category's severity
    pub fn builder(category: ErrorCategory, message: impl Into<String>) -> ErrorReportBuilder {
        ErrorReportBuilder {
            category,
            message: message.into(),
            severity: None,
            context: BTreeMap::new(),
            recovery_attempted: false,
            recovery_successful: false,
            timestamp: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn category(&self) -> ErrorCategory {
        self.category
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }

    pub fn recovery_attempted(&self) -> bool {
        self.recovery_attempted
    }

    pub fn recovery_successful(&self) -> bool {
        self.recovery_successful
    }
}

/// Builder for [`ErrorReport`]
#[derive(Debug, Clone)]
pub struct ErrorReportBuilder {
    category: ErrorCategory,
    message: String,
    severity: Option<ErrorSeverity>,
    context: BTreeMap<String, String>,
    recovery_attempted: bool,
    recovery_successful: bool,
    timestamp: Option<DateTime<Utc>>,
}

impl ErrorReportBuilder {
    /// Override the severity; `None` keeps the category default
    pub fn severity(mut self, severity: Option<ErrorSeverity>) -> Self {
        self.severity = severity;
        self
    }

    pub fn context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Merge several context entries
    pub fn extend_context<I, K, V>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: ToString,
    {
        self.context.extend(entries.into_iter().map(|(k, v)| (k.into(), v.to_string())));
        self
    }

    /// Record a recovery attempt and whether it succeeded
    ///
    /// A recovery cannot succeed without being attempted, so `successful`
    /// is ignored when `attempted` is false.
    pub fn recovery(mut self, attempted: bool, successful: bool) -> Self {
        self.recovery_attempted = attempted;
        self.recovery_successful = attempted && successful;
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn build(self) -> ErrorReport {
        ErrorReport {
            id: Uuid::new_v4(),
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            severity: self.severity.unwrap_or_else(|| self.category.default_severity()),
            category: self.category,
            message: self.message,
            context: self.context,
            recovery_attempted: self.recovery_attempted,
            recovery_successful: self.recovery_successful,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_defaults_to_category() {
        let report = ErrorReport::builder(ErrorCategory::Auth, "bad key").build();
        assert_eq!(report.severity(), ErrorSeverity::High);

        let report = ErrorReport::builder(ErrorCategory::Auth, "bad key")
            .severity(Some(ErrorSeverity::Critical))
            .build();
        assert_eq!(report.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_recovery_requires_attempt() {
        let report =
            ErrorReport::builder(ErrorCategory::Network, "reset").recovery(false, true).build();
        assert!(!report.recovery_attempted());
        assert!(!report.recovery_successful());

        let report =
            ErrorReport::builder(ErrorCategory::Network, "reset").recovery(true, true).build();
        assert!(report.recovery_successful());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ErrorReport::builder(ErrorCategory::Unknown, "x").build();
        let b = ErrorReport::builder(ErrorCategory::Unknown, "x").build();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_report_serializes_context() {
        let report = ErrorReport::builder(ErrorCategory::ServerError, "upstream failed")
            .context("operation", "games")
            .context("attempts", 3)
            .build();
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["category"], "server_error");
        assert_eq!(json["severity"], "medium");
        assert_eq!(json["context"]["attempts"], "3");
    }
}
