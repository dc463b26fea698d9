//! Lifecycle metadata for client components
//!
//! Components (operations, hosts, the client itself) expose a
//! [`ComponentDescriptor`] that calling code can inspect to learn whether
//! something is stable, still in preview, or scheduled for removal.
//! Nothing here logs or warns; the descriptor is the signal.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Lifecycle stage of a component
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LifecycleStatus {
    /// Supported with no planned changes
    Stable,
    /// Available but may change without notice
    Preview,
    /// Scheduled for removal
    Deprecated {
        /// Version the deprecation was announced in
        since: String,
        /// Date after which the component may disappear
        removal_date: Option<NaiveDate>,
        /// Name of the component to migrate to
        replacement: Option<String>,
    },
}

impl fmt::Display for LifecycleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStatus::Stable => write!(f, "stable"),
            LifecycleStatus::Preview => write!(f, "preview"),
            LifecycleStatus::Deprecated { since, removal_date, .. } => match removal_date {
                Some(date) => write!(f, "deprecated since {since}, removal on {date}"),
                None => write!(f, "deprecated since {since}"),
            },
        }
    }
}

/// Machine-readable description of a component and its lifecycle stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentDescriptor {
    /// Stable component name
    pub name: String,
    /// Component version
    pub version: String,
    /// Lifecycle stage
    #[serde(flatten)]
    pub status: LifecycleStatus,
}

impl ComponentDescriptor {
    /// Describe a stable component
    pub fn stable(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), status: LifecycleStatus::Stable }
    }

    /// Describe a preview component
    pub fn preview(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self { name: name.into(), version: version.into(), status: LifecycleStatus::Preview }
    }

    /// Mark this component as deprecated
    pub fn deprecated(
        mut self,
        since: impl Into<String>,
        removal_date: Option<NaiveDate>,
        replacement: Option<String>,
    ) -> Self {
        self.status =
            LifecycleStatus::Deprecated { since: since.into(), removal_date, replacement };
        self
    }

    /// Whether the component is scheduled for removal
    pub fn is_deprecated(&self) -> bool {
        matches!(self.status, LifecycleStatus::Deprecated { .. })
    }

    /// Whether the component has passed its removal date on `today`
    pub fn is_past_removal(&self, today: NaiveDate) -> bool {
        match &self.status {
            LifecycleStatus::Deprecated { removal_date: Some(date), .. } => today >= *date,
            _ => false,
        }
    }
}
