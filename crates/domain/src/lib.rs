//! # Statline Domain
//!
//! Domain types shared by the Statline client.
//!
//! This crate contains:
//! - Operations and request descriptors (`Operation`, `RequestDescriptor`)
//! - Telemetry records (`AttemptOutcome`, `MetricsSnapshot`, `ErrorReport`)
//! - The client error type and its classification
//! - Configuration structures and constants
//!
//! ## Architecture
//! - Depends only on `statline-common` and external crates
//! - No network or file I/O

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

// Re-export commonly used items
pub use config::*;
pub use errors::*;
pub use types::*;
