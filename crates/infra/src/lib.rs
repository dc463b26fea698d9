//! # Statline Infrastructure
//!
//! I/O-facing half of the Statline client.
//!
//! This crate contains:
//! - The blocking HTTP transport (reqwest)
//! - The [`ResilientClient`] and its typed fetch operations
//! - Telemetry sinks, the JSON-lines attempt log and tracing setup
//! - Configuration loading from files, `.env` and the environment
//!
//! ## Architecture
//! - Composes the primitives in `statline-common`
//! - Speaks the types defined in `statline-domain`
//! - Contains all "impure" code (network, files, environment)

pub mod api;
pub mod config;
pub mod errors;
pub mod http;
pub mod observability;

// Re-export commonly used items
pub use api::{
    Fallback, FallbackRegistry, FnFallback, Recovery, ResilientClient, ResilientClientBuilder,
    StaticFallback,
};
pub use http::{HttpTransport, HttpTransportBuilder, RawResponse, Transport, TransportError};
pub use observability::{init_tracing, LogFormat, MemorySink, Telemetry, TelemetrySink};
