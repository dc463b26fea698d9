//! HTTP transport
//!
//! [`Transport`] is the single seam between the resilient client and the
//! network. [`HttpTransport`] implements it over a blocking reqwest client;
//! tests substitute scripted transports.

pub mod client;
pub mod transport;

pub use client::{HttpTransport, HttpTransportBuilder};
pub use transport::{parse_retry_after, RawResponse, Transport, TransportError};
