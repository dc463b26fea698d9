//! Observability infrastructure for telemetry, logging, and tracing
//!
//! This module provides:
//! - [`TelemetrySink`]: per-attempt events, counters and error reports
//! - [`Telemetry`]: production sink (atomic counters, optional JSON-lines
//!   log, optional hook, bounded report history)
//! - [`MemorySink`]: in-memory sink for tests and embedding code
//! - [`init_tracing`]: one-call `tracing-subscriber` setup
//!
//! ## Design Principles
//!
//! 1. **Injection over globals**: the client owns an `Arc<dyn
//!    TelemetrySink>` handed to it at construction.
//!
//! 2. **Additive counters**: snapshots only ever grow; derived values such
//!    as average latency are computed on read.

pub mod jsonl;
pub mod logging;
pub mod telemetry;

pub use jsonl::JsonLinesLog;
pub use logging::{init_tracing, LogFormat};
pub use telemetry::{MemorySink, MetricsCounters, Telemetry, TelemetryHook, TelemetrySink};
