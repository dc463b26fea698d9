//! Domain types and models

pub mod operation;
pub mod report;
pub mod request;
pub mod telemetry;

pub use operation::{GamesQuery, Operation, SeasonType};
pub use report::{ErrorReport, ErrorReportBuilder};
pub use request::{HttpMethod, Params, RequestDescriptor};
pub use telemetry::{AttemptEvent, AttemptOutcome, AttemptResult, MetricsSnapshot};
