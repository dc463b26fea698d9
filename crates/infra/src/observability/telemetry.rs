//! Attempt telemetry and error reporting
//!
//! ## Design
//! - **Lock-free counters** - every field of [`MetricsSnapshot`] is an
//!   independent `AtomicU64`; a snapshot is a best-effort read, never torn
//!   per field
//! - **Injected, not global** - the client receives its sink at
//!   construction, so tests can swap in [`MemorySink`]
//! - **Log failures are not fatal** - a JSON-lines write error is traced
//!   and the attempt is still counted

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use statline_common::error::{ErrorCategory, ErrorSeverity};
use statline_domain::constants::ERROR_REPORT_CAPACITY;
use statline_domain::{
    AttemptEvent, AttemptOutcome, AttemptResult, ErrorReport, ErrorReportBuilder,
    MetricsSnapshot, TelemetryConfig,
};
use tracing::{debug, error, warn};

use super::jsonl::JsonLinesLog;

/// Callback invoked synchronously for every recorded attempt
pub type TelemetryHook = Arc<dyn Fn(&AttemptEvent) + Send + Sync>;

/// Receiver of attempt events and terminal error reports
pub trait TelemetrySink: Send + Sync {
    /// Record one physical send
    fn record_attempt(&self, event: &AttemptEvent);

    /// Current counter values
    fn snapshot(&self) -> MetricsSnapshot;

    /// Accept a report for a failure that reached the caller
    fn report_error(&self, report: &ErrorReport);

    /// Start a report; callers add context and recovery flags
    fn report_builder(&self, category: ErrorCategory, message: &str) -> ErrorReportBuilder {
        ErrorReport::builder(category, message)
    }

    /// Build a report in one call
    fn build_error_report(
        &self,
        category: ErrorCategory,
        severity: Option<ErrorSeverity>,
        message: &str,
        context: BTreeMap<String, String>,
    ) -> ErrorReport {
        self.report_builder(category, message).severity(severity).extend_context(context).build()
    }
}

/// Additive counters behind a [`MetricsSnapshot`]
#[derive(Debug, Default)]
pub struct MetricsCounters {
    total_requests: AtomicU64,
    successful_requests: AtomicU64,
    retries: AtomicU64,
    rate_limit_hits: AtomicU64,
    server_errors: AtomicU64,
    client_errors: AtomicU64,
    auth_errors: AtomicU64,
    network_errors: AtomicU64,
    total_latency_ms: AtomicU64,
}

impl MetricsCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one attempt into the counters
    pub fn record(&self, outcome: &AttemptOutcome) {
        // Relaxed OK: counters are independent and only ever grow
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if outcome.attempt > 1 {
            self.retries.fetch_add(1, Ordering::Relaxed);
        }

        match outcome.result {
            AttemptResult::Success => {
                let latency_ms = u64::try_from(outcome.latency.as_millis()).unwrap_or(u64::MAX);
                // SeqCst for consistency with the average latency derived from both
                self.total_latency_ms.fetch_add(latency_ms, Ordering::SeqCst);
                self.successful_requests.fetch_add(1, Ordering::SeqCst);
            }
            AttemptResult::Failure(category) => {
                let counter = match category {
                    ErrorCategory::RateLimit => &self.rate_limit_hits,
                    ErrorCategory::ServerError => &self.server_errors,
                    ErrorCategory::ClientError => &self.client_errors,
                    ErrorCategory::Auth => &self.auth_errors,
                    ErrorCategory::Network | ErrorCategory::Timeout => &self.network_errors,
                    ErrorCategory::Unknown => return,
                };
                counter.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            successful_requests: self.successful_requests.load(Ordering::SeqCst),
            retries: self.retries.load(Ordering::Relaxed),
            rate_limit_hits: self.rate_limit_hits.load(Ordering::Relaxed),
            server_errors: self.server_errors.load(Ordering::Relaxed),
            client_errors: self.client_errors.load(Ordering::Relaxed),
            auth_errors: self.auth_errors.load(Ordering::Relaxed),
            network_errors: self.network_errors.load(Ordering::Relaxed),
            total_latency_ms: self.total_latency_ms.load(Ordering::SeqCst),
        }
    }
}

/// Production telemetry sink
///
/// Counts every attempt, optionally appends it to a JSON-lines log and
/// forwards it to a hook. Keeps the most recent error reports in a ring
/// buffer.
pub struct Telemetry {
    counters: MetricsCounters,
    log: Option<JsonLinesLog>,
    hook: Option<TelemetryHook>,
    reports: Mutex<VecDeque<ErrorReport>>,
    report_capacity: usize,
}

impl Telemetry {
    /// Counters only, default report capacity
    pub fn new() -> Self {
        Self {
            counters: MetricsCounters::new(),
            log: None,
            hook: None,
            reports: Mutex::new(VecDeque::with_capacity(ERROR_REPORT_CAPACITY)),
            report_capacity: ERROR_REPORT_CAPACITY,
        }
    }

    /// Sink described by `config`, opening the log file if one is set
    ///
    /// # Errors
    /// Returns the I/O error raised while opening the log file.
    pub fn from_config(config: &TelemetryConfig) -> io::Result<Self> {
        let mut telemetry = Self::new().with_report_capacity(config.report_capacity);
        if let Some(path) = &config.log_path {
            telemetry = telemetry.with_log(JsonLinesLog::open(path)?);
        }
        Ok(telemetry)
    }

    pub fn with_log(mut self, log: JsonLinesLog) -> Self {
        self.log = Some(log);
        self
    }

    pub fn with_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&AttemptEvent) + Send + Sync + 'static,
    {
        self.hook = Some(Arc::new(hook));
        self
    }

    pub fn with_report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity.max(1);
        self
    }

    /// Most recent reports, oldest first
    pub fn recent_reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().iter().cloned().collect()
    }

    pub fn log(&self) -> Option<&JsonLinesLog> {
        self.log.as_ref()
    }
}

impl Default for Telemetry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Telemetry")
            .field("snapshot", &self.counters.snapshot())
            .field("log", &self.log)
            .field("hook", &self.hook.is_some())
            .field("report_capacity", &self.report_capacity)
            .finish()
    }
}

impl TelemetrySink for Telemetry {
    fn record_attempt(&self, event: &AttemptEvent) {
        self.counters.record(&event.outcome);
        debug!(
            operation = %event.operation,
            attempt = event.outcome.attempt,
            status = event.outcome.status,
            outcome = event.outcome.result.label(),
            latency_ms = event.outcome.latency.as_millis() as u64,
            "attempt recorded"
        );

        if let Some(log) = &self.log {
            if let Err(err) = log.append(event) {
                warn!(
                    error = %err,
                    path = %log.path().display(),
                    "failed to append telemetry line"
                );
            }
        }

        if let Some(hook) = &self.hook {
            hook(event);
        }
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.counters.snapshot()
    }

    fn report_error(&self, report: &ErrorReport) {
        if report.severity() >= ErrorSeverity::High {
            error!(
                id = %report.id(),
                category = %report.category(),
                severity = %report.severity(),
                "{}",
                report.message()
            );
        } else {
            warn!(
                id = %report.id(),
                category = %report.category(),
                severity = %report.severity(),
                "{}",
                report.message()
            );
        }

        let mut reports = self.reports.lock();
        while reports.len() >= self.report_capacity {
            reports.pop_front();
        }
        reports.push_back(report.clone());
    }
}

/// In-memory sink that keeps every event and report
#[derive(Debug, Default)]
pub struct MemorySink {
    counters: MetricsCounters,
    events: Mutex<Vec<AttemptEvent>>,
    reports: Mutex<Vec<ErrorReport>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AttemptEvent> {
        self.events.lock().clone()
    }

    pub fn reports(&self) -> Vec<ErrorReport> {
        self.reports.lock().clone()
    }

    /// Attempt outcomes in recording order
    pub fn outcomes(&self) -> Vec<AttemptOutcome> {
        self.events.lock().iter().map(|event| event.outcome.clone()).collect()
    }
}

impl TelemetrySink for MemorySink {
    fn record_attempt(&self, event: &AttemptEvent) {
        self.counters.record(&event.outcome);
        self.events.lock().push(event.clone());
    }

    fn snapshot(&self) -> MetricsSnapshot {
        self.counters.snapshot()
    }

    fn report_error(&self, report: &ErrorReport) {
        self.reports.lock().push(report.clone());
    }
}

impl<T: TelemetrySink + ?Sized> TelemetrySink for Arc<T> {
    fn record_attempt(&self, event: &AttemptEvent) {
        (**self).record_attempt(event)
    }

    fn snapshot(&self) -> MetricsSnapshot {
        (**self).snapshot()
    }

    fn report_error(&self, report: &ErrorReport) {
        (**self).report_error(report)
    }

    fn report_builder(&self, category: ErrorCategory, message: &str) -> ErrorReportBuilder {
        (**self).report_builder(category, message)
    }
}
