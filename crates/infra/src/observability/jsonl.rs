//! Append-only JSON-lines attempt log
//!
//! One object per line:
//! `{timestamp, operation, method, endpoint, params, status, latency_ms,
//! attempt, outcome, category}`. Lines are written whole under a lock, so
//! concurrent attempts never interleave.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use statline_common::error::ErrorCategory;
use statline_domain::{AttemptEvent, HttpMethod, Operation, Params};

#[derive(Serialize)]
struct LogLine<'a> {
    timestamp: &'a DateTime<Utc>,
    operation: Operation,
    method: HttpMethod,
    endpoint: &'a str,
    params: &'a Params,
    status: Option<u16>,
    latency_ms: u64,
    attempt: u32,
    outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    category: Option<ErrorCategory>,
}

impl<'a> From<&'a AttemptEvent> for LogLine<'a> {
    fn from(event: &'a AttemptEvent) -> Self {
        let outcome = &event.outcome;
        Self {
            timestamp: &outcome.timestamp,
            operation: event.operation,
            method: event.request.method(),
            endpoint: event.request.path(),
            params: event.request.params(),
            status: outcome.status,
            latency_ms: u64::try_from(outcome.latency.as_millis()).unwrap_or(u64::MAX),
            attempt: outcome.attempt,
            outcome: outcome.result.label(),
            category: outcome.category(),
        }
    }
}

/// Durable attempt log
#[derive(Debug)]
pub struct JsonLinesLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesLog {
    /// Open `path` for appending, creating it and its parent directories
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self { path, file: Mutex::new(file) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a single line
    pub fn append(&self, event: &AttemptEvent) -> io::Result<()> {
        let mut line = serde_json::to_vec(&LogLine::from(event))?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use statline_domain::AttemptOutcome;
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn appends_one_line_per_event() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/telemetry.jsonl");
        let log = JsonLinesLog::open(&path).unwrap();

        let request = Operation::Games.request(Params::new().with("year", 2025).with("week", 1));
        let failure = AttemptOutcome::failure(
            Some(500),
            ErrorCategory::ServerError,
            Duration::from_millis(12),
            1,
            Utc::now(),
        );
        let success = AttemptOutcome::success(200, Duration::from_millis(30), 2, Utc::now());
        log.append(&AttemptEvent::new(Operation::Games, request.clone(), failure)).unwrap();
        log.append(&AttemptEvent::new(Operation::Games, request, success)).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<serde_json::Value> =
            contents.lines().map(|line| serde_json::from_str(line).unwrap()).collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["endpoint"], "/games");
        assert_eq!(lines[0]["method"], "GET");
        assert_eq!(lines[0]["params"]["week"], "1");
        assert_eq!(lines[0]["outcome"], "failure");
        assert_eq!(lines[0]["category"], "server_error");
        assert_eq!(lines[1]["status"], 200);
        assert_eq!(lines[1]["latency_ms"], 30);
        assert!(lines[1].get("category").is_none());
    }

    #[test]
    fn reopening_appends() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("telemetry.jsonl");
        let request = Operation::Media.request(Params::new());
        let outcome = AttemptOutcome::success(200, Duration::ZERO, 1, Utc::now());

        for _ in 0..2 {
            let log = JsonLinesLog::open(&path).unwrap();
            log.append(&AttemptEvent::new(Operation::Media, request.clone(), outcome.clone()))
                .unwrap();
        }

        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2);
    }
}
