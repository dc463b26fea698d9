//! Tracing subscriber initialisation
//!
//! The filter comes from `RUST_LOG` when set, otherwise from the level
//! passed in. Initialisation is idempotent: a second call (another test, an
//! embedding application) leaves the existing subscriber in place.

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Output format of the console subscriber
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("Invalid LogFormat: {other}")),
        }
    }
}

/// Install the global subscriber
///
/// Returns `false` when a subscriber was already installed.
pub fn init_tracing(format: LogFormat, default_level: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let registry = tracing_subscriber::registry().with(filter);

    // Use try_init to avoid panic if global subscriber already set
    let installed = match format {
        LogFormat::Pretty => registry.with(fmt::layer().with_target(true)).try_init(),
        LogFormat::Json => {
            registry.with(fmt::layer().json().with_target(true).with_current_span(true)).try_init()
        }
    };

    match installed {
        Ok(()) => {
            tracing::debug!(?format, "tracing initialised");
            true
        }
        Err(_) => {
            tracing::debug!("Global tracing subscriber already initialized - continuing");
            false
        }
    }
}
