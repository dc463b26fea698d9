//! Client constants
//!
//! Centralized location for hosts, environment variable names and default
//! limits used throughout the client.

// Upstream hosts
pub const PRODUCTION_BASE_URL: &str = "https://api.collegefootballdata.com";
pub const NEXT_BASE_URL: &str = "https://apinext.collegefootballdata.com";

// Transport defaults
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 500;
pub const DEFAULT_USER_AGENT: &str = concat!("statline/", env!("CARGO_PKG_VERSION"));

// Environment variables
pub const ENV_API_KEY: &str = "CFBD_API_KEY";
pub const ENV_API_HOST: &str = "STATLINE_API_HOST";
pub const ENV_TIMEOUT_SECS: &str = "STATLINE_TIMEOUT_SECS";
pub const ENV_MAX_ATTEMPTS: &str = "STATLINE_MAX_ATTEMPTS";
pub const ENV_MIN_INTERVAL_MS: &str = "STATLINE_MIN_INTERVAL_MS";
pub const ENV_TELEMETRY_LOG: &str = "STATLINE_TELEMETRY_LOG";

// Per-operation cache TTLs (seconds)
pub const GAMES_TTL_SECS: u64 = 15 * 60;
pub const RATINGS_TTL_SECS: u64 = 15 * 60;
pub const LINES_TTL_SECS: u64 = 2 * 60;
pub const RECRUITING_TTL_SECS: u64 = 6 * 60 * 60;
pub const TALENT_TTL_SECS: u64 = 12 * 60 * 60;
pub const WEATHER_TTL_SECS: u64 = 10 * 60;
pub const MEDIA_TTL_SECS: u64 = 60 * 60;

// Telemetry
pub const ERROR_REPORT_CAPACITY: usize = 100;
