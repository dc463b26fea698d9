//! Configuration loader
//!
//! Loads client configuration from files and environment variables.
//!
//! ## Loading Strategy
//! 1. Reads a `.env` file into the process environment, if one exists
//! 2. Probes multiple paths for a config file (JSON or TOML)
//! 3. Falls back to defaults when no file is found
//! 4. Applies environment overrides on top
//!
//! ## Environment Variables
//! - `CFBD_API_KEY`: Bearer token (required unless the file sets one)
//! - `STATLINE_API_HOST`: `production` or `next`
//! - `STATLINE_TIMEOUT_SECS`: Per-request timeout in seconds
//! - `STATLINE_MAX_ATTEMPTS`: Attempts per logical fetch
//! - `STATLINE_MIN_INTERVAL_MS`: Minimum spacing between request starts
//! - `STATLINE_TELEMETRY_LOG`: Path of the JSON-lines attempt log
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./statline.toml` or `./statline.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. The same names in the parent and grandparent directories
//! 4. Relative to executable location

use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use statline_domain::constants::{
    ENV_API_HOST, ENV_API_KEY, ENV_MAX_ATTEMPTS, ENV_MIN_INTERVAL_MS, ENV_TELEMETRY_LOG,
    ENV_TIMEOUT_SECS,
};
use statline_domain::{ApiHost, ApiKey, ClientConfig, ClientError, Result};

use crate::errors::conversions::config_error;

const CONFIG_FILE_NAMES: [&str; 4] =
    ["statline.toml", "statline.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// Reads `.env`, then the first config file found by
/// [`probe_config_paths`] (or defaults), then applies environment
/// overrides.
///
/// # Errors
/// Returns `ClientError::Config` if:
/// - A config file exists but cannot be read or parsed
/// - An environment variable has an invalid value
/// - No API key is available from either source
pub fn load() -> Result<ClientConfig> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let mut config = match probe_config_paths() {
        Some(path) => read_config_file(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            ClientConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    require_api_key(&config)?;
    tracing::info!(host = %config.api.host, "Configuration loaded");
    Ok(config)
}

/// Load configuration from environment variables alone
///
/// Every section starts from its defaults.
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `ClientError::Config` if `CFBD_API_KEY` is missing or a
/// variable has an invalid value.
pub fn load_from_env() -> Result<ClientConfig> {
    let mut config = ClientConfig::default();
    apply_env_overrides(&mut config)?;
    require_api_key(&config)?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension). A file
/// without an API key picks it up from `CFBD_API_KEY`.
///
/// # Arguments
/// * `path` - Optional path to config file. If `None`, uses
///   [`probe_config_paths`].
///
/// # Errors
/// Returns `ClientError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<ClientConfig> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ClientError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ClientError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    let mut config = read_config_file(&config_path)?;
    if config.api.api_key.is_none() {
        config.api.api_key = std::env::var(ENV_API_KEY).ok().map(ApiKey::new);
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<ClientConfig> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| config_error("Failed to read config file", e))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `ClientError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<ClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents).map_err(|e| config_error("Invalid TOML format", e)),
        "json" => {
            serde_json::from_str(contents).map_err(|e| config_error("Invalid JSON format", e))
        }
        _ => Err(ClientError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory, its two parents and the
/// executable's directory for `statline.{toml,json}` then
/// `config.{toml,json}`.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    // Try current working directory
    if let Ok(cwd) = std::env::current_dir() {
        roots.extend([cwd.clone(), cwd.join(".."), cwd.join("../..")]);
    }

    // Try relative to executable
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.extend([exe_dir.to_path_buf(), exe_dir.join("..")]);
        }
    }

    // Return first existing candidate
    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.is_file())
}

/// Apply `STATLINE_*` and `CFBD_API_KEY` variables to `config`
///
/// # Errors
/// Returns `ClientError::Config` naming the variable with an invalid value.
pub fn apply_env_overrides(config: &mut ClientConfig) -> Result<()> {
    if let Some(key) = env_var(ENV_API_KEY) {
        config.api.api_key = Some(ApiKey::new(key));
    }
    if let Some(host) = env_parse::<ApiHost>(ENV_API_HOST)? {
        config.api.host = host;
    }
    if let Some(secs) = env_parse::<u64>(ENV_TIMEOUT_SECS)? {
        config.api.timeout = Duration::from_secs(secs);
    }
    if let Some(attempts) = env_parse::<u32>(ENV_MAX_ATTEMPTS)? {
        config.retry.max_attempts = attempts;
    }
    if let Some(millis) = env_parse::<u64>(ENV_MIN_INTERVAL_MS)? {
        config.rate_limit.min_interval = Duration::from_millis(millis);
    }
    if let Some(path) = env_var(ENV_TELEMETRY_LOG) {
        config.telemetry.log_path = Some(PathBuf::from(path));
    }
    Ok(())
}

fn require_api_key(config: &ClientConfig) -> Result<()> {
    match &config.api.api_key {
        Some(key) if !key.is_empty() => Ok(()),
        _ => Err(ClientError::Config(format!(
            "Missing required environment variable: {}",
            ENV_API_KEY
        ))),
    }
}

/// Non-empty environment variable
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable
///
/// # Returns
/// `Ok(None)` when the variable is not set.
///
/// # Errors
/// Returns `ClientError::Config` if the value does not parse.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    env_var(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ClientError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}
