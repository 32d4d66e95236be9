//! Configuration loader
//!
//! Loads the pipeline configuration from a config file and environment
//! variables.
//!
//! ## Loading Strategy
//! 1. Probes multiple paths for a config file
//! 2. Falls back to defaults when no file is found
//! 3. Applies environment overrides on top
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `RTCSCOPE_SERVICE_NAME`: `service.name` resource attribute
//! - `RTCSCOPE_TRACES_URL`: OTLP/HTTP traces endpoint (empty disables)
//! - `RTCSCOPE_METRICS_URL`: OTLP/HTTP metrics endpoint (empty disables)
//! - `RTCSCOPE_CRASH_REPORT_URL`: Crash-report endpoint (empty disables)
//! - `RTCSCOPE_METRIC_EXPORT_INTERVAL_MS`: Periodic metric export interval
//! - `RTCSCOPE_COLLECTION_INTERVAL`: Collection interval in seconds
//! - `RTCSCOPE_INCLUDE_REMOTE`: Collect remote participants (true/false)
//! - `RTCSCOPE_INCLUDE_AGGREGATE`: Collect the `allTracks` view (true/false)
//! - `RTCSCOPE_LOG`: Log filter directive
//! - `RTCSCOPE_LOG_JSON`: Emit JSON logs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./rtcscope.json` or `./rtcscope.toml` (current working directory)
//! 3. `../config.{json,toml}` and `../../config.{json,toml}`
//! 4. The same names relative to the executable location

use std::path::{Path, PathBuf};

use rtcscope_domain::{Config, Result, RtcScopeError};

use crate::errors::InfraError;

/// Load configuration with automatic fallback strategy
///
/// Reads the first config file found by [`probe_config_paths`], or starts
/// from defaults when there is none, then applies environment overrides.
///
/// # Errors
/// Returns `RtcScopeError::Config` if the file cannot be parsed or an
/// environment variable holds an invalid value.
pub fn load() -> Result<Config> {
    let config = match probe_config_paths() {
        Some(path) => load_from_file(Some(path))?,
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };

    apply_env_overrides(config)
}

/// Load configuration from defaults and environment variables only
///
/// # Errors
/// Returns `RtcScopeError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let config = apply_env_overrides(Config::default())?;
    tracing::info!("Configuration loaded from environment variables");
    Ok(config)
}

/// Apply the `RTCSCOPE_*` environment overrides to `config`
///
/// # Errors
/// Returns `RtcScopeError::Config` if a numeric or boolean variable does not parse.
pub fn apply_env_overrides(mut config: Config) -> Result<Config> {
    if let Some(name) = env_string("RTCSCOPE_SERVICE_NAME") {
        config.telemetry.service_name = name;
    }
    if let Some(url) = env_endpoint("RTCSCOPE_TRACES_URL") {
        config.telemetry.traces_endpoint = url;
    }
    if let Some(url) = env_endpoint("RTCSCOPE_METRICS_URL") {
        config.telemetry.metrics_endpoint = url;
    }
    if let Some(url) = env_endpoint("RTCSCOPE_CRASH_REPORT_URL") {
        config.telemetry.crash_report_endpoint = url;
    }
    if let Some(interval) = env_u64("RTCSCOPE_METRIC_EXPORT_INTERVAL_MS")? {
        config.telemetry.metric_export_interval_ms = interval;
    }
    if let Some(interval) = env_u64("RTCSCOPE_COLLECTION_INTERVAL")? {
        config.collection.interval_seconds = interval;
    }

    config.collection.include_remote_participants =
        env_bool("RTCSCOPE_INCLUDE_REMOTE", config.collection.include_remote_participants)?;
    config.collection.include_aggregate_tracks =
        env_bool("RTCSCOPE_INCLUDE_AGGREGATE", config.collection.include_aggregate_tracks)?;

    if let Some(filter) = env_string("RTCSCOPE_LOG") {
        config.logging.filter = filter;
    }
    config.logging.json = env_bool("RTCSCOPE_LOG_JSON", config.logging.json)?;

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `RtcScopeError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(RtcScopeError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            RtcScopeError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path).map_err(InfraError::from)?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`); files without
/// an extension are read as JSON.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => Ok(toml::from_str(contents).map_err(InfraError::from)?),
        "json" => Ok(serde_json::from_str(contents).map_err(InfraError::from)?),
        _ => Err(RtcScopeError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_names(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_names(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_names(base: &Path) -> Vec<PathBuf> {
    vec![
        base.join("config.json"),
        base.join("config.toml"),
        base.join("rtcscope.json"),
        base.join("rtcscope.toml"),
        base.join("../config.json"),
        base.join("../config.toml"),
        base.join("../../config.json"),
        base.join("../../config.toml"),
    ]
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Endpoint override; a set but empty variable disables the endpoint.
fn env_endpoint(key: &str) -> Option<Option<String>> {
    std::env::var(key).ok().map(|s| {
        let trimmed = s.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

fn env_u64(key: &str) -> Result<Option<u64>> {
    env_string(key)
        .map(|s| {
            s.parse::<u64>()
                .map_err(|e| RtcScopeError::Config(format!("Invalid value for {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive).
/// An unset or empty variable keeps `default`.
fn env_bool(key: &str, default: bool) -> Result<bool> {
    env_string(key).map_or(Ok(default), |s| match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RtcScopeError::Config(format!("Invalid value for {key}: expected a boolean, got '{s}'"))),
    })
}

/// Serialises tests that mutate the process environment.
#[cfg(test)]
pub(crate) static ENV_LOCK: once_cell::sync::Lazy<std::sync::Mutex<()>> =
    once_cell::sync::Lazy::new(|| std::sync::Mutex::new(()));
