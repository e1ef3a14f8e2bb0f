//! Configuration loader
//!
//! Loads engine configuration from files and environment variables.
//!
//! ## Loading Strategy
//! 1. Probe the standard locations for a config file (JSON or TOML)
//! 2. Fall back to built-in defaults when none exists
//! 3. Apply `TRACEPULSE_*` environment overrides on top
//! 4. Validate the result
//!
//! ## Environment Variables
//! - `TRACEPULSE_NODE_ID`: Marker stamped on exported data
//! - `TRACEPULSE_COUNTER_GAUGED`: Register derived gauges per counter (true/false)
//! - `TRACEPULSE_COUNTER_GAUGE_PERIOD_MS`: Derived gauge sampling period
//! - `TRACEPULSE_COUNTER_PERIOD_MS`: Counter export period
//! - `TRACEPULSE_COUNTER_CLEAR_ON_COLLECT`: Reset counters after export (true/false)
//! - `TRACEPULSE_GAUGE_MAX_SIZE`: Points kept per gauge series
//! - `TRACEPULSE_PATH_STORE_ENABLED`: Persist tracked paths (true/false)
//! - `TRACEPULSE_PATH_SINGLE_STORE`: Store every call as it completes (true/false)
//! - `TRACEPULSE_PATH_USE_EXECUTORS`: Flush paths on a worker pool (true/false)
//! - `TRACEPULSE_PATH_EXECUTORS`: Worker pool size
//! - `TRACEPULSE_PATH_PERIOD_MS`: Path export period
//! - `TRACEPULSE_LOG_LEVEL`: Default log filter
//! - `TRACEPULSE_LOG_JSON`: Emit JSON log lines (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./tracepulse.{json,toml}` then `./config.{json,toml}` (current working directory)
//! 2. The same names in `../` and `../../`
//! 3. The same names relative to the executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracepulse_domain::{Config, Result, TracePulseError};

const FILE_NAMES: [&str; 4] = ["tracepulse.json", "tracepulse.toml", "config.json", "config.toml"];
const SEARCH_DIRS: [&str; 3] = [".", "..", "../.."];

/// Load configuration with automatic fallback strategy
///
/// Uses the first config file found by [`probe_config_paths`], or defaults
/// when there is none, then applies environment overrides.
///
/// # Errors
/// Returns `TracePulseError::Config` if:
/// - A config file exists but cannot be read or parsed
/// - An override variable holds an invalid value
/// - The resulting configuration fails validation
pub fn load() -> Result<Config> {
    let mut config = match probe_config_paths() {
        Some(path) => read_file(&path)?,
        None => {
            tracing::debug!("No config file found, using defaults");
            Config::default()
        }
    };
    apply_env_overrides(&mut config)?;
    config.validate()?;
    tracing::info!(node_id = %config.agent.node_id, "Configuration loaded");
    Ok(config)
}

/// Load configuration from defaults and environment variables only
///
/// # Environment Variables
/// See module documentation for the complete list.
///
/// # Errors
/// Returns `TracePulseError::Config` if a variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();
    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
/// Missing fields take their defaults. Environment overrides are not applied.
///
/// # Errors
/// Returns `TracePulseError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TracePulseError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TracePulseError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    let config = read_file(&config_path)?;
    config.validate()?;
    Ok(config)
}

/// Apply every `TRACEPULSE_*` variable that is set to `config`.
///
/// # Errors
/// Returns `TracePulseError::Config` naming the variable whose value does
/// not parse.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(node_id) = env_string("TRACEPULSE_NODE_ID") {
        config.agent.node_id = node_id;
    }

    let counter = &mut config.counter;
    counter.gauged = env_bool("TRACEPULSE_COUNTER_GAUGED", counter.gauged);
    counter.gauge_period_ms =
        env_parse("TRACEPULSE_COUNTER_GAUGE_PERIOD_MS")?.unwrap_or(counter.gauge_period_ms);
    counter.period_ms = env_parse("TRACEPULSE_COUNTER_PERIOD_MS")?.unwrap_or(counter.period_ms);
    counter.clear_on_collect =
        env_bool("TRACEPULSE_COUNTER_CLEAR_ON_COLLECT", counter.clear_on_collect);

    config.gauge.max_size =
        env_parse("TRACEPULSE_GAUGE_MAX_SIZE")?.unwrap_or(config.gauge.max_size);

    let paths = &mut config.path_tracking;
    paths.store_enabled = env_bool("TRACEPULSE_PATH_STORE_ENABLED", paths.store_enabled);
    paths.single_store = env_bool("TRACEPULSE_PATH_SINGLE_STORE", paths.single_store);
    paths.use_executors = env_bool("TRACEPULSE_PATH_USE_EXECUTORS", paths.use_executors);
    paths.executors = env_parse("TRACEPULSE_PATH_EXECUTORS")?.unwrap_or(paths.executors);
    paths.period_ms = env_parse("TRACEPULSE_PATH_PERIOD_MS")?.unwrap_or(paths.period_ms);

    if let Some(level) = env_string("TRACEPULSE_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("TRACEPULSE_LOG_JSON", config.logging.json);
    Ok(())
}

fn read_file(path: &Path) -> Result<Config> {
    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| TracePulseError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
///
/// # Errors
/// Returns `TracePulseError::Config` if format is invalid or parsing fails.
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TracePulseError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TracePulseError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TracePulseError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// Searches the current working directory and up to two parents, then the
/// same locations relative to the executable.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd);
    }
    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| {
            SEARCH_DIRS
                .iter()
                .flat_map(move |dir| FILE_NAMES.iter().map(move |name| root.join(dir).join(name)))
        })
        .find(|path| path.exists())
}

/// Non-empty environment variable
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Parse a numeric environment variable
///
/// # Errors
/// Returns `TracePulseError::Config` if the variable is set but invalid.
fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_string(key)
        .map(|s| {
            s.parse::<T>()
                .map_err(|e| TracePulseError::Config(format!("Invalid value for {}: {}", key, e)))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
///
/// # Returns
/// The parsed boolean value, or `default` if not set.
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
