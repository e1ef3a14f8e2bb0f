//! Configuration management

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_FLUSH_PERIOD_MS, DEFAULT_GAUGE_MAX_SIZE, DEFAULT_GAUGE_PERIOD_MS, DEFAULT_LOG_LEVEL,
    DEFAULT_NODE_ID, DEFAULT_PATH_EXECUTORS,
};
use crate::errors::{Result, TracePulseError};

/// Engine configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub agent: AgentConfig,
    pub counter: CounterConfig,
    pub gauge: GaugeConfig,
    pub path_tracking: PathTrackingConfig,
    pub logging: LoggingConfig,
}

impl Config {
    /// Reject values no component can run with.
    pub fn validate(&self) -> Result<()> {
        if self.agent.node_id.trim().is_empty() {
            return Err(TracePulseError::Config("agent.node_id must not be empty".into()));
        }
        if self.counter.period_ms == 0 {
            return Err(TracePulseError::Config("counter.period_ms must be positive".into()));
        }
        if self.counter.gauged && self.counter.gauge_period_ms == 0 {
            return Err(TracePulseError::Config("counter.gauge_period_ms must be positive".into()));
        }
        if self.gauge.max_size == 0 {
            return Err(TracePulseError::Config("gauge.max_size must be positive".into()));
        }
        if self.path_tracking.use_executors && self.path_tracking.executors == 0 {
            return Err(TracePulseError::Config("path_tracking.executors must be positive".into()));
        }
        if self.path_tracking.period_ms == 0 {
            return Err(TracePulseError::Config("path_tracking.period_ms must be positive".into()));
        }
        Ok(())
    }
}

/// Identity of this reporting node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub node_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self { node_id: DEFAULT_NODE_ID.to_string() }
    }
}

/// Counter registry and counter export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Register sum/max/hits gauges for every counter.
    pub gauged: bool,
    pub gauge_period_ms: u64,
    /// Export period for counter snapshots.
    pub period_ms: u64,
    /// Reset counters after each export.
    pub clear_on_collect: bool,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            gauged: false,
            gauge_period_ms: DEFAULT_GAUGE_PERIOD_MS,
            period_ms: DEFAULT_FLUSH_PERIOD_MS,
            clear_on_collect: false,
        }
    }
}

impl CounterConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }

    pub fn gauge_period(&self) -> Duration {
        Duration::from_millis(self.gauge_period_ms)
    }
}

/// In-memory gauge series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GaugeConfig {
    /// Points kept per series before the oldest are evicted.
    pub max_size: usize,
}

impl Default for GaugeConfig {
    fn default() -> Self {
        Self { max_size: DEFAULT_GAUGE_MAX_SIZE }
    }
}

/// Path tracker persistence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathTrackingConfig {
    pub store_enabled: bool,
    /// Write every call to the store as it completes instead of once per path.
    pub single_store: bool,
    /// Flush completed paths on a worker pool rather than the calling thread.
    pub use_executors: bool,
    pub executors: usize,
    pub period_ms: u64,
}

impl Default for PathTrackingConfig {
    fn default() -> Self {
        Self {
            store_enabled: true,
            single_store: false,
            use_executors: false,
            executors: DEFAULT_PATH_EXECUTORS,
            period_ms: DEFAULT_FLUSH_PERIOD_MS,
        }
    }
}

impl PathTrackingConfig {
    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// Log output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.node_id, "node");
        assert_eq!(config.gauge.max_size, 100);
        assert!(config.path_tracking.store_enabled);
        assert!(!config.counter.gauged);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"agent":{"node_id":"edge-1"},"counter":{"gauged":true}}"#)
                .unwrap();
        assert_eq!(config.agent.node_id, "edge-1");
        assert!(config.counter.gauged);
        assert_eq!(config.counter.gauge_period_ms, 4_000);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_validate_rejects_zero_periods() {
        let mut config = Config::default();
        config.counter.period_ms = 0;
        assert!(matches!(config.validate(), Err(TracePulseError::Config(_))));

        let mut config = Config::default();
        config.path_tracking.use_executors = true;
        config.path_tracking.executors = 0;
        assert!(config.validate().is_err());
    }
}
