//! Engine constants
//!
//! Centralized defaults shared by the configuration structs and the
//! runtime components.

// Node identity
pub const DEFAULT_NODE_ID: &str = "node";

// Flush cadence
pub const DEFAULT_FLUSH_PERIOD_MS: u64 = 60_000;
pub const DEFAULT_GAUGE_PERIOD_MS: u64 = 4_000;
pub const DEFAULT_FLUSH_JOIN_TIMEOUT_MS: u64 = 60_000;

// Gauge series
pub const DEFAULT_GAUGE_MAX_SIZE: usize = 100;

// Path tracking
pub const DEFAULT_PATH_EXECUTORS: usize = 5;
pub const DEFAULT_EXECUTOR_SHUTDOWN_TIMEOUT_MS: u64 = 5_000;

// Logging
pub const DEFAULT_LOG_LEVEL: &str = "info";

// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "TRACEPULSE_";
