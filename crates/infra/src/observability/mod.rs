//! Logging initialisation and exporters
//!
//! The engine itself only emits `tracing` events. Hosts either install their
//! own subscriber or call [`init_tracing`] once at startup.

pub mod exporters;

use tracepulse_domain::{LoggingConfig, Result, TracePulseError};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over `config.level` when set.
///
/// # Errors
/// Returns [`TracePulseError::Config`] when the level does not parse or a
/// global subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level).map_err(|err| {
            TracePulseError::Config(format!("invalid log level '{}': {err}", config.level))
        })?,
    };

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json {
        registry.with(fmt::layer().json().with_target(true).with_thread_names(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(true).with_thread_names(true)).try_init()
    };
    installed.map_err(|err| TracePulseError::Config(format!("failed to install logger: {err}")))
}
