//! Flusher error types

use std::time::Duration;

use thiserror::Error;
use tracepulse_domain::TracePulseError;

/// Flusher and executor lifecycle errors
#[derive(Debug, Error)]
pub enum FlusherError {
    /// Flusher is already running
    #[error("Flusher {name} already running")]
    AlreadyRunning { name: String },

    /// Flusher was stopped and cannot be restarted
    #[error("Flusher {name} has been stopped")]
    Stopped { name: String },

    /// Failed to spawn the timer thread or its runtime
    #[error("Failed to spawn {name}: {reason}")]
    SpawnFailed { name: String, reason: String },

    /// Shutdown did not finish in time
    #[error("{name} did not stop within {timeout:?}")]
    Timeout { name: String, timeout: Duration },
}

impl From<FlusherError> for TracePulseError {
    fn from(err: FlusherError) -> Self {
        match err {
            FlusherError::AlreadyRunning { .. } | FlusherError::Stopped { .. } => {
                TracePulseError::Config(err.to_string())
            }
            FlusherError::SpawnFailed { .. } | FlusherError::Timeout { .. } => {
                TracePulseError::Internal(err.to_string())
            }
        }
    }
}

/// Convenience type alias for flusher operations
pub type FlusherResult<T> = Result<T, FlusherError>;
