//! Error types used throughout the engine

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for TracePulse
///
/// Configuration-class variants (`Config`, `UnknownUnit`, `IncompatibleUnit`,
/// `UnsupportedValue`) signal a programming or setup mistake and are returned
/// at the call site. `Store` and `Export` are runtime backend failures that
/// the flush machinery logs and drops.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TracePulseError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown unit: {0}")]
    UnknownUnit(String),

    #[error("Unit {from} is incompatible with unit {to}")]
    IncompatibleUnit { from: String, to: String },

    #[error("Unsupported value: {0}")]
    UnsupportedValue(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TracePulseError {
    /// Whether this error is a configuration mistake rather than a runtime
    /// backend condition.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Config(_)
                | Self::UnknownUnit(_)
                | Self::IncompatibleUnit { .. }
                | Self::UnsupportedValue(_)
        )
    }
}

/// Result type alias for TracePulse operations
pub type Result<T> = std::result::Result<T, TracePulseError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incompatible_unit_message() {
        let err = TracePulseError::IncompatibleUnit { from: "b".into(), to: "ns".into() };
        assert_eq!(err.to_string(), "Unit b is incompatible with unit ns");
        assert!(err.is_configuration());
    }

    #[test]
    fn test_backend_errors_are_not_configuration() {
        assert!(!TracePulseError::Store("disk full".into()).is_configuration());
        assert!(!TracePulseError::Export("timeout".into()).is_configuration());
    }

    #[test]
    fn test_error_serializes_tagged() {
        let json = serde_json::to_string(&TracePulseError::Config("bad".into())).unwrap();
        assert_eq!(json, r#"{"type":"Config","message":"bad"}"#);
    }
}
