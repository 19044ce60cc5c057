//! Error types for steadyrun
//!
//! One error enum for the whole library. Configuration problems surface at
//! construction time; the run loop itself only fails on I/O.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the run driver and its collaborators
#[derive(Error, Debug)]
pub enum RunError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Unknown convergence strategy name
    #[error("Unknown convergence strategy '{name}' (known: {known})")]
    InvalidStrategy { name: String, known: String },

    /// Strategy parameters that cannot produce a working detector
    #[error("Strategy misconfigured: {0}")]
    Misconfigured(String),

    /// Relative time calibration missing from simulator output
    #[error("Relative time not found within the first {lookahead} output lines")]
    CalibrationNotFound { lookahead: usize },

    /// Snapshot source file vanished before it could be copied
    #[error("Snapshot source file missing: {}", path.display())]
    SnapshotSourceMissing { path: PathBuf },

    /// Simulator parameter file lacks a variable
    #[error("Variable {name} not found in {}", path.display())]
    ParameterMissing { name: String, path: PathBuf },

    /// Simulator process could not be started
    #[error("Failed to spawn {}: {source}", path.display())]
    Spawn {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("Run error: {0}")]
    Generic(String),
}

/// Result type alias for run operations
pub type Result<T> = std::result::Result<T, RunError>;

/// Convert anyhow errors to RunError
impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        RunError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RunError::CalibrationNotFound { lookahead: 500 };
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn test_invalid_strategy_error() {
        let err = RunError::InvalidStrategy {
            name: "median".to_string(),
            known: "chunk_mean, slope".to_string(),
        };
        assert!(err.to_string().contains("median"));
        assert!(err.to_string().contains("chunk_mean"));
    }

    #[test]
    fn test_snapshot_missing_mentions_path() {
        let err = RunError::SnapshotSourceMissing {
            path: PathBuf::from("/tmp/sim/field.dat"),
        };
        assert!(err.to_string().contains("field.dat"));
    }
}
