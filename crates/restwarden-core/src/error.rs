//! Core error types for restwarden-core.
//!
//! This module defines the error hierarchy using thiserror. Most failure
//! paths in the scheduler are degrade-and-continue: configuration and
//! persistence errors are logged by the caller and never terminate a tick.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for restwarden-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Usage-snapshot persistence errors
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// OS power-control errors
    #[error("Power control error: {0}")]
    Power(#[from] PowerError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
///
/// Malformed values never surface here: they degrade to defaults at load
/// time with a logged warning. These variants cover the save/set paths.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown configuration key in get/set
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value in set
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },
}

/// Usage-snapshot persistence errors.
///
/// Never fatal to the scheduler; callers log and continue with fresh or
/// unsaved state.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Snapshot file exists but could not be read
    #[error("Failed to read usage snapshot at {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file content is not a valid snapshot
    #[error("Failed to parse usage snapshot at {path}: {message}")]
    ParseFailed { path: PathBuf, message: String },

    /// Snapshot could not be written
    #[error("Failed to write usage snapshot to {path}: {source}")]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// OS power-control errors.
#[derive(Error, Debug)]
pub enum PowerError {
    /// The host OS has no recognized shutdown command
    #[error("No shutdown command is available on this platform")]
    UnsupportedPlatform,

    /// The shutdown command could not be invoked or reported failure
    #[error("Shutdown command failed ({command}): {message}")]
    ExecutionFailed { command: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
