//! Error types for the core crate.

use rewind_history::HistoryError;
use std::path::PathBuf;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Configuration error.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// History engine error.
    #[error("history error: {0}")]
    History(#[from] HistoryError),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Timeline position out of range.
    #[error("no snapshot at position {position} (timeline has {len})")]
    InvalidPosition { position: usize, len: usize },

    /// The file manager could not be launched.
    #[error("could not open {}: {message}", path.display())]
    Reveal { path: PathBuf, message: String },
}

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Invalid JSON/JSONC syntax.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// Config validation failed.
    #[error("config validation failed: {message}")]
    Validation { message: String },

    /// Config file not found.
    #[error("config file not found: {path}")]
    NotFound { path: String },

    /// Environment variable not found during substitution.
    #[error("environment variable not found: {name}")]
    EnvVarNotFound { name: String },

    /// Invalid path (e.g., could not determine home directory).
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
