//! Common error types for the canopy pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Common result type for canopy operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across canopy tools
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Malformed input records
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Output directories could not be prepared; aborts the whole batch
    #[error("Setup failed for {path}: {source}")]
    Setup {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
