//! Common error types for Scrumble

use thiserror::Error;

/// Common result type for Scrumble operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the Scrumble crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON encoding or decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input, rejected before anything is stored or sent
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Durable per-browser storage is disabled, full or unreadable
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
