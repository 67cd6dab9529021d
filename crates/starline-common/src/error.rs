//! Error types shared by the Starline crates

use thiserror::Error;

/// Result type alias for common helpers
pub type Result<T> = std::result::Result<T, CommonError>;

#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid logging configuration: {0}")]
    LogConfig(String),

    #[error("Failed to install tracing subscriber: {0}")]
    LogInit(String),
}
