//! Error types shared across dproc crates

use thiserror::Error;

/// Result type alias for dproc operations
pub type Result<T> = std::result::Result<T, DprocError>;

/// Main error type for dproc
#[derive(Error, Debug)]
pub enum DprocError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
