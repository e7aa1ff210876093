//! Conversion errors

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConvertError>;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("XML error: {0}")]
    Xml(String),

    #[error("Workbook error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Input is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("Malformed input: {0}")]
    Malformed(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),
}

impl ConvertError {
    pub(crate) fn xml(err: impl std::fmt::Display) -> Self {
        ConvertError::Xml(err.to_string())
    }
}
