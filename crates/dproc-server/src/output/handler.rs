//! Destination handler contract

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dproc_common::types::{DestinationType, OutputDestination};
use dproc_convert::SourceFormat;
use serde::Serialize;
use thiserror::Error;

/// Why a write failed. Only retryable failures are retried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WriteError {
    #[error("{0}")]
    Retryable(String),

    #[error("{0}")]
    Permanent(String),
}

impl WriteError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, WriteError::Retryable(_))
    }
}

impl From<std::io::Error> for WriteError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::PermissionDenied | ErrorKind::InvalidInput | ErrorKind::InvalidData => {
                WriteError::Permanent(err.to_string())
            },
            _ => WriteError::Retryable(err.to_string()),
        }
    }
}

const FALLBACK_FILE_STEM: &str = "output";

/// A reconstructed batch ready to be written.
#[derive(Debug, Clone)]
pub struct OutputContent {
    pub bytes: Vec<u8>,
    pub format: SourceFormat,
    /// File name as uploaded, e.g. `orders.csv`.
    pub original_file_name: String,
    pub data_source_id: String,
    pub data_source_name: String,
    pub correlation_id: String,
    pub created_at: DateTime<Utc>,
}

impl OutputContent {
    /// Final component of the original name without its extension.
    ///
    /// Directory parts are dropped; a name with no usable stem becomes
    /// `output`.
    pub fn file_stem(&self) -> &str {
        let last = self
            .original_file_name
            .rsplit(|c: char| c == '/' || c == '\\')
            .next()
            .unwrap_or_default();
        match Path::new(last).file_stem().and_then(|stem| stem.to_str()) {
            Some(stem) if !stem.trim_matches('.').is_empty() => stem,
            _ => FALLBACK_FILE_STEM,
        }
    }

    /// Default output name: original stem plus the extension of the
    /// reconstructed format.
    pub fn output_file_name(&self) -> String {
        format!("{}.{}", self.file_stem(), self.format.extension())
    }
}

/// Where a successful write landed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Written {
    pub bytes_written: usize,
    /// Path, or `topic[partition]`, for logging.
    pub location: String,
}

/// Writes batches to one kind of destination.
#[async_trait]
pub trait OutputHandler: Send + Sync {
    fn can_handle(&self, destination_type: DestinationType) -> bool;

    async fn write(
        &self,
        destination: &OutputDestination,
        content: &OutputContent,
    ) -> Result<Written, WriteError>;
}

/// Result of sending one batch to one destination, retries included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputAttempt {
    pub destination_id: String,
    pub destination_name: String,
    pub success: bool,
    pub bytes_written: usize,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Set when the batch was moved to the dead-letter directory.
    pub dead_lettered: bool,
}

mod duration_ms {
    use std::time::Duration;

    use serde::Serializer;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn content(name: &str, format: SourceFormat) -> OutputContent {
        OutputContent {
            bytes: Vec::new(),
            format,
            original_file_name: name.into(),
            data_source_id: "ds".into(),
            data_source_name: "Orders".into(),
            correlation_id: "c".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_output_file_name_uses_reconstructed_extension() {
        assert_eq!(content("orders.csv", SourceFormat::Json).output_file_name(), "orders.json");
        assert_eq!(content("archive.tar.csv", SourceFormat::Csv).output_file_name(), "archive.tar.csv");
        assert_eq!(content("README", SourceFormat::Xml).output_file_name(), "README.xml");
        assert_eq!(content(".hidden", SourceFormat::Json).file_stem(), ".hidden");
    }

    #[test]
    fn test_file_stem_drops_directories() {
        assert_eq!(content("../../escaped.csv", SourceFormat::Json).file_stem(), "escaped");
        assert_eq!(content("/etc/cron.d/job.xml", SourceFormat::Json).file_stem(), "job");
        assert_eq!(content("..\\..\\win.csv", SourceFormat::Json).file_stem(), "win");
        assert_eq!(
            content("../../escaped.csv", SourceFormat::Json).output_file_name(),
            "escaped.json"
        );
    }

    #[test]
    fn test_file_stem_without_usable_name() {
        for name in ["", "..", "../..", "dir/", "..."] {
            assert_eq!(content(name, SourceFormat::Csv).file_stem(), "output", "name {name:?}");
        }
    }

    #[test]
    fn test_io_error_classification() {
        let denied = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "no");
        assert!(!WriteError::from(denied).is_retryable());
        let busy = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk");
        assert!(WriteError::from(busy).is_retryable());
    }
}
