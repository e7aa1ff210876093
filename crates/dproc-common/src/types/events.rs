//! Pipeline events exchanged over the message bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{AlertRule, MetricScope};

/// Request to validate one ingested file.
///
/// The payload is either staged in the `file-content` cache map under
/// `hazelcast_key` or carried inline in `file_content`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRequestEvent {
    pub correlation_id: String,
    pub data_source_id: String,
    pub file_name: String,
    #[serde(default)]
    pub file_content_type: String,
    #[serde(default)]
    pub file_size_bytes: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hazelcast_key: Option<String>,
    #[serde(
        default,
        with = "super::bytes",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_content: Option<Vec<u8>>,
    #[serde(default)]
    pub is_reprocess: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_invalid_record_id: Option<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Where a validation request's payload lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource<'a> {
    Staged(&'a str),
    Inline(&'a [u8]),
    Missing,
}

impl ValidationRequestEvent {
    /// Build a request for a payload already staged in the cache.
    pub fn staged(
        correlation_id: impl Into<String>,
        data_source_id: impl Into<String>,
        file_name: impl Into<String>,
        staging_key: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data_source_id: data_source_id.into(),
            file_name: file_name.into(),
            file_content_type: "application/json".to_string(),
            file_size_bytes: 0,
            hazelcast_key: Some(staging_key.into()),
            file_content: None,
            is_reprocess: false,
            original_invalid_record_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Build a request carrying its payload inline.
    pub fn inline(
        correlation_id: impl Into<String>,
        data_source_id: impl Into<String>,
        file_name: impl Into<String>,
        content: Vec<u8>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data_source_id: data_source_id.into(),
            file_name: file_name.into(),
            file_content_type: "application/json".to_string(),
            file_size_bytes: content.len() as u64,
            hazelcast_key: None,
            file_content: Some(content),
            is_reprocess: false,
            original_invalid_record_id: None,
            timestamp: Utc::now(),
        }
    }

    /// Staging key wins over inline content; an empty key counts as absent.
    pub fn payload_source(&self) -> PayloadSource<'_> {
        match (&self.hazelcast_key, &self.file_content) {
            (Some(key), _) if !key.is_empty() => PayloadSource::Staged(key),
            (_, Some(bytes)) => PayloadSource::Inline(bytes),
            _ => PayloadSource::Missing,
        }
    }
}

/// Terminal status of a validation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValidationStatus {
    Success,
    PartialFailure,
    Completed,
    Failed,
}

impl ValidationStatus {
    pub fn from_counts(invalid_records: usize) -> Self {
        if invalid_records == 0 {
            ValidationStatus::Success
        } else {
            ValidationStatus::PartialFailure
        }
    }

    /// Statuses for which valid records may be dispatched to destinations.
    pub fn is_dispatchable(self) -> bool {
        matches!(
            self,
            ValidationStatus::Success | ValidationStatus::Completed | ValidationStatus::PartialFailure
        )
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ValidationStatus::Success => "Success",
            ValidationStatus::PartialFailure => "PartialFailure",
            ValidationStatus::Completed => "Completed",
            ValidationStatus::Failed => "Failed",
        };
        f.write_str(s)
    }
}

/// Published after every successful validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationCompletedEvent {
    pub correlation_id: String,
    pub data_source_id: String,
    pub file_name: String,
    pub validation_result_id: String,
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub validation_status: ValidationStatus,
    /// Empty when the run produced no valid records.
    #[serde(default)]
    pub staged_valid_records_key: String,
    /// Milliseconds spent in the run.
    pub processing_duration: u64,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Published when a validation run aborts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileProcessingFailedEvent {
    pub correlation_id: String,
    pub data_source_id: String,
    pub error_message: String,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl FileProcessingFailedEvent {
    pub fn new(
        correlation_id: impl Into<String>,
        data_source_id: impl Into<String>,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            data_source_id: data_source_id.into(),
            error_message: error_message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Request for the metric definitions that apply to a data source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfigurationRequest {
    pub correlation_id: String,
    pub data_source_id: String,
    #[serde(default = "default_true")]
    pub include_global: bool,
    #[serde(default = "default_true")]
    pub only_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MetricsConfigurationResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub metrics: Vec<MetricConfigurationDto>,
}

/// Remote metric definition as served by the configuration service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricConfigurationDto {
    pub name: String,
    pub field_path: String,
    #[serde(default)]
    pub prometheus_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub scope: MetricScope,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub alert_rules: Vec<AlertRule>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_names() {
        let json = r#"{
            "correlationId": "c-1",
            "dataSourceId": "ds-1",
            "fileName": "orders.csv",
            "fileContentType": "text/csv",
            "fileSizeBytes": 42,
            "hazelcastKey": "file-content:abc"
        }"#;
        let event: ValidationRequestEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.payload_source(), PayloadSource::Staged("file-content:abc"));
        assert!(!event.is_reprocess);
    }

    #[test]
    fn test_inline_content_is_base64_on_the_wire() {
        let event = ValidationRequestEvent::inline("c", "ds", "f.json", b"[1]".to_vec());
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["fileContent"], "WzFd");

        let back: ValidationRequestEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.payload_source(), PayloadSource::Inline(b"[1]"));
    }

    #[test]
    fn test_empty_staging_key_falls_back_to_inline() {
        let mut event = ValidationRequestEvent::inline("c", "ds", "f.json", b"{}".to_vec());
        event.hazelcast_key = Some(String::new());
        assert_eq!(event.payload_source(), PayloadSource::Inline(b"{}"));

        event.file_content = None;
        assert_eq!(event.payload_source(), PayloadSource::Missing);
    }

    #[test]
    fn test_status_from_counts() {
        assert_eq!(ValidationStatus::from_counts(0), ValidationStatus::Success);
        assert_eq!(ValidationStatus::from_counts(3), ValidationStatus::PartialFailure);
        assert!(!ValidationStatus::Failed.is_dispatchable());
        assert!(ValidationStatus::Completed.is_dispatchable());
    }

    #[test]
    fn test_completed_event_serializes_status_as_pascal_case() {
        let event = ValidationCompletedEvent {
            correlation_id: "c".into(),
            data_source_id: "ds".into(),
            file_name: "f".into(),
            validation_result_id: "r".into(),
            total_records: 2,
            valid_records: 1,
            invalid_records: 1,
            validation_status: ValidationStatus::PartialFailure,
            staged_valid_records_key: "valid-records:x".into(),
            processing_duration: 12,
            timestamp: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["validationStatus"], "PartialFailure");
        assert_eq!(json["stagedValidRecordsKey"], "valid-records:x");
    }
}
