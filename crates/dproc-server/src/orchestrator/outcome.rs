use dproc_common::types::{ValidationError, ValidationStatus};
use serde::Serialize;
use serde_json::Value;

use crate::metrics::MetricsReport;

/// Result of one validation run. `total_records == valid_records + invalid_records`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub validation_result_id: String,
    pub correlation_id: String,
    pub data_source_id: String,
    pub file_name: String,
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub status: ValidationStatus,
    /// Valid records in input order.
    #[serde(skip)]
    pub valid: Vec<Value>,
    /// Ids of the invalid records stored by this run.
    pub invalid_record_ids: Vec<String>,
    /// Every error of every invalid record, in record order.
    pub errors: Vec<ValidationError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_valid_records_key: Option<String>,
    pub metrics: MetricsReport,
    pub processing_duration_ms: u64,
}

impl ValidationOutcome {
    pub fn is_fully_valid(&self) -> bool {
        self.invalid_records == 0 && self.total_records > 0
    }
}
