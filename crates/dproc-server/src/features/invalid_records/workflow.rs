//! Correction and reprocessing of invalid records
//!
//! Reprocessing sends a single-record batch straight through the
//! [`ValidationOrchestrator`], so the caller gets the outcome back instead of
//! waiting on the bus. The orchestrator removes the original record once the
//! run completes; a payload that still fails produces a fresh invalid record.

use std::sync::Arc;

use chrono::Utc;
use dproc_common::types::{InvalidRecord, ReviewState, ValidationRequestEvent};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::orchestrator::{OrchestratorError, ValidationOrchestrator, ValidationOutcome};
use crate::store::{SharedStore, StoreError};

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("invalid record not found: {0}")]
    NotFound(String),

    #[error("corrected data must be a JSON object")]
    CorrectionNotAnObject,

    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Store(StoreError),

    #[error("reprocessing failed: {0}")]
    Reprocess(#[from] OrchestratorError),
}

impl From<StoreError> for WorkflowError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => WorkflowError::NotFound(id),
            other => WorkflowError::Store(other),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectionResult {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ValidationOutcome>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessResult {
    pub success: bool,
    pub is_valid: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Reprocess,
    Ignore,
    Delete,
}

impl std::fmt::Display for BulkAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            BulkAction::Reprocess => "reprocess",
            BulkAction::Ignore => "ignore",
            BulkAction::Delete => "delete",
        })
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRecordError {
    pub record_id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationResult {
    pub total_requested: usize,
    pub successful: usize,
    pub failed: usize,
    pub errors: Vec<BulkRecordError>,
}

impl BulkOperationResult {
    fn record(&mut self, record_id: &str, result: Result<(), String>) {
        match result {
            Ok(()) => self.successful += 1,
            Err(error) => {
                self.failed += 1;
                self.errors.push(BulkRecordError {
                    record_id: record_id.to_string(),
                    error,
                });
            },
        }
    }
}

#[derive(Clone)]
pub struct CorrectionWorkflow {
    store: SharedStore,
    orchestrator: Arc<ValidationOrchestrator>,
    cancel: CancellationToken,
}

impl CorrectionWorkflow {
    pub fn new(
        store: SharedStore,
        orchestrator: Arc<ValidationOrchestrator>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            store,
            orchestrator,
            cancel,
        }
    }

    pub fn store(&self) -> &SharedStore {
        &self.store
    }

    async fn load(&self, record_id: &str) -> Result<InvalidRecord, WorkflowError> {
        self.store
            .get(record_id)
            .await?
            .ok_or_else(|| WorkflowError::NotFound(record_id.to_string()))
    }

    /// Merge `corrected` over the stored payload and mark the record reviewed.
    ///
    /// With `auto_reprocess` the merged payload is validated again and the
    /// run outcome is attached to the result.
    #[tracing::instrument(skip(self, corrected))]
    pub async fn correct(
        &self,
        record_id: &str,
        corrected: Value,
        corrected_by: &str,
        auto_reprocess: bool,
    ) -> Result<CorrectionResult, WorkflowError> {
        if !corrected.is_object() {
            return Err(WorkflowError::CorrectionNotAnObject);
        }

        let mut record = self.load(record_id).await?;
        let base = record
            .corrected_data
            .clone()
            .unwrap_or_else(|| record.original_record.clone());
        let merged = merge_fields(base, corrected);

        let now = Utc::now();
        record.corrected_data = Some(merged);
        record.corrected_by = Some(corrected_by.to_string());
        record.corrected_at = Some(now);
        record.review_state = ReviewState::Reviewed;
        record.reviewed_by = Some(corrected_by.to_string());
        record.reviewed_at = Some(now);
        record.review_notes = Some("Data corrected".to_string());
        self.store.update(record.clone()).await?;
        info!(corrected_by, "Invalid record corrected");

        if !auto_reprocess {
            return Ok(CorrectionResult {
                success: true,
                message: "Record corrected successfully".to_string(),
                outcome: None,
            });
        }

        let outcome = self.revalidate(&record, "CORRECTED").await?;
        let message = if outcome.is_fully_valid() {
            "Record corrected and passed validation".to_string()
        } else {
            format!(
                "Record corrected but still fails validation ({} error(s))",
                outcome.errors.len()
            )
        };
        Ok(CorrectionResult {
            success: true,
            message,
            outcome: Some(outcome),
        })
    }

    /// Validate the record again as it stands, corrections included.
    #[tracing::instrument(skip(self))]
    pub async fn reprocess(&self, record_id: &str) -> Result<ReprocessResult, WorkflowError> {
        let record = self.load(record_id).await?;
        let outcome = self.revalidate(&record, "REPROCESSED").await?;

        if outcome.is_fully_valid() {
            Ok(ReprocessResult {
                success: true,
                is_valid: true,
                message: "Record passed validation".to_string(),
                validation_errors: None,
            })
        } else {
            Ok(ReprocessResult {
                success: true,
                is_valid: false,
                message: "Record still fails validation".to_string(),
                validation_errors: Some(outcome.errors.iter().map(|e| e.message.clone()).collect()),
            })
        }
    }

    /// Set the review state of one record.
    pub async fn update_status(
        &self,
        record_id: &str,
        state: ReviewState,
        reviewed_by: &str,
        notes: Option<String>,
    ) -> Result<InvalidRecord, WorkflowError> {
        let mut record = self.load(record_id).await?;
        record.review_state = state;
        record.reviewed_by = Some(reviewed_by.to_string());
        record.reviewed_at = Some(Utc::now());
        record.review_notes = notes;
        self.store.update(record.clone()).await?;
        info!(record_id, state = %state, reviewed_by, "Review state updated");
        Ok(record)
    }

    pub async fn delete(&self, record_id: &str) -> Result<(), WorkflowError> {
        if self.store.delete(record_id).await? {
            info!(record_id, "Invalid record deleted");
            Ok(())
        } else {
            Err(WorkflowError::NotFound(record_id.to_string()))
        }
    }

    /// Apply `action` to every id; individual failures are tallied, never raised.
    #[tracing::instrument(skip(self, record_ids), fields(count = record_ids.len()))]
    pub async fn bulk(
        &self,
        action: BulkAction,
        record_ids: &[String],
        requested_by: &str,
    ) -> BulkOperationResult {
        let mut result = BulkOperationResult {
            total_requested: record_ids.len(),
            ..Default::default()
        };

        for record_id in record_ids {
            let outcome = match action {
                BulkAction::Reprocess => self.reprocess(record_id).await.map(|_| ()),
                BulkAction::Ignore => self
                    .update_status(
                        record_id,
                        ReviewState::Ignored,
                        requested_by,
                        Some("Bulk ignored".to_string()),
                    )
                    .await
                    .map(|_| ()),
                BulkAction::Delete => self.delete(record_id).await,
            };
            if let Err(e) = &outcome {
                warn!(record_id = %record_id, error = %e, "Bulk {} failed for record", action);
            }
            result.record(record_id, outcome.map_err(|e| e.to_string()));
        }

        info!(
            successful = result.successful,
            total = result.total_requested,
            "Bulk {} completed",
            action
        );
        result
    }

    async fn revalidate(
        &self,
        record: &InvalidRecord,
        suffix: &str,
    ) -> Result<ValidationOutcome, WorkflowError> {
        let payload = record
            .corrected_data
            .clone()
            .unwrap_or_else(|| record.original_record.clone());
        let content = serde_json::to_vec(&Value::Array(vec![payload]))?;

        let mut request = ValidationRequestEvent::inline(
            Uuid::new_v4().to_string(),
            &record.data_source_id,
            format!("{}_{}", record.file_name, suffix),
            content,
        );
        request.is_reprocess = true;
        request.original_invalid_record_id = Some(record.id.clone());

        Ok(self.orchestrator.handle(request, &self.cancel).await?)
    }
}

/// Overlay `patch` on `base`; nested objects merge, anything else replaces.
pub fn merge_fields(base: Value, patch: Value) -> Value {
    match (base, patch) {
        (Value::Object(mut base), Value::Object(patch)) => {
            for (key, value) in patch {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_fields(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        },
        (_, patch) => patch,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_keeps_untouched_fields() {
        let merged = merge_fields(
            json!({"id": "1", "amount": -5, "customer": {"name": "Acme", "tier": "gold"}}),
            json!({"amount": 50, "customer": {"tier": "silver"}}),
        );
        assert_eq!(
            merged,
            json!({"id": "1", "amount": 50, "customer": {"name": "Acme", "tier": "silver"}})
        );
    }

    #[test]
    fn test_merge_replaces_non_objects() {
        assert_eq!(merge_fields(json!({"a": [1, 2]}), json!({"a": [3]})), json!({"a": [3]}));
        assert_eq!(merge_fields(json!({"a": 1}), json!({"a": null})), json!({"a": null}));
        assert_eq!(merge_fields(json!(5), json!({"a": 1})), json!({"a": 1}));
    }

    #[test]
    fn test_bulk_tally() {
        let mut result = BulkOperationResult {
            total_requested: 2,
            ..Default::default()
        };
        result.record("a", Ok(()));
        result.record("b", Err("missing".into()));

        assert_eq!(result.successful, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.errors[0].record_id, "b");
    }
}
