//! Correct invalid record command
//!
//! Merges field corrections over the stored payload and marks the record
//! reviewed. Fields not mentioned in the correction keep their values.

use mediator::Request;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::features::invalid_records::workflow::{CorrectionResult, CorrectionWorkflow, WorkflowError};

/// Command to correct one invalid record
///
/// # Examples
///
/// ```rust,ignore
/// use dproc_server::features::invalid_records::commands::CorrectRecordCommand;
///
/// let command = CorrectRecordCommand {
///     record_id: "7d4c...".to_string(),
///     corrected_data: serde_json::json!({"amount": 50}),
///     corrected_by: "dana".to_string(),
///     auto_reprocess: true,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CorrectRecordCommand {
    /// Taken from the path, never from the body.
    #[serde(default, skip_serializing)]
    pub record_id: String,
    pub corrected_data: Value,
    pub corrected_by: String,
    #[serde(default)]
    pub auto_reprocess: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum CorrectRecordError {
    #[error("Record id is required and cannot be empty")]
    RecordIdRequired,
    #[error("correctedBy is required and cannot be empty")]
    CorrectedByRequired,
    #[error("correctedData must be a non-empty JSON object")]
    CorrectionInvalid,
    #[error("Invalid record '{0}' not found")]
    NotFound(String),
    #[error("Correction failed: {0}")]
    Workflow(WorkflowError),
}

impl From<WorkflowError> for CorrectRecordError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => Self::NotFound(id),
            WorkflowError::CorrectionNotAnObject => Self::CorrectionInvalid,
            other => Self::Workflow(other),
        }
    }
}

impl Request<Result<CorrectionResult, CorrectRecordError>> for CorrectRecordCommand {}

impl CorrectRecordCommand {
    pub fn validate(&self) -> Result<(), CorrectRecordError> {
        if self.record_id.trim().is_empty() {
            return Err(CorrectRecordError::RecordIdRequired);
        }
        if self.corrected_by.trim().is_empty() {
            return Err(CorrectRecordError::CorrectedByRequired);
        }
        match self.corrected_data.as_object() {
            Some(fields) if !fields.is_empty() => Ok(()),
            _ => Err(CorrectRecordError::CorrectionInvalid),
        }
    }
}

#[tracing::instrument(skip(workflow, command), fields(record_id = %command.record_id))]
pub async fn handle(
    workflow: CorrectionWorkflow,
    command: CorrectRecordCommand,
) -> Result<CorrectionResult, CorrectRecordError> {
    command.validate()?;

    Ok(workflow
        .correct(
            &command.record_id,
            command.corrected_data,
            &command.corrected_by,
            command.auto_reprocess,
        )
        .await?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    fn command(data: Value) -> CorrectRecordCommand {
        CorrectRecordCommand {
            record_id: "r-1".into(),
            corrected_data: data,
            corrected_by: "dana".into(),
            auto_reprocess: false,
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command(json!({"amount": 50})).validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_empty_or_scalar_corrections() {
        assert!(matches!(
            command(json!({})).validate(),
            Err(CorrectRecordError::CorrectionInvalid)
        ));
        assert!(matches!(
            command(json!(50)).validate(),
            Err(CorrectRecordError::CorrectionInvalid)
        ));
    }

    #[test]
    fn test_validation_requires_author() {
        let mut cmd = command(json!({"amount": 50}));
        cmd.corrected_by = "  ".into();
        assert!(matches!(cmd.validate(), Err(CorrectRecordError::CorrectedByRequired)));
    }

    #[test]
    fn test_body_deserialization() {
        let cmd: CorrectRecordCommand = serde_json::from_value(json!({
            "correctedData": {"amount": 50},
            "correctedBy": "dana",
            "autoReprocess": true
        }))
        .unwrap();
        assert!(cmd.auto_reprocess);
        assert!(cmd.record_id.is_empty());
    }
}
