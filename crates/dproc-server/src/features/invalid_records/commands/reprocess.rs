//! Reprocess invalid record command
//!
//! Validates a stored record again without new corrections, for retries
//! after the schema or upstream data has been fixed.

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::features::invalid_records::workflow::{CorrectionWorkflow, ReprocessResult, WorkflowError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReprocessRecordCommand {
    pub record_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ReprocessRecordError {
    #[error("Record id is required and cannot be empty")]
    RecordIdRequired,
    #[error("Invalid record '{0}' not found")]
    NotFound(String),
    #[error("Reprocess failed: {0}")]
    Workflow(WorkflowError),
}

impl From<WorkflowError> for ReprocessRecordError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => Self::NotFound(id),
            other => Self::Workflow(other),
        }
    }
}

impl Request<Result<ReprocessResult, ReprocessRecordError>> for ReprocessRecordCommand {}

impl ReprocessRecordCommand {
    pub fn validate(&self) -> Result<(), ReprocessRecordError> {
        if self.record_id.trim().is_empty() {
            return Err(ReprocessRecordError::RecordIdRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(workflow, command), fields(record_id = %command.record_id))]
pub async fn handle(
    workflow: CorrectionWorkflow,
    command: ReprocessRecordCommand,
) -> Result<ReprocessResult, ReprocessRecordError> {
    command.validate()?;
    Ok(workflow.reprocess(&command.record_id).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation() {
        assert!(ReprocessRecordCommand { record_id: "r-1".into() }.validate().is_ok());
        assert!(matches!(
            ReprocessRecordCommand { record_id: String::new() }.validate(),
            Err(ReprocessRecordError::RecordIdRequired)
        ));
    }
}
