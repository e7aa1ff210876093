//! Update review status command

use dproc_common::types::{InvalidRecord, ReviewState};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::features::invalid_records::workflow::{CorrectionWorkflow, WorkflowError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusCommand {
    #[serde(default, skip_serializing)]
    pub record_id: String,
    pub status: ReviewState,
    pub reviewed_by: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum UpdateStatusError {
    #[error("Record id is required and cannot be empty")]
    RecordIdRequired,
    #[error("reviewedBy is required and cannot be empty")]
    ReviewedByRequired,
    #[error("Notes must be at most 2000 characters")]
    NotesTooLong,
    #[error("Invalid record '{0}' not found")]
    NotFound(String),
    #[error("Status update failed: {0}")]
    Workflow(WorkflowError),
}

impl From<WorkflowError> for UpdateStatusError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => Self::NotFound(id),
            other => Self::Workflow(other),
        }
    }
}

impl Request<Result<InvalidRecord, UpdateStatusError>> for UpdateStatusCommand {}

impl UpdateStatusCommand {
    pub fn validate(&self) -> Result<(), UpdateStatusError> {
        if self.record_id.trim().is_empty() {
            return Err(UpdateStatusError::RecordIdRequired);
        }
        if self.reviewed_by.trim().is_empty() {
            return Err(UpdateStatusError::ReviewedByRequired);
        }
        if self.notes.as_ref().is_some_and(|n| n.chars().count() > 2000) {
            return Err(UpdateStatusError::NotesTooLong);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(workflow, command),
    fields(record_id = %command.record_id, status = %command.status)
)]
pub async fn handle(
    workflow: CorrectionWorkflow,
    command: UpdateStatusCommand,
) -> Result<InvalidRecord, UpdateStatusError> {
    command.validate()?;
    Ok(workflow
        .update_status(
            &command.record_id,
            command.status,
            &command.reviewed_by,
            command.notes,
        )
        .await?)
}
