//! Delete invalid record command

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::features::invalid_records::workflow::{CorrectionWorkflow, WorkflowError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordCommand {
    pub record_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRecordResponse {
    pub record_id: String,
    pub deleted: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DeleteRecordError {
    #[error("Record id is required and cannot be empty")]
    RecordIdRequired,
    #[error("Invalid record '{0}' not found")]
    NotFound(String),
    #[error("Delete failed: {0}")]
    Workflow(WorkflowError),
}

impl From<WorkflowError> for DeleteRecordError {
    fn from(err: WorkflowError) -> Self {
        match err {
            WorkflowError::NotFound(id) => Self::NotFound(id),
            other => Self::Workflow(other),
        }
    }
}

impl Request<Result<DeleteRecordResponse, DeleteRecordError>> for DeleteRecordCommand {}

impl DeleteRecordCommand {
    pub fn validate(&self) -> Result<(), DeleteRecordError> {
        if self.record_id.trim().is_empty() {
            return Err(DeleteRecordError::RecordIdRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(workflow, command), fields(record_id = %command.record_id))]
pub async fn handle(
    workflow: CorrectionWorkflow,
    command: DeleteRecordCommand,
) -> Result<DeleteRecordResponse, DeleteRecordError> {
    command.validate()?;
    workflow.delete(&command.record_id).await?;
    Ok(DeleteRecordResponse {
        record_id: command.record_id,
        deleted: true,
    })
}
