//! Bulk operation command
//!
//! Applies reprocess, ignore or delete to a list of records. Each id is
//! handled on its own; the response tallies successes and failures.

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::features::invalid_records::workflow::{BulkAction, BulkOperationResult, CorrectionWorkflow};

pub const MAX_BULK_RECORDS: usize = 1000;

const DEFAULT_REQUESTED_BY: &str = "system";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOperationCommand {
    /// Taken from the path.
    #[serde(default = "default_action", skip_serializing)]
    pub action: BulkAction,
    pub record_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
}

fn default_action() -> BulkAction {
    BulkAction::Reprocess
}

#[derive(Debug, thiserror::Error)]
pub enum BulkOperationError {
    #[error("At least one record id is required")]
    NoRecords,
    #[error("At most {max} records can be processed per request, got {0}", max = MAX_BULK_RECORDS)]
    TooManyRecords(usize),
    #[error("Record ids cannot be empty")]
    EmptyRecordId,
}

impl Request<Result<BulkOperationResult, BulkOperationError>> for BulkOperationCommand {}

impl BulkOperationCommand {
    pub fn validate(&self) -> Result<(), BulkOperationError> {
        if self.record_ids.is_empty() {
            return Err(BulkOperationError::NoRecords);
        }
        if self.record_ids.len() > MAX_BULK_RECORDS {
            return Err(BulkOperationError::TooManyRecords(self.record_ids.len()));
        }
        if self.record_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(BulkOperationError::EmptyRecordId);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(workflow, command),
    fields(action = %command.action, count = command.record_ids.len())
)]
pub async fn handle(
    workflow: CorrectionWorkflow,
    command: BulkOperationCommand,
) -> Result<BulkOperationResult, BulkOperationError> {
    command.validate()?;

    let requested_by = command
        .requested_by
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(DEFAULT_REQUESTED_BY);

    Ok(workflow
        .bulk(command.action, &command.record_ids, requested_by)
        .await)
}
