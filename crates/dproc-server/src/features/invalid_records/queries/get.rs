//! Get invalid record query

use dproc_common::types::InvalidRecord;
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::store::{SharedStore, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInvalidRecordQuery {
    pub record_id: String,
}

#[derive(Debug, thiserror::Error)]
pub enum GetInvalidRecordError {
    #[error("Record id is required and cannot be empty")]
    RecordIdRequired,
    #[error("Invalid record '{0}' not found")]
    NotFound(String),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl Request<Result<InvalidRecord, GetInvalidRecordError>> for GetInvalidRecordQuery {}

impl GetInvalidRecordQuery {
    pub fn validate(&self) -> Result<(), GetInvalidRecordError> {
        if self.record_id.trim().is_empty() {
            return Err(GetInvalidRecordError::RecordIdRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(store, query), fields(record_id = %query.record_id))]
pub async fn handle(
    store: SharedStore,
    query: GetInvalidRecordQuery,
) -> Result<InvalidRecord, GetInvalidRecordError> {
    query.validate()?;
    store
        .get(&query.record_id)
        .await?
        .ok_or(GetInvalidRecordError::NotFound(query.record_id))
}
