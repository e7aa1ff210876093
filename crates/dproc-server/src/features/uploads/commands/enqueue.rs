//! Enqueue validation request command
//!
//! Accepts a validation request exactly as it would arrive on the inbound
//! topic and hands it to the orchestrator's queue.

use dproc_common::types::{PayloadSource, ValidationRequestEvent};
use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::bus::{BusError, PipelineEvent};
use crate::features::uploads::UploadState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EnqueueValidationCommand {
    pub request: ValidationRequestEvent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueValidationResponse {
    pub correlation_id: String,
    pub queued: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum EnqueueValidationError {
    #[error("correlationId is required and cannot be empty")]
    CorrelationIdRequired,
    #[error("dataSourceId is required and cannot be empty")]
    DataSourceIdRequired,
    #[error("fileName is required and cannot be empty")]
    FileNameRequired,
    #[error("Either hazelcastKey or fileContent must be provided")]
    PayloadRequired,
    #[error("Could not enqueue validation request: {0}")]
    Bus(#[from] BusError),
}

impl Request<Result<EnqueueValidationResponse, EnqueueValidationError>> for EnqueueValidationCommand {}

impl EnqueueValidationCommand {
    pub fn validate(&self) -> Result<(), EnqueueValidationError> {
        let request = &self.request;
        if request.correlation_id.trim().is_empty() {
            return Err(EnqueueValidationError::CorrelationIdRequired);
        }
        if request.data_source_id.trim().is_empty() {
            return Err(EnqueueValidationError::DataSourceIdRequired);
        }
        if request.file_name.trim().is_empty() {
            return Err(EnqueueValidationError::FileNameRequired);
        }
        if matches!(request.payload_source(), PayloadSource::Missing) {
            return Err(EnqueueValidationError::PayloadRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(state, command),
    fields(correlation_id = %command.request.correlation_id, data_source_id = %command.request.data_source_id)
)]
pub async fn handle(
    state: UploadState,
    command: EnqueueValidationCommand,
) -> Result<EnqueueValidationResponse, EnqueueValidationError> {
    command.validate()?;

    let correlation_id = command.request.correlation_id.clone();
    state
        .publisher
        .publish(PipelineEvent::ValidationRequested(command.request))
        .await?;

    tracing::info!("Validation request enqueued");
    Ok(EnqueueValidationResponse {
        correlation_id,
        queued: true,
    })
}
