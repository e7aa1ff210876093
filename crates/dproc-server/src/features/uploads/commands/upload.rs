//! Upload file command
//!
//! Converts a raw upload to JSON records, stages them under a fresh
//! `file-content` key, records the captured format conventions on the data
//! source and enqueues a validation request for the staged payload.

use dproc_common::types::ValidationRequestEvent;
use dproc_convert::{ConvertError, SourceFormat};
use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::bus::{BusError, PipelineEvent};
use crate::cache::{CacheError, CacheMap};
use crate::features::uploads::UploadState;

pub const MAX_FILE_NAME_LEN: usize = 255;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileCommand {
    pub data_source_id: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    /// Overrides the CSV delimiter remembered for the data source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<char>,
    #[serde(skip)]
    pub content: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadFileResponse {
    pub correlation_id: String,
    pub staging_key: String,
    pub file_name: String,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_format: Option<SourceFormat>,
}

#[derive(Debug, thiserror::Error)]
pub enum UploadFileError {
    #[error("Data source id is required and cannot be empty")]
    DataSourceIdRequired,
    #[error("File name is required and cannot be empty")]
    FileNameRequired,
    #[error("File name must not exceed {max} characters", max = MAX_FILE_NAME_LEN)]
    FileNameLength,
    #[error("Content is required and cannot be empty")]
    ContentRequired,
    #[error("Data source '{0}' not found")]
    DataSourceNotFound(String),
    #[error("Data source '{0}' is inactive")]
    DataSourceInactive(String),
    #[error("Could not convert upload: {0}")]
    Conversion(#[from] ConvertError),
    #[error("Could not encode records: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("Staging failed: {0}")]
    Cache(#[from] CacheError),
    #[error("Could not enqueue validation request: {0}")]
    Bus(#[from] BusError),
}

impl Request<Result<UploadFileResponse, UploadFileError>> for UploadFileCommand {}

impl UploadFileCommand {
    pub fn validate(&self) -> Result<(), UploadFileError> {
        if self.data_source_id.trim().is_empty() {
            return Err(UploadFileError::DataSourceIdRequired);
        }
        if self.file_name.trim().is_empty() {
            return Err(UploadFileError::FileNameRequired);
        }
        if self.file_name.chars().count() > MAX_FILE_NAME_LEN {
            return Err(UploadFileError::FileNameLength);
        }
        if self.content.is_empty() {
            return Err(UploadFileError::ContentRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(
    skip(state, command),
    fields(data_source_id = %command.data_source_id, file = %command.file_name, bytes = command.content.len())
)]
pub async fn handle(
    state: UploadState,
    command: UploadFileCommand,
) -> Result<UploadFileResponse, UploadFileError> {
    command.validate()?;

    let data_source = state
        .datasources
        .get(&command.data_source_id)
        .await
        .ok_or_else(|| UploadFileError::DataSourceNotFound(command.data_source_id.clone()))?;
    if !data_source.is_active {
        return Err(UploadFileError::DataSourceInactive(data_source.id));
    }

    let mut hints = data_source.format_metadata.clone();
    if let Some(delimiter) = command.delimiter {
        hints.csv_delimiter = delimiter;
    }
    let content_type = command.content_type.as_deref().unwrap_or_default();
    let converted = state
        .converters
        .to_json(&command.file_name, content_type, &command.content, &hints)?;
    let records = converted.records.len();

    let staging_key = CacheMap::FileContent.new_key();
    let payload = serde_json::to_string(&converted.records)?;
    state
        .cache
        .set(CacheMap::FileContent, &staging_key, payload, Some(state.staging_ttl))
        .await?;

    let original_format = converted.metadata.original_format;
    if !state
        .datasources
        .update_format_metadata(&data_source.id, converted.metadata)
        .await
    {
        tracing::warn!("Data source disappeared before its format metadata was recorded");
    }

    let correlation_id = Uuid::new_v4().to_string();
    let mut request = ValidationRequestEvent::staged(
        &correlation_id,
        &data_source.id,
        &command.file_name,
        &staging_key,
    );
    request.file_content_type = command
        .content_type
        .clone()
        .unwrap_or_else(|| "application/octet-stream".to_string());
    request.file_size_bytes = command.content.len() as u64;
    state
        .publisher
        .publish(PipelineEvent::ValidationRequested(request))
        .await?;

    tracing::info!(correlation_id = %correlation_id, records, "Upload staged for validation");

    Ok(UploadFileResponse {
        correlation_id,
        staging_key,
        file_name: command.file_name,
        records,
        original_format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command() -> UploadFileCommand {
        UploadFileCommand {
            data_source_id: "orders".into(),
            file_name: "orders.csv".into(),
            content_type: Some("text/csv".into()),
            delimiter: None,
            content: b"id,amount\n1,100\n".to_vec(),
        }
    }

    #[test]
    fn test_validation_success() {
        assert!(command().validate().is_ok());
    }

    #[test]
    fn test_validation_empty_content() {
        let mut cmd = command();
        cmd.content.clear();
        assert!(matches!(cmd.validate(), Err(UploadFileError::ContentRequired)));
    }

    #[test]
    fn test_validation_file_name_length() {
        let mut cmd = command();
        cmd.file_name = format!("{}.csv", "a".repeat(MAX_FILE_NAME_LEN));
        assert!(matches!(cmd.validate(), Err(UploadFileError::FileNameLength)));

        cmd.file_name = " ".into();
        assert!(matches!(cmd.validate(), Err(UploadFileError::FileNameRequired)));
    }
}
