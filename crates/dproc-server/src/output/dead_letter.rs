//! Dead-letter storage for batches that exhausted their retries
//!
//! Each batch is written as one JSON envelope. Nothing reads these files
//! back automatically; operators inspect and replay them by hand.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;
use uuid::Uuid;

use super::handler::OutputContent;
use dproc_common::types::OutputDestination;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetterEnvelope {
    pub id: String,
    pub destination_id: String,
    pub destination_name: String,
    pub destination_type: String,
    pub correlation_id: String,
    pub data_source_id: String,
    pub file_name: String,
    pub format: String,
    pub error: String,
    pub attempts: u32,
    pub failed_at: DateTime<Utc>,
    /// Output bytes, base64 encoded.
    pub content: String,
}

impl DeadLetterEnvelope {
    pub fn decode_content(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.content)
    }
}

#[derive(Debug, Clone)]
pub struct DeadLetterQueue {
    dir: PathBuf,
}

impl DeadLetterQueue {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist a failed batch. Returns the envelope path.
    pub async fn park(
        &self,
        destination: &OutputDestination,
        content: &OutputContent,
        error_message: &str,
        attempts: u32,
    ) -> std::io::Result<PathBuf> {
        let envelope = DeadLetterEnvelope {
            id: Uuid::new_v4().to_string(),
            destination_id: destination.id.clone(),
            destination_name: destination.name.clone(),
            destination_type: destination.destination_type.to_string(),
            correlation_id: content.correlation_id.clone(),
            data_source_id: content.data_source_id.clone(),
            file_name: content.output_file_name(),
            format: content.format.to_string(),
            error: error_message.to_string(),
            attempts,
            failed_at: Utc::now(),
            content: STANDARD.encode(&content.bytes),
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!(
            "{}_{}_{}.json",
            envelope.failed_at.format("%Y%m%d%H%M%S"),
            sanitize(&envelope.destination_id),
            envelope.id
        ));
        let body = serde_json::to_vec_pretty(&envelope)?;
        tokio::fs::write(&path, body).await?;

        error!(
            destination = %destination.name,
            correlation_id = %content.correlation_id,
            path = %path.display(),
            attempts,
            error = error_message,
            "Output batch moved to dead-letter"
        );
        Ok(path)
    }

    /// Every envelope currently parked, oldest first.
    pub async fn list(&self) -> std::io::Result<Vec<DeadLetterEnvelope>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut envelopes = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.path().extension().is_some_and(|ext| ext == "json") {
                let bytes = tokio::fs::read(entry.path()).await?;
                envelopes.push(serde_json::from_slice::<DeadLetterEnvelope>(&bytes)?);
            }
        }
        envelopes.sort_by(|a, b| a.failed_at.cmp(&b.failed_at));
        Ok(envelopes)
    }
}

fn sanitize(id: &str) -> String {
    id.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}
