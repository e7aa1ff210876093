//! Output dispatcher
//!
//! Consumes completion events, reconstructs the staged valid records in each
//! destination's format and writes them to every enabled destination
//! concurrently. Destinations are isolated from each other: a failure is
//! recorded in that destination's [`OutputAttempt`] and never propagates.
//!
//! Per destination a write goes `Pending -> Writing -> Success`, or through
//! `Retrying -> Writing` on transient failures, ending in `Failed` plus a
//! dead-letter envelope once retries are exhausted or the circuit is open.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dproc_common::types::{OutputDestination, ValidationCompletedEvent};
use dproc_convert::ConverterRegistry;
use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};

use super::dead_letter::DeadLetterQueue;
use super::handler::{OutputAttempt, OutputContent, OutputHandler, WriteError};
use super::resilience::{execute_with_retry, CircuitBreakerManager, RetryConfig};
use crate::cache::{load_records, CacheError, CacheMap, SharedCache};
use crate::datasource::{DataSource, DataSourceRepository};
use crate::store::{SharedStore, StoreError};

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("staged valid records '{0}' not found or expired")]
    StagedRecordsMissing(String),

    #[error("data source not found: {0}")]
    DataSourceNotFound(String),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchSummary {
    pub correlation_id: String,
    pub data_source_id: String,
    pub file_name: String,
    pub records: usize,
    pub attempts: Vec<OutputAttempt>,
    pub succeeded: usize,
    pub failed: usize,
    pub duration_ms: u64,
    /// Why nothing was dispatched, when that is the case.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

impl DispatchSummary {
    fn skipped(event: &ValidationCompletedEvent, reason: impl Into<String>) -> Self {
        Self {
            correlation_id: event.correlation_id.clone(),
            data_source_id: event.data_source_id.clone(),
            file_name: event.file_name.clone(),
            records: 0,
            attempts: Vec::new(),
            succeeded: 0,
            failed: 0,
            duration_ms: 0,
            skipped: Some(reason.into()),
        }
    }
}

pub struct OutputDispatcher {
    cache: SharedCache,
    datasources: Arc<dyn DataSourceRepository>,
    store: SharedStore,
    converters: Arc<ConverterRegistry>,
    handlers: Vec<Arc<dyn OutputHandler>>,
    retry: RetryConfig,
    breakers: Arc<CircuitBreakerManager>,
    dead_letters: DeadLetterQueue,
}

impl OutputDispatcher {
    pub fn new(
        cache: SharedCache,
        datasources: Arc<dyn DataSourceRepository>,
        store: SharedStore,
        converters: Arc<ConverterRegistry>,
        retry: RetryConfig,
        breakers: Arc<CircuitBreakerManager>,
        dead_letters: DeadLetterQueue,
    ) -> Self {
        Self {
            cache,
            datasources,
            store,
            converters,
            handlers: Vec::new(),
            retry,
            breakers,
            dead_letters,
        }
    }

    /// Register a handler; the first one whose `can_handle` matches wins.
    pub fn with_handler(mut self, handler: Arc<dyn OutputHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn breakers(&self) -> &CircuitBreakerManager {
        &self.breakers
    }

    fn handler_for(&self, destination: &OutputDestination) -> Option<&Arc<dyn OutputHandler>> {
        self.handlers
            .iter()
            .find(|h| h.can_handle(destination.destination_type))
    }

    #[tracing::instrument(
        skip(self, event),
        fields(
            correlation_id = %event.correlation_id,
            data_source_id = %event.data_source_id,
            file = %event.file_name
        )
    )]
    pub async fn dispatch(&self, event: &ValidationCompletedEvent) -> Result<DispatchSummary, DispatchError> {
        if !event.validation_status.is_dispatchable() {
            info!(status = %event.validation_status, "Skipping dispatch for non-dispatchable status");
            return Ok(DispatchSummary::skipped(event, format!("status {}", event.validation_status)));
        }
        if event.valid_records == 0 || event.staged_valid_records_key.is_empty() {
            info!("Skipping dispatch, run produced no valid records");
            return Ok(DispatchSummary::skipped(event, "no valid records"));
        }

        let started = Instant::now();
        let key = event.staged_valid_records_key.as_str();
        let valid = load_records(self.cache.as_ref(), key)
            .await?
            .ok_or_else(|| DispatchError::StagedRecordsMissing(key.to_string()))?;
        let data_source = self
            .datasources
            .get(&event.data_source_id)
            .await
            .ok_or_else(|| DispatchError::DataSourceNotFound(event.data_source_id.clone()))?;

        let destinations: Vec<&OutputDestination> = data_source
            .output
            .destinations
            .iter()
            .filter(|d| d.enabled)
            .collect();

        let invalid = if destinations
            .iter()
            .any(|d| d.effective_include_invalid(&data_source.output))
        {
            self.invalid_originals(&event.validation_result_id).await?
        } else {
            Vec::new()
        };

        let attempts = join_all(
            destinations
                .iter()
                .map(|d| self.deliver(d, &data_source, event, &valid, &invalid)),
        )
        .await;

        if let Err(e) = self.cache.remove(CacheMap::ValidRecords, key).await {
            warn!(key, error = %e, "Could not remove staged valid records");
        }

        let succeeded = attempts.iter().filter(|a| a.success).count();
        let summary = DispatchSummary {
            correlation_id: event.correlation_id.clone(),
            data_source_id: event.data_source_id.clone(),
            file_name: event.file_name.clone(),
            records: valid.len(),
            failed: attempts.len() - succeeded,
            succeeded,
            attempts,
            duration_ms: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            skipped: None,
        };

        if summary.attempts.is_empty() {
            info!("Data source has no enabled destinations");
        } else if summary.failed == 0 {
            info!(destinations = summary.succeeded, duration_ms = summary.duration_ms, "Dispatch completed");
        } else {
            warn!(
                succeeded = summary.succeeded,
                failed = summary.failed,
                duration_ms = summary.duration_ms,
                "Dispatch completed with failures"
            );
        }
        Ok(summary)
    }

    async fn invalid_originals(&self, validation_result_id: &str) -> Result<Vec<Value>, DispatchError> {
        Ok(self
            .store
            .by_validation_result(validation_result_id)
            .await?
            .into_iter()
            .map(|r| r.original_record)
            .collect())
    }

    async fn deliver(
        &self,
        destination: &OutputDestination,
        data_source: &DataSource,
        event: &ValidationCompletedEvent,
        valid: &[Value],
        invalid: &[Value],
    ) -> OutputAttempt {
        let started = Instant::now();
        let failed = |message: String, attempts: u32, dead_lettered: bool| OutputAttempt {
            destination_id: destination.id.clone(),
            destination_name: destination.name.clone(),
            success: false,
            bytes_written: 0,
            duration: started.elapsed(),
            error_message: Some(message),
            attempts,
            location: None,
            dead_lettered,
        };

        let Some(handler) = self.handler_for(destination) else {
            error!(
                destination = %destination.name,
                destination_type = %destination.destination_type,
                "No handler for destination type"
            );
            return failed(format!("no handler for destination type '{}'", destination.destination_type), 0, false);
        };

        let include_invalid = destination.effective_include_invalid(&data_source.output);
        let records: Vec<Value> = if include_invalid && !invalid.is_empty() {
            valid.iter().chain(invalid).cloned().collect()
        } else {
            valid.to_vec()
        };

        let format = destination.effective_format(&data_source.output);
        let reconstructed = match self
            .converters
            .reconstruct(&records, &format, &data_source.format_metadata)
        {
            Ok(r) => r,
            Err(e) => {
                error!(destination = %destination.name, format = %format, error = %e, "Reconstruction failed");
                return failed(format!("reconstruction failed: {e}"), 0, false);
            },
        };

        let content = OutputContent {
            bytes: reconstructed.bytes,
            format: reconstructed.format,
            original_file_name: event.file_name.clone(),
            data_source_id: data_source.id.clone(),
            data_source_name: data_source.name.clone(),
            correlation_id: event.correlation_id.clone(),
            created_at: Utc::now(),
        };

        let breaker = self.breakers.get_or_create(&destination.id);
        let outcome = execute_with_retry(&self.retry, WriteError::is_retryable, |attempt| {
            let breaker = Arc::clone(&breaker);
            let content = &content;
            async move {
                if !breaker.allow_request() {
                    return Err(WriteError::Permanent(format!(
                        "circuit open for destination '{}'",
                        destination.id
                    )));
                }
                debug!(destination = %destination.name, attempt = attempt + 1, "Writing");
                match handler.write(destination, content).await {
                    Ok(written) => {
                        breaker.record_success();
                        Ok(written)
                    },
                    // Permanent errors are about this payload, not the destination's health.
                    Err(e) => {
                        if e.is_retryable() {
                            breaker.record_failure();
                            warn!(destination = %destination.name, attempt = attempt + 1, error = %e, "Write failed, retrying");
                        }
                        Err(e)
                    },
                }
            }
        })
        .await;

        match outcome.result {
            Ok(written) => OutputAttempt {
                destination_id: destination.id.clone(),
                destination_name: destination.name.clone(),
                success: true,
                bytes_written: written.bytes_written,
                duration: started.elapsed(),
                error_message: None,
                attempts: outcome.attempts,
                location: Some(written.location),
                dead_lettered: false,
            },
            Err(e) => {
                let message = e.to_string();
                let dead_lettered = match self
                    .dead_letters
                    .park(destination, &content, &message, outcome.attempts)
                    .await
                {
                    Ok(_) => true,
                    Err(park_error) => {
                        error!(destination = %destination.name, error = %park_error, "Could not write dead-letter envelope");
                        false
                    },
                };
                failed(message, outcome.attempts, dead_lettered)
            },
        }
    }

    /// Consume completion events until the queue closes or `cancel` fires.
    /// In-flight dispatches are awaited before the task ends.
    pub fn start(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ValidationCompletedEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!("Output dispatcher started");
            let tracker = TaskTracker::new();

            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = events.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                let dispatcher = Arc::clone(&self);
                tracker.spawn(async move {
                    if let Err(e) = dispatcher.dispatch(&event).await {
                        error!(correlation_id = %event.correlation_id, error = %e, "Dispatch failed");
                    }
                });
            }

            tracker.close();
            tracker.wait().await;
            info!("Output dispatcher stopped");
        })
    }
}
