//! Validation orchestrator
//!
//! Consumes validation requests and drives one run per request:
//! fetch payload, validate, calculate metrics, stage valid records, persist
//! and publish the completion event. Cancellation is observed between
//! stages; work already done is not rolled back.

mod outcome;

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use dproc_common::types::{
    FileProcessingFailedEvent, InvalidRecord, PayloadSource, ReviewState, ValidationCompletedEvent,
    ValidationRequestEvent, ValidationResultSummary, ValidationStatus,
};
use dproc_convert::records::parse_records;
use dproc_convert::ConvertError;
use thiserror::Error;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub use outcome::ValidationOutcome;

use crate::bus::{BusError, EventPublisher, PipelineEvent};
use crate::cache::{stage_records, CacheError, CacheMap, SharedCache};
use crate::datasource::DataSourceRepository;
use crate::metrics::{MetricDefinitionProvider, MetricsCalculator};
use crate::store::{SharedStore, StoreError};
use crate::validation::{SchemaError, SchemaValidator};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("request carries neither a staging key nor inline content")]
    MissingPayload,

    #[error("staged file content '{0}' not found or expired")]
    StagedContentMissing(String),

    #[error("data source not found: {0}")]
    DataSourceNotFound(String),

    #[error("data source '{0}' is inactive")]
    DataSourceInactive(String),

    #[error("invalid schema: {0}")]
    Schema(#[from] SchemaError),

    #[error("unreadable payload: {0}")]
    Payload(#[from] ConvertError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error("validation run cancelled")]
    Cancelled,
}

pub struct ValidationOrchestrator {
    cache: SharedCache,
    datasources: Arc<dyn DataSourceRepository>,
    store: SharedStore,
    publisher: Arc<dyn EventPublisher>,
    validator: SchemaValidator,
    calculator: MetricsCalculator,
    definitions: Arc<MetricDefinitionProvider>,
    staging_ttl: Duration,
}

impl ValidationOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cache: SharedCache,
        datasources: Arc<dyn DataSourceRepository>,
        store: SharedStore,
        publisher: Arc<dyn EventPublisher>,
        validator: SchemaValidator,
        calculator: MetricsCalculator,
        definitions: Arc<MetricDefinitionProvider>,
        staging_ttl: Duration,
    ) -> Self {
        Self {
            cache,
            datasources,
            store,
            publisher,
            validator,
            calculator,
            definitions,
            staging_ttl,
        }
    }

    /// Run one validation request to completion.
    ///
    /// Fatal errors publish a [`FileProcessingFailedEvent`] before being
    /// returned; a cancelled run publishes nothing.
    #[tracing::instrument(
        skip(self, request, cancel),
        fields(
            correlation_id = %request.correlation_id,
            data_source_id = %request.data_source_id,
            file = %request.file_name
        )
    )]
    pub async fn handle(
        &self,
        request: ValidationRequestEvent,
        cancel: &CancellationToken,
    ) -> Result<ValidationOutcome, OrchestratorError> {
        match self.run(&request, cancel).await {
            Ok(outcome) => Ok(outcome),
            Err(OrchestratorError::Cancelled) => {
                info!("Validation run cancelled");
                Err(OrchestratorError::Cancelled)
            },
            Err(e) => {
                error!(error = %e, "Validation run failed");
                let failure = FileProcessingFailedEvent::new(
                    &request.correlation_id,
                    &request.data_source_id,
                    e.to_string(),
                );
                if let Err(publish_error) = self
                    .publisher
                    .publish(PipelineEvent::ProcessingFailed(failure))
                    .await
                {
                    warn!(error = %publish_error, "Could not publish failure event");
                }
                Err(e)
            },
        }
    }

    async fn run(
        &self,
        request: &ValidationRequestEvent,
        cancel: &CancellationToken,
    ) -> Result<ValidationOutcome, OrchestratorError> {
        let started = Instant::now();
        checkpoint(cancel)?;

        // Fetch
        let payload = self.fetch_payload(request).await?;
        let data_source = self
            .datasources
            .get(&request.data_source_id)
            .await
            .ok_or_else(|| OrchestratorError::DataSourceNotFound(request.data_source_id.clone()))?;
        if !data_source.is_active {
            return Err(OrchestratorError::DataSourceInactive(data_source.id));
        }
        let records = parse_records(&payload)?;
        debug!(records = records.len(), "Payload parsed");
        checkpoint(cancel)?;

        // Validate
        let partition = self.validator.validate(&data_source.json_schema, records)?;
        let total_records = partition.total();
        let valid_records = partition.valid.len();
        let invalid_records = partition.invalid.len();
        let status = ValidationStatus::from_counts(invalid_records);
        info!(total_records, valid_records, invalid_records, "Records validated");

        // Metrics never fail the run.
        let definitions = self
            .definitions
            .definitions_for(&request.correlation_id, &request.data_source_id)
            .await;
        let metrics = self.calculator.calculate(
            &definitions,
            &partition.valid,
            data_source.category_path.as_deref(),
        );
        checkpoint(cancel)?;

        // Stage first: a staging failure must leave nothing persisted.
        let staged_valid_records_key = if partition.valid.is_empty() {
            None
        } else {
            Some(stage_records(self.cache.as_ref(), &partition.valid, self.staging_ttl).await?)
        };

        let validation_result_id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut errors = Vec::new();
        let invalid: Vec<InvalidRecord> = partition
            .invalid
            .into_iter()
            .map(|rejected| {
                errors.extend(rejected.errors.iter().cloned());
                InvalidRecord {
                    id: Uuid::new_v4().to_string(),
                    data_source_id: request.data_source_id.clone(),
                    validation_result_id: validation_result_id.clone(),
                    correlation_id: request.correlation_id.clone(),
                    file_name: request.file_name.clone(),
                    record_index: Some(rejected.index),
                    original_record: rejected.record,
                    errors: rejected.errors,
                    review_state: ReviewState::Unreviewed,
                    reviewed_by: None,
                    reviewed_at: None,
                    review_notes: None,
                    corrected_by: None,
                    corrected_at: None,
                    corrected_data: None,
                    created_at: now,
                }
            })
            .collect();
        let invalid_record_ids: Vec<String> = invalid.iter().map(|r| r.id.clone()).collect();

        let summary = ValidationResultSummary {
            id: validation_result_id.clone(),
            data_source_id: request.data_source_id.clone(),
            correlation_id: request.correlation_id.clone(),
            file_name: request.file_name.clone(),
            total_records,
            valid_records,
            invalid_records,
            status,
            created_at: now,
        };
        if let Err(e) = self.persist(summary, invalid).await {
            if let Some(key) = &staged_valid_records_key {
                if let Err(cleanup) = self.cache.remove(CacheMap::ValidRecords, key).await {
                    warn!(key = %key, error = %cleanup, "Could not remove staged valid records");
                }
            }
            return Err(e);
        }
        checkpoint(cancel)?;

        // Publish
        let processing_duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        self.publisher
            .publish(PipelineEvent::ValidationCompleted(ValidationCompletedEvent {
                correlation_id: request.correlation_id.clone(),
                data_source_id: request.data_source_id.clone(),
                file_name: request.file_name.clone(),
                validation_result_id: validation_result_id.clone(),
                total_records,
                valid_records,
                invalid_records,
                validation_status: status,
                staged_valid_records_key: staged_valid_records_key.clone().unwrap_or_default(),
                processing_duration: processing_duration_ms,
                timestamp: Utc::now(),
            }))
            .await?;

        self.finish(request).await;

        info!(
            validation_result_id = %validation_result_id,
            status = %status,
            duration_ms = processing_duration_ms,
            "Validation run completed"
        );

        Ok(ValidationOutcome {
            validation_result_id,
            correlation_id: request.correlation_id.clone(),
            data_source_id: request.data_source_id.clone(),
            file_name: request.file_name.clone(),
            total_records,
            valid_records,
            invalid_records,
            status,
            valid: partition.valid,
            invalid_record_ids,
            errors,
            staged_valid_records_key,
            metrics,
            processing_duration_ms,
        })
    }

    async fn persist(
        &self,
        summary: ValidationResultSummary,
        invalid: Vec<InvalidRecord>,
    ) -> Result<(), OrchestratorError> {
        self.store.save_result(summary).await?;
        self.store.insert_many(invalid).await?;
        Ok(())
    }

    async fn fetch_payload(&self, request: &ValidationRequestEvent) -> Result<String, OrchestratorError> {
        match request.payload_source() {
            PayloadSource::Staged(key) => self
                .cache
                .get(CacheMap::FileContent, key)
                .await?
                .ok_or_else(|| OrchestratorError::StagedContentMissing(key.to_string())),
            PayloadSource::Inline(bytes) => Ok(std::str::from_utf8(bytes)
                .map_err(ConvertError::from)?
                .to_string()),
            PayloadSource::Missing => Err(OrchestratorError::MissingPayload),
        }
    }

    // Cleanup after a published run; failures here are only logged.
    async fn finish(&self, request: &ValidationRequestEvent) {
        if let PayloadSource::Staged(key) = request.payload_source() {
            if let Err(e) = self.cache.remove(CacheMap::FileContent, key).await {
                warn!(key, error = %e, "Could not remove consumed file content");
            }
        }

        if request.is_reprocess {
            if let Some(original) = &request.original_invalid_record_id {
                match self.store.delete(original).await {
                    Ok(true) => info!(invalid_record_id = %original, "Reprocessed record removed"),
                    Ok(false) => debug!(invalid_record_id = %original, "Reprocessed record already gone"),
                    Err(e) => warn!(invalid_record_id = %original, error = %e, "Could not remove reprocessed record"),
                }
            }
        }
    }

    /// Consume requests until the queue closes or `cancel` fires.
    ///
    /// Each request runs in its own task; at most `concurrency` run at once.
    pub fn start(
        self: Arc<Self>,
        mut requests: mpsc::Receiver<ValidationRequestEvent>,
        concurrency: usize,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(concurrency, "Validation orchestrator started");
            let permits = Arc::new(Semaphore::new(concurrency.max(1)));
            let tracker = TaskTracker::new();

            loop {
                let request = tokio::select! {
                    _ = cancel.cancelled() => break,
                    request = requests.recv() => match request {
                        Some(request) => request,
                        None => break,
                    },
                };

                let permit = tokio::select! {
                    _ = cancel.cancelled() => break,
                    permit = Arc::clone(&permits).acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => break,
                    },
                };

                let orchestrator = Arc::clone(&self);
                let cancel = cancel.clone();
                tracker.spawn(async move {
                    let _permit = permit;
                    // Errors are logged and published by `handle`.
                    let _ = orchestrator.handle(request, &cancel).await;
                });
            }

            tracker.close();
            tracker.wait().await;
            info!("Validation orchestrator stopped");
        })
    }
}

fn checkpoint(cancel: &CancellationToken) -> Result<(), OrchestratorError> {
    if cancel.is_cancelled() {
        Err(OrchestratorError::Cancelled)
    } else {
        Ok(())
    }
}
