//! Component wiring
//!
//! [`Pipeline::build`] assembles every stage from a [`Config`]; [`Pipeline::start`]
//! spawns the background consumers. The HTTP surface shares the same
//! components through [`Pipeline::feature_state`].

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use dproc_common::types::FileProcessingFailedEvent;
use dproc_convert::ConverterRegistry;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::bus::{BusReceivers, ChannelBus, EventPublisher};
use crate::cache::{InMemoryCache, SharedCache};
use crate::config::Config;
use crate::datasource::{DataSourceRepository, InMemoryDataSources};
use crate::features::invalid_records::CorrectionWorkflow;
use crate::features::uploads::UploadState;
use crate::features::FeatureState;
use crate::metrics::{MetricDefinitionProvider, MetricDefinitionSource, MetricsCalculator, StaticDefinitionSource};
use crate::orchestrator::ValidationOrchestrator;
use crate::output::resilience::{CircuitBreakerConfig, CircuitBreakerManager, RetryConfig};
use crate::output::{
    DeadLetterQueue, FolderOutputHandler, KafkaOutputHandler, MessageProducer, OutputDispatcher,
};
use crate::store::{InMemoryStore, SharedStore};
use crate::validation::{MessageCatalog, SchemaValidator};

pub struct Pipeline {
    cache: Arc<InMemoryCache>,
    datasources: Arc<dyn DataSourceRepository>,
    store: SharedStore,
    publisher: Arc<dyn EventPublisher>,
    receivers: BusReceivers,
    converters: Arc<ConverterRegistry>,
    orchestrator: Arc<ValidationOrchestrator>,
    dispatcher: Arc<OutputDispatcher>,
    shutdown: CancellationToken,
    concurrency: usize,
    sweep_interval: Duration,
    staging_ttl: Duration,
}

impl Pipeline {
    pub async fn build(config: &Config) -> anyhow::Result<Self> {
        let staging_ttl = config.cache.ttl();
        let shutdown = CancellationToken::new();

        let cache = Arc::new(InMemoryCache::new());
        let shared_cache: SharedCache = cache.clone();

        let datasources: Arc<dyn DataSourceRepository> = match &config.datasources_file {
            Some(path) => Arc::new(
                InMemoryDataSources::from_file(path)
                    .with_context(|| format!("loading data sources from {}", path.display()))?,
            ),
            None => {
                warn!("DATASOURCES_FILE not set, starting with no data sources");
                Arc::new(InMemoryDataSources::new())
            },
        };

        let store = build_store(config).await?;

        let (bus, receivers) = ChannelBus::new(config.validation.queue_capacity);
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus);

        let definition_source: Arc<dyn MetricDefinitionSource> = match &config.validation.metrics_file {
            Some(path) => Arc::new(
                StaticDefinitionSource::from_file(path)
                    .with_context(|| format!("loading metric definitions from {}", path.display()))?,
            ),
            None => Arc::new(StaticDefinitionSource::new(Vec::new())),
        };
        let definitions = Arc::new(MetricDefinitionProvider::new(
            definition_source,
            Duration::from_secs(config.validation.metrics_timeout_secs),
            Duration::from_secs(config.validation.metrics_cache_ttl_secs),
        ));

        let catalog = MessageCatalog::for_locale(&config.catalog.locale);
        info!(locale = catalog.locale(), "Validation message catalog loaded");

        let orchestrator = Arc::new(ValidationOrchestrator::new(
            shared_cache.clone(),
            datasources.clone(),
            store.clone(),
            publisher.clone(),
            SchemaValidator::new(Arc::new(catalog)),
            MetricsCalculator::new(config.validation.category_path.clone()),
            definitions,
            staging_ttl,
        ));

        let converters = Arc::new(ConverterRegistry::with_defaults());

        let retry = RetryConfig::default()
            .with_max_attempts(config.output.max_attempts)
            .with_base_delay(Duration::from_millis(config.output.base_delay_ms));
        let breakers = Arc::new(CircuitBreakerManager::new(
            CircuitBreakerConfig::default()
                .with_failure_threshold(config.output.breaker_threshold)
                .with_reset_timeout(Duration::from_secs(config.output.breaker_reset_secs)),
        ));
        let dispatcher = Arc::new(
            OutputDispatcher::new(
                shared_cache,
                datasources.clone(),
                store.clone(),
                converters.clone(),
                retry,
                breakers,
                DeadLetterQueue::new(config.output.dead_letter_dir.clone()),
            )
            .with_handler(Arc::new(FolderOutputHandler::new()))
            .with_handler(Arc::new(KafkaOutputHandler::new(message_producer(config)))),
        );

        Ok(Self {
            cache,
            datasources,
            store,
            publisher,
            receivers,
            converters,
            orchestrator,
            dispatcher,
            shutdown,
            concurrency: config.validation.concurrency,
            sweep_interval: Duration::from_secs(config.cache.sweep_interval_secs.max(1)),
            staging_ttl,
        })
    }

    /// Cancelling this token stops every worker and the HTTP server.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn datasources(&self) -> Arc<dyn DataSourceRepository> {
        self.datasources.clone()
    }

    pub fn store(&self) -> SharedStore {
        self.store.clone()
    }

    pub fn cache(&self) -> SharedCache {
        self.cache.clone()
    }

    pub fn orchestrator(&self) -> Arc<ValidationOrchestrator> {
        self.orchestrator.clone()
    }

    pub fn dispatcher(&self) -> Arc<OutputDispatcher> {
        self.dispatcher.clone()
    }

    pub fn feature_state(&self) -> FeatureState {
        FeatureState {
            workflow: CorrectionWorkflow::new(
                self.store.clone(),
                self.orchestrator.clone(),
                self.shutdown.clone(),
            ),
            uploads: UploadState {
                cache: self.cache.clone(),
                datasources: self.datasources.clone(),
                publisher: self.publisher.clone(),
                converters: self.converters.clone(),
                staging_ttl: self.staging_ttl,
            },
        }
    }

    /// Spawn the orchestrator, dispatcher, failure log and cache sweeper.
    pub fn start(self) -> Workers {
        let BusReceivers {
            requests,
            completed,
            failed,
        } = self.receivers;

        let handles = vec![
            (
                "orchestrator",
                self.orchestrator
                    .start(requests, self.concurrency, self.shutdown.clone()),
            ),
            ("dispatcher", self.dispatcher.start(completed, self.shutdown.clone())),
            ("failure-log", log_failures(failed, self.shutdown.clone())),
            (
                "cache-sweeper",
                self.cache.spawn_sweeper(self.sweep_interval, self.shutdown.clone()),
            ),
        ];

        info!(workers = handles.len(), "Pipeline started");
        Workers { handles }
    }
}

/// Handles of the background consumers.
pub struct Workers {
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Workers {
    /// Wait for every worker to stop.
    pub async fn join(self) {
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(worker = name, error = %e, "Worker terminated abnormally");
            }
        }
        info!("Pipeline stopped");
    }
}

async fn build_store(config: &Config) -> anyhow::Result<SharedStore> {
    match &config.database {
        #[cfg(feature = "postgres")]
        Some(database) => {
            let store = crate::store::PgStore::connect(database)
                .await
                .context("connecting to the invalid-record database")?;
            Ok(Arc::new(store))
        },
        #[cfg(not(feature = "postgres"))]
        Some(_) => {
            warn!("DATABASE_URL is set but the postgres feature is disabled, using the in-memory store");
            Ok(Arc::new(InMemoryStore::new()))
        },
        None => {
            info!("Using the in-memory invalid-record store");
            Ok(Arc::new(InMemoryStore::new()))
        },
    }
}

#[cfg(feature = "kafka")]
fn message_producer(config: &Config) -> Arc<dyn MessageProducer> {
    Arc::new(crate::output::RdKafkaProducer::new(config.output.kafka_brokers.clone()))
}

#[cfg(not(feature = "kafka"))]
fn message_producer(config: &Config) -> Arc<dyn MessageProducer> {
    info!(
        brokers = %config.output.kafka_brokers,
        "kafka feature disabled, topics are served in-process"
    );
    Arc::new(crate::output::InProcessProducer::default())
}

fn log_failures(
    mut failed: mpsc::Receiver<FileProcessingFailedEvent>,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let event = tokio::select! {
                _ = shutdown.cancelled() => break,
                event = failed.recv() => match event {
                    Some(event) => event,
                    None => break,
                },
            };
            warn!(
                correlation_id = %event.correlation_id,
                data_source_id = %event.data_source_id,
                error = %event.error_message,
                "File processing failed"
            );
        }
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::datasource::DataSource;
    use dproc_common::types::ValidationRequestEvent;
    use serde_json::json;

    #[tokio::test]
    async fn test_build_with_defaults_and_shutdown() {
        let pipeline = Pipeline::build(&Config::default()).await.unwrap();
        let shutdown = pipeline.shutdown_token();
        let workers = pipeline.start();

        shutdown.cancel();
        workers.join().await;
    }

    #[tokio::test]
    async fn test_request_flows_through_workers() {
        let pipeline = Pipeline::build(&Config::default()).await.unwrap();
        pipeline
            .datasources()
            .upsert(DataSource::new(
                "orders",
                "Orders",
                json!({"type": "object", "required": ["id"]}),
            ))
            .await;
        let store = pipeline.store();
        let uploads = pipeline.feature_state().uploads;
        let shutdown = pipeline.shutdown_token();
        let workers = pipeline.start();

        uploads
            .publisher
            .publish(crate::bus::PipelineEvent::ValidationRequested(
                ValidationRequestEvent::inline("c-1", "orders", "orders.json", br#"[{"amount": 1}]"#.to_vec()),
            ))
            .await
            .unwrap();

        let mut stats = store.statistics().await.unwrap();
        for _ in 0..100 {
            if stats.total_invalid_records > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
            stats = store.statistics().await.unwrap();
        }
        assert_eq!(stats.total_invalid_records, 1);

        shutdown.cancel();
        workers.join().await;
    }
}
