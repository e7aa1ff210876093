//! Test helpers for dproc server integration tests
//!
//! [`Harness`] wires the in-memory components the same way
//! `Pipeline::build` does, but hands the bus receivers to the test so each
//! stage can be driven and observed directly.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use dproc_common::types::ValidationRequestEvent;
use dproc_convert::ConverterRegistry;
use dproc_server::bus::{BusReceivers, ChannelBus, EventPublisher};
use dproc_server::cache::{InMemoryCache, SharedCache};
use dproc_server::datasource::{DataSource, DataSourceRepository, InMemoryDataSources};
use dproc_server::features::invalid_records::CorrectionWorkflow;
use dproc_server::features::uploads::UploadState;
use dproc_server::features::FeatureState;
use dproc_server::metrics::{MetricDefinitionProvider, MetricsCalculator, StaticDefinitionSource};
use dproc_server::orchestrator::ValidationOrchestrator;
use dproc_server::output::resilience::{CircuitBreakerConfig, CircuitBreakerManager, RetryConfig};
use dproc_server::output::{DeadLetterQueue, FolderOutputHandler, OutputDispatcher, OutputHandler};
use dproc_server::store::{InMemoryStore, SharedStore};
use dproc_server::validation::{MessageCatalog, SchemaValidator};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

pub const STAGING_TTL: Duration = Duration::from_secs(3600);

/// Schema used across the scenarios: `id` string and `amount` number >= 0.
pub fn orders_schema() -> Value {
    json!({
        "type": "object",
        "required": ["id", "amount"],
        "properties": {
            "id": {"type": "string"},
            "amount": {"type": "number", "minimum": 0}
        }
    })
}

pub fn orders_source() -> DataSource {
    DataSource::new("orders", "Orders", orders_schema())
}

/// An orders source writing JSON to `dir`.
pub fn orders_source_with_folder(dir: &Path, overwrite: bool) -> DataSource {
    let mut source = orders_source();
    source.output = serde_json::from_value(json!({
        "defaultOutputFormat": "json",
        "destinations": [{
            "id": "archive",
            "name": "Archive",
            "type": "folder",
            "folderConfig": {
                "path": dir,
                "fileNamePattern": "out.json",
                "overwriteExisting": overwrite
            }
        }]
    }))
    .expect("valid output configuration");
    source
}

pub fn inline_request(correlation_id: &str, file_name: &str, body: Value) -> ValidationRequestEvent {
    ValidationRequestEvent::inline(
        correlation_id,
        "orders",
        file_name,
        serde_json::to_vec(&body).expect("encodable body"),
    )
}

/// Orchestrator over the given components with no metric definitions.
pub fn build_orchestrator(
    cache: SharedCache,
    datasources: Arc<dyn DataSourceRepository>,
    store: SharedStore,
    publisher: Arc<dyn EventPublisher>,
) -> ValidationOrchestrator {
    let definitions = Arc::new(MetricDefinitionProvider::new(
        Arc::new(StaticDefinitionSource::new(Vec::new())),
        Duration::from_secs(1),
        Duration::from_secs(60),
    ));
    ValidationOrchestrator::new(
        cache,
        datasources,
        store,
        publisher,
        SchemaValidator::new(Arc::new(MessageCatalog::english())),
        MetricsCalculator::new("$.category"),
        definitions,
        STAGING_TTL,
    )
}

pub struct Harness {
    pub cache: Arc<InMemoryCache>,
    pub datasources: Arc<InMemoryDataSources>,
    pub store: SharedStore,
    pub publisher: Arc<dyn EventPublisher>,
    pub receivers: BusReceivers,
    pub converters: Arc<ConverterRegistry>,
    pub orchestrator: Arc<ValidationOrchestrator>,
    pub cancel: CancellationToken,
}

impl Harness {
    pub fn new(sources: Vec<DataSource>) -> Self {
        let cache = Arc::new(InMemoryCache::new());
        let datasources = Arc::new(InMemoryDataSources::with_sources(sources));
        let store: SharedStore = Arc::new(InMemoryStore::new());
        let (bus, receivers) = ChannelBus::new(64);
        let publisher: Arc<dyn EventPublisher> = Arc::new(bus);

        let orchestrator = Arc::new(build_orchestrator(
            cache.clone(),
            datasources.clone(),
            store.clone(),
            publisher.clone(),
        ));

        Self {
            cache,
            datasources,
            store,
            publisher,
            receivers,
            converters: Arc::new(ConverterRegistry::with_defaults()),
            orchestrator,
            cancel: CancellationToken::new(),
        }
    }

    pub fn shared_cache(&self) -> SharedCache {
        self.cache.clone()
    }

    pub fn datasource_repository(&self) -> Arc<dyn DataSourceRepository> {
        self.datasources.clone()
    }

    pub fn workflow(&self) -> CorrectionWorkflow {
        CorrectionWorkflow::new(self.store.clone(), self.orchestrator.clone(), self.cancel.clone())
    }

    pub fn feature_state(&self) -> FeatureState {
        FeatureState {
            workflow: self.workflow(),
            uploads: UploadState {
                cache: self.shared_cache(),
                datasources: self.datasource_repository(),
                publisher: self.publisher.clone(),
                converters: self.converters.clone(),
                staging_ttl: STAGING_TTL,
            },
        }
    }

    /// Dispatcher with the folder handler plus `extra` handlers, parking
    /// dead letters under `dead_letter_dir`.
    pub fn dispatcher(
        &self,
        retry: RetryConfig,
        breaker: CircuitBreakerConfig,
        dead_letter_dir: &Path,
        extra: Vec<Arc<dyn OutputHandler>>,
    ) -> OutputDispatcher {
        let mut dispatcher = OutputDispatcher::new(
            self.shared_cache(),
            self.datasource_repository(),
            self.store.clone(),
            self.converters.clone(),
            retry,
            Arc::new(CircuitBreakerManager::new(breaker)),
            DeadLetterQueue::new(dead_letter_dir),
        );
        for handler in extra {
            dispatcher = dispatcher.with_handler(handler);
        }
        dispatcher.with_handler(Arc::new(FolderOutputHandler::new()))
    }
}
