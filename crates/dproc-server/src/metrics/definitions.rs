//! Metric definition lookup
//!
//! Definitions are requested per data source from a
//! [`MetricDefinitionSource`]. The provider bounds each request with a
//! timeout and memoises answers with a sliding expiration; a slow or failing
//! source yields an empty definition list, never an error.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dproc_common::types::{
    MetricConfigurationDto, MetricDefinition, MetricScope, MetricsConfigurationRequest,
    MetricsConfigurationResponse,
};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum DefinitionSourceError {
    #[error("metric definition source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid metric definitions: {0}")]
    Invalid(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Answers metric configuration requests.
#[async_trait]
pub trait MetricDefinitionSource: Send + Sync {
    async fn fetch(
        &self,
        request: &MetricsConfigurationRequest,
    ) -> Result<MetricsConfigurationResponse, DefinitionSourceError>;
}

/// Definitions held in memory, typically loaded from a JSON file at start-up.
#[derive(Debug, Clone, Default)]
pub struct StaticDefinitionSource {
    metrics: Vec<MetricConfigurationDto>,
}

impl StaticDefinitionSource {
    pub fn new(metrics: Vec<MetricConfigurationDto>) -> Self {
        Self { metrics }
    }

    /// Load a JSON array of metric configurations.
    pub fn from_file(path: &Path) -> Result<Self, DefinitionSourceError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::new(serde_json::from_str(&text)?))
    }
}

#[async_trait]
impl MetricDefinitionSource for StaticDefinitionSource {
    async fn fetch(
        &self,
        _request: &MetricsConfigurationRequest,
    ) -> Result<MetricsConfigurationResponse, DefinitionSourceError> {
        Ok(MetricsConfigurationResponse {
            success: true,
            error_message: None,
            metrics: self.metrics.clone(),
        })
    }
}

#[derive(Debug, Clone)]
struct CachedDefinitions {
    definitions: Arc<Vec<MetricDefinition>>,
    last_access: Instant,
}

pub struct MetricDefinitionProvider {
    source: Arc<dyn MetricDefinitionSource>,
    timeout: Duration,
    ttl: Duration,
    cache: Mutex<HashMap<String, CachedDefinitions>>,
}

impl MetricDefinitionProvider {
    pub fn new(source: Arc<dyn MetricDefinitionSource>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            source,
            timeout,
            ttl,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Active definitions that apply to `data_source_id`, global ones included.
    pub async fn definitions_for(
        &self,
        correlation_id: &str,
        data_source_id: &str,
    ) -> Arc<Vec<MetricDefinition>> {
        {
            let mut cache = self.cache.lock().await;
            if let Some(entry) = cache.get_mut(data_source_id) {
                if entry.last_access.elapsed() <= self.ttl {
                    entry.last_access = Instant::now();
                    return Arc::clone(&entry.definitions);
                }
                cache.remove(data_source_id);
            }
        }

        let request = MetricsConfigurationRequest {
            correlation_id: correlation_id.to_string(),
            data_source_id: data_source_id.to_string(),
            include_global: true,
            only_active: true,
        };

        let response = match tokio::time::timeout(self.timeout, self.source.fetch(&request)).await {
            Ok(Ok(response)) if response.success => response,
            Ok(Ok(response)) => {
                warn!(
                    correlation_id,
                    data_source_id,
                    error = response.error_message.as_deref().unwrap_or("unknown"),
                    "Metric definition source refused the request, continuing without metrics"
                );
                return Arc::new(Vec::new());
            },
            Ok(Err(e)) => {
                warn!(correlation_id, data_source_id, error = %e, "Metric definitions unavailable, continuing without metrics");
                return Arc::new(Vec::new());
            },
            Err(_) => {
                warn!(
                    correlation_id,
                    data_source_id,
                    timeout_secs = self.timeout.as_secs(),
                    "Metric definition request timed out, continuing without metrics"
                );
                return Arc::new(Vec::new());
            },
        };

        let definitions = Arc::new(select_definitions(response.metrics, &request));
        debug!(data_source_id, count = definitions.len(), "Metric definitions loaded");

        self.cache.lock().await.insert(
            data_source_id.to_string(),
            CachedDefinitions {
                definitions: Arc::clone(&definitions),
                last_access: Instant::now(),
            },
        );
        definitions
    }

    /// Drop memoised definitions for one data source.
    pub async fn invalidate(&self, data_source_id: &str) {
        self.cache.lock().await.remove(data_source_id);
    }
}

// Sources may ignore the request flags, so they are applied again here.
fn select_definitions(
    metrics: Vec<MetricConfigurationDto>,
    request: &MetricsConfigurationRequest,
) -> Vec<MetricDefinition> {
    metrics
        .into_iter()
        .filter(|dto| !request.only_active || dto.is_active)
        .filter(|dto| request.include_global || dto.scope != MetricScope::Global)
        .map(MetricDefinition::from)
        .filter(|def| def.applies_to(&request.data_source_id))
        .collect()
}
