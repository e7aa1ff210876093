//! Data source definitions
//!
//! A data source owns one JSON Schema, its output destinations and the
//! format conventions captured when its files were ingested. The core only
//! reads them; administration happens elsewhere.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use dproc_common::types::OutputConfiguration;
use dproc_common::{DprocError, Result};
use dproc_convert::FormatMetadata;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub id: String,
    pub name: String,
    #[serde(default = "active_by_default")]
    pub is_active: bool,
    #[serde(default)]
    pub json_schema: Value,
    #[serde(default)]
    pub output: OutputConfiguration,
    #[serde(default)]
    pub format_metadata: FormatMetadata,
    /// Record path used for category counts; the process default when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_path: Option<String>,
}

fn active_by_default() -> bool {
    true
}

impl DataSource {
    pub fn new(id: impl Into<String>, name: impl Into<String>, json_schema: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_active: true,
            json_schema,
            output: OutputConfiguration::default(),
            format_metadata: FormatMetadata::default(),
            category_path: None,
        }
    }
}

#[async_trait]
pub trait DataSourceRepository: Send + Sync {
    async fn get(&self, id: &str) -> Option<DataSource>;

    async fn list(&self) -> Vec<DataSource>;

    async fn upsert(&self, data_source: DataSource);

    /// Record the conventions of the latest upload. Returns false for unknown ids.
    async fn update_format_metadata(&self, id: &str, metadata: FormatMetadata) -> bool;
}

#[derive(Debug, Default)]
pub struct InMemoryDataSources {
    sources: RwLock<HashMap<String, DataSource>>,
}

impl InMemoryDataSources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sources(sources: impl IntoIterator<Item = DataSource>) -> Self {
        let map = sources.into_iter().map(|ds| (ds.id.clone(), ds)).collect();
        Self {
            sources: RwLock::new(map),
        }
    }

    /// Load a JSON array of data sources.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let sources: Vec<DataSource> = serde_json::from_str(&text)?;

        let mut seen = std::collections::HashSet::new();
        for source in &sources {
            if !seen.insert(source.id.as_str()) {
                return Err(DprocError::Config(format!(
                    "duplicate data source id '{}' in {}",
                    source.id,
                    path.display()
                )));
            }
        }

        info!(count = sources.len(), path = %path.display(), "Loaded data sources");
        Ok(Self::with_sources(sources))
    }
}

#[async_trait]
impl DataSourceRepository for InMemoryDataSources {
    async fn get(&self, id: &str) -> Option<DataSource> {
        self.sources.read().await.get(id).cloned()
    }

    async fn list(&self) -> Vec<DataSource> {
        let mut sources: Vec<_> = self.sources.read().await.values().cloned().collect();
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        sources
    }

    async fn upsert(&self, data_source: DataSource) {
        self.sources
            .write()
            .await
            .insert(data_source.id.clone(), data_source);
    }

    async fn update_format_metadata(&self, id: &str, metadata: FormatMetadata) -> bool {
        match self.sources.write().await.get_mut(id) {
            Some(source) => {
                source.format_metadata = metadata;
                true
            },
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use dproc_convert::SourceFormat;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{
                "id": "orders",
                "name": "Orders",
                "jsonSchema": {{"type": "object"}},
                "output": {{"destinations": [], "defaultOutputFormat": "csv"}},
                "formatMetadata": {{"OriginalFormat": "csv", "CsvDelimiter": ";"}}
            }}]"#
        )
        .unwrap();

        let repo = InMemoryDataSources::from_file(file.path()).unwrap();
        let orders = repo.get("orders").await.unwrap();
        assert!(orders.is_active);
        assert_eq!(orders.format_metadata.original_format, Some(SourceFormat::Csv));
        assert_eq!(orders.format_metadata.csv_delimiter, ';');
        assert!(repo.get("missing").await.is_none());
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": "a", "name": "A"}}, {{"id": "a", "name": "B"}}]"#).unwrap();
        assert!(InMemoryDataSources::from_file(file.path()).is_err());
    }

    #[tokio::test]
    async fn test_update_format_metadata() {
        let repo = InMemoryDataSources::with_sources([DataSource::new("ds", "DS", Value::Null)]);
        let meta = FormatMetadata::for_format(SourceFormat::Xml).with_xml_root("orders");

        assert!(repo.update_format_metadata("ds", meta.clone()).await);
        assert!(!repo.update_format_metadata("nope", meta.clone()).await);
        assert_eq!(repo.get("ds").await.unwrap().format_metadata, meta);
    }
}
