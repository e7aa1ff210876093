//! Output destination configuration, read-only at dispatch time

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Target format for reconstructed output.
///
/// Unknown names survive deserialization as [`OutputFormat::Other`] so the
/// dispatcher can fall back to JSON instead of rejecting the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OutputFormat {
    #[default]
    Original,
    Json,
    Csv,
    Xml,
    Excel,
    Other(String),
}

impl From<String> for OutputFormat {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "" | "original" => OutputFormat::Original,
            "json" => OutputFormat::Json,
            "csv" => OutputFormat::Csv,
            "xml" => OutputFormat::Xml,
            "excel" | "xlsx" => OutputFormat::Excel,
            _ => OutputFormat::Other(value),
        }
    }
}

impl From<&str> for OutputFormat {
    fn from(value: &str) -> Self {
        OutputFormat::from(value.to_string())
    }
}

impl From<OutputFormat> for String {
    fn from(value: OutputFormat) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Original => f.write_str("original"),
            OutputFormat::Json => f.write_str("json"),
            OutputFormat::Csv => f.write_str("csv"),
            OutputFormat::Xml => f.write_str("xml"),
            OutputFormat::Excel => f.write_str("excel"),
            OutputFormat::Other(name) => f.write_str(name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DestinationType {
    Kafka,
    Folder,
    Sftp,
    Http,
}

impl std::fmt::Display for DestinationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DestinationType::Kafka => "kafka",
            DestinationType::Folder => "folder",
            DestinationType::Sftp => "sftp",
            DestinationType::Http => "http",
        };
        f.write_str(s)
    }
}

/// Output settings persisted with a data source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct OutputConfiguration {
    #[serde(default)]
    pub destinations: Vec<OutputDestination>,
    #[serde(default)]
    pub include_invalid_records: bool,
    #[serde(default)]
    pub default_output_format: OutputFormat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputDestination {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub destination_type: DestinationType,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_format: Option<OutputFormat>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_invalid_records: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kafka_config: Option<KafkaOutputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder_config: Option<FolderOutputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sftp_config: Option<SftpOutputConfig>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_config: Option<HttpOutputConfig>,
}

fn enabled_by_default() -> bool {
    true
}

impl OutputDestination {
    /// Destination override, then the data source default.
    pub fn effective_format(&self, config: &OutputConfiguration) -> OutputFormat {
        self.output_format
            .clone()
            .unwrap_or_else(|| config.default_output_format.clone())
    }

    pub fn effective_include_invalid(&self, config: &OutputConfiguration) -> bool {
        self.include_invalid_records
            .unwrap_or(config.include_invalid_records)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct KafkaOutputConfig {
    /// Overrides the process-wide broker list when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broker_server: Option<String>,
    pub topic: String,
    /// Template with `{filename}`, `{datasource}`, `{timestamp}`, `{date}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_key: Option<String>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sasl_mechanism: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FolderOutputConfig {
    pub path: String,
    /// Template with `{filename}`, `{ext}`, `{date}`, `{timestamp}`, `{datasource}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name_pattern: Option<String>,
    #[serde(default)]
    pub create_subfolders: bool,
    /// Template with `{year}`, `{month}`, `{day}`, `{date}`, `{datasource}`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subfolder_pattern: Option<String>,
    #[serde(default)]
    pub overwrite_existing: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SftpOutputConfig {
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub remote_path: String,
}

fn default_sftp_port() -> u16 {
    22
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct HttpOutputConfig {
    pub url: String,
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}
