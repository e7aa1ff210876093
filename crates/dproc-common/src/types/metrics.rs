//! Business metric definitions

use serde::{Deserialize, Serialize};

use super::events::MetricConfigurationDto;

/// How extracted values of one metric are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    #[serde(alias = "average")]
    Avg,
    Count,
    Min,
    Max,
}

impl std::str::FromStr for Aggregation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sum" => Ok(Aggregation::Sum),
            "avg" | "average" => Ok(Aggregation::Avg),
            "count" => Ok(Aggregation::Count),
            "min" => Ok(Aggregation::Min),
            "max" => Ok(Aggregation::Max),
            other => Err(format!("unknown aggregation: {other}")),
        }
    }
}

impl std::fmt::Display for Aggregation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Aggregation::Sum => "sum",
            Aggregation::Avg => "avg",
            Aggregation::Count => "count",
            Aggregation::Min => "min",
            Aggregation::Max => "max",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum MetricScope {
    #[default]
    #[serde(rename = "global")]
    Global,
    #[serde(rename = "datasource-specific")]
    DataSourceSpecific,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    #[default]
    #[serde(other)]
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Comparison such as `value > 1000`
    pub expression: String,
    #[serde(default)]
    pub severity: AlertSeverity,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

/// A metric computed over the valid records of every run it applies to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricDefinition {
    pub name: String,
    pub field_path: String,
    pub aggregation: Aggregation,
    pub unit: String,
    #[serde(default)]
    pub scope: MetricScope,
    /// Set only for data-source-specific metrics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub alert_rules: Vec<AlertRule>,
}

impl MetricDefinition {
    pub fn new(name: impl Into<String>, field_path: impl Into<String>, aggregation: Aggregation) -> Self {
        Self {
            name: name.into(),
            field_path: field_path.into(),
            aggregation,
            unit: "value".to_string(),
            scope: MetricScope::Global,
            data_source_id: None,
            description: String::new(),
            alert_rules: Vec::new(),
        }
    }

    pub fn applies_to(&self, data_source_id: &str) -> bool {
        match self.scope {
            MetricScope::Global => true,
            MetricScope::DataSourceSpecific => {
                self.data_source_id.as_deref() == Some(data_source_id)
            }
        }
    }
}

/// Maps a Prometheus metric type onto an aggregation and unit.
pub fn prometheus_mapping(prometheus_type: &str) -> (Aggregation, &'static str) {
    match prometheus_type.to_lowercase().as_str() {
        "counter" => (Aggregation::Sum, "count"),
        "gauge" => (Aggregation::Avg, "value"),
        "histogram" => (Aggregation::Sum, "distribution"),
        "summary" => (Aggregation::Avg, "quantile"),
        _ => (Aggregation::Sum, "value"),
    }
}

impl From<MetricConfigurationDto> for MetricDefinition {
    fn from(dto: MetricConfigurationDto) -> Self {
        let (aggregation, unit) = prometheus_mapping(&dto.prometheus_type);
        Self {
            name: dto.name,
            field_path: dto.field_path,
            aggregation,
            unit: unit.to_string(),
            scope: dto.scope,
            data_source_id: dto.data_source_id,
            description: dto.description,
            alert_rules: dto.alert_rules,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregation_parsing() {
        assert_eq!("AVERAGE".parse::<Aggregation>().unwrap(), Aggregation::Avg);
        assert_eq!("max".parse::<Aggregation>().unwrap(), Aggregation::Max);
        assert!("median".parse::<Aggregation>().is_err());
    }

    #[test]
    fn test_prometheus_type_mapping() {
        assert_eq!(prometheus_mapping("counter"), (Aggregation::Sum, "count"));
        assert_eq!(prometheus_mapping("Gauge"), (Aggregation::Avg, "value"));
        assert_eq!(prometheus_mapping("histogram"), (Aggregation::Sum, "distribution"));
        assert_eq!(prometheus_mapping("summary"), (Aggregation::Avg, "quantile"));
        assert_eq!(prometheus_mapping("untyped"), (Aggregation::Sum, "value"));
    }

    #[test]
    fn test_scope_binding() {
        let mut def = MetricDefinition::new("total", "$.amount", Aggregation::Sum);
        assert!(def.applies_to("any"));

        def.scope = MetricScope::DataSourceSpecific;
        def.data_source_id = Some("orders".into());
        assert!(def.applies_to("orders"));
        assert!(!def.applies_to("invoices"));
    }

    #[test]
    fn test_dto_conversion() {
        let dto: MetricConfigurationDto = serde_json::from_str(
            r#"{"name":"revenue","fieldPath":"$.total","prometheusType":"gauge","scope":"datasource-specific","dataSourceId":"orders"}"#,
        )
        .unwrap();
        let def = MetricDefinition::from(dto);
        assert_eq!(def.aggregation, Aggregation::Avg);
        assert_eq!(def.unit, "value");
        assert!(def.applies_to("orders"));
    }

    #[test]
    fn test_unknown_severity_is_info() {
        let rule: AlertRule =
            serde_json::from_str(r#"{"name":"r","expression":"value > 1","severity":"notice"}"#).unwrap();
        assert_eq!(rule.severity, AlertSeverity::Info);
        assert!(rule.enabled);
    }
}
