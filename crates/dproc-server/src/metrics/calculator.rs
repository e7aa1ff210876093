use std::collections::BTreeMap;

use dproc_common::types::{Aggregation, MetricDefinition};
use dproc_common::RecordPath;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::alerts::{evaluate_rules, TriggeredAlert};

/// Bucket for records without a category value.
pub const UNSPECIFIED_CATEGORY: &str = "unspecified";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub name: String,
    pub aggregation: Aggregation,
    pub unit: String,
    pub value: f64,
    /// Records that contributed a numeric value.
    pub samples: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    pub values: Vec<MetricValue>,
    pub categories: BTreeMap<String, usize>,
    pub alerts: Vec<TriggeredAlert>,
}

impl MetricsReport {
    pub fn value(&self, name: &str) -> Option<f64> {
        self.values.iter().find(|v| v.name == name).map(|v| v.value)
    }
}

#[derive(Debug, Clone)]
pub struct MetricsCalculator {
    default_category_path: String,
}

impl MetricsCalculator {
    pub fn new(default_category_path: impl Into<String>) -> Self {
        Self {
            default_category_path: default_category_path.into(),
        }
    }

    /// Compute every definition over `records`, then the category table.
    ///
    /// `category_path` overrides the configured default for this run.
    pub fn calculate(
        &self,
        definitions: &[MetricDefinition],
        records: &[Value],
        category_path: Option<&str>,
    ) -> MetricsReport {
        let mut report = MetricsReport::default();

        for definition in definitions {
            let (value, samples) = match RecordPath::parse(&definition.field_path) {
                Ok(path) => aggregate(definition.aggregation, &path, records),
                Err(e) => {
                    warn!(metric = %definition.name, error = %e, "Metric calculation failed, recording 0");
                    (0.0, 0)
                },
            };
            let value = MetricValue {
                name: definition.name.clone(),
                aggregation: definition.aggregation,
                unit: definition.unit.clone(),
                value,
                samples,
            };
            debug!(metric = %value.name, value = value.value, samples = value.samples, "Metric calculated");

            report
                .alerts
                .extend(evaluate_rules(&definition.name, &definition.alert_rules, value.value));
            report.values.push(value);
        }

        let path = category_path.unwrap_or(&self.default_category_path);
        match RecordPath::parse(path) {
            Ok(path) => report.categories = category_counts(&path, records),
            Err(e) => warn!(path, error = %e, "Invalid category path, skipping category counts"),
        }

        report
    }
}

fn aggregate(aggregation: Aggregation, path: &RecordPath, records: &[Value]) -> (f64, usize) {
    let values: Vec<f64> = records
        .iter()
        .flat_map(|record| path.select(record))
        .filter_map(numeric_value)
        .collect();

    let value = match aggregation {
        _ if values.is_empty() => 0.0,
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Avg => values.iter().sum::<f64>() / values.len() as f64,
        Aggregation::Count => values.len() as f64,
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    };
    (value, values.len())
}

/// Numeric reading of a field value.
///
/// Strings are read after dropping everything but digits, `.`, `,` and `-`,
/// with `,` treated as a thousands separator (`"$1,250.00"` is 1250).
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let cleaned: String = s
                .chars()
                .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
                .collect();
            if !s.chars().any(|c| c.is_ascii_digit()) {
                return None;
            }
            cleaned.parse::<f64>().ok().filter(|f| f.is_finite())
        },
        _ => None,
    }
}

fn category_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNSPECIFIED_CATEGORY.to_string(),
        Some(Value::String(s)) if s.trim().is_empty() => UNSPECIFIED_CATEGORY.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn category_counts(path: &RecordPath, records: &[Value]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(category_label(path.select_first(record))).or_insert(0) += 1;
    }
    counts
}
