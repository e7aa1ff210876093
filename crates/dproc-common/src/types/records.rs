//! Invalid records and validation error detail

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::events::ValidationStatus;

/// Machine-readable kind of a violated validation rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    Required,
    Type,
    Enum,
    Minimum,
    Maximum,
    ExclusiveMinimum,
    ExclusiveMaximum,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    MinItems,
    MaxItems,
    MalformedRecord,
}

impl RuleKind {
    pub const ALL: [RuleKind; 14] = [
        RuleKind::Required,
        RuleKind::Type,
        RuleKind::Enum,
        RuleKind::Minimum,
        RuleKind::Maximum,
        RuleKind::ExclusiveMinimum,
        RuleKind::ExclusiveMaximum,
        RuleKind::MinLength,
        RuleKind::MaxLength,
        RuleKind::Pattern,
        RuleKind::Format,
        RuleKind::MinItems,
        RuleKind::MaxItems,
        RuleKind::MalformedRecord,
    ];

    pub fn code(self) -> &'static str {
        match self {
            RuleKind::Required => "required",
            RuleKind::Type => "type",
            RuleKind::Enum => "enum",
            RuleKind::Minimum => "minimum",
            RuleKind::Maximum => "maximum",
            RuleKind::ExclusiveMinimum => "exclusive_minimum",
            RuleKind::ExclusiveMaximum => "exclusive_maximum",
            RuleKind::MinLength => "min_length",
            RuleKind::MaxLength => "max_length",
            RuleKind::Pattern => "pattern",
            RuleKind::Format => "format",
            RuleKind::MinItems => "min_items",
            RuleKind::MaxItems => "max_items",
            RuleKind::MalformedRecord => "malformed_record",
        }
    }
}

impl std::fmt::Display for RuleKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One violated rule on one field of one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    /// Field path such as `amount`, `address.city` or `items[2].price`.
    pub field: String,
    pub rule: RuleKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    #[default]
    Unreviewed,
    Reviewed,
    Ignored,
}

impl std::str::FromStr for ReviewState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unreviewed" | "pending" => Ok(ReviewState::Unreviewed),
            "reviewed" => Ok(ReviewState::Reviewed),
            "ignored" => Ok(ReviewState::Ignored),
            other => Err(format!("unknown review state: {other}")),
        }
    }
}

impl std::fmt::Display for ReviewState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReviewState::Unreviewed => "unreviewed",
            ReviewState::Reviewed => "reviewed",
            ReviewState::Ignored => "ignored",
        };
        f.write_str(s)
    }
}

/// A record that failed validation, kept for human correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidRecord {
    pub id: String,
    pub data_source_id: String,
    pub validation_result_id: String,
    pub correlation_id: String,
    pub file_name: String,
    /// Position of the record inside its file, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_index: Option<usize>,
    pub original_record: Value,
    pub errors: Vec<ValidationError>,
    #[serde(default)]
    pub review_state: ReviewState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected_data: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl InvalidRecord {
    /// Error type used for listings: the rule of the first error.
    pub fn primary_rule(&self) -> Option<RuleKind> {
        self.errors.first().map(|e| e.rule)
    }
}

/// Persisted summary of one validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResultSummary {
    pub id: String,
    pub data_source_id: String,
    pub correlation_id: String,
    pub file_name: String,
    pub total_records: usize,
    pub valid_records: usize,
    pub invalid_records: usize,
    pub status: ValidationStatus,
    pub created_at: DateTime<Utc>,
}
