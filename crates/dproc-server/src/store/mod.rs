//! Invalid-record and validation-result storage

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use dproc_common::types::{InvalidRecord, ReviewState, RuleKind, ValidationResultSummary};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::InMemoryStore;
#[cfg(feature = "postgres")]
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid record not found: {0}")]
    NotFound(String),

    #[error("failed to encode stored document: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Listing filter; unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordFilter {
    pub data_source_id: Option<String>,
    pub review_state: Option<ReviewState>,
    /// Rule of the record's first error.
    pub error_type: Option<RuleKind>,
    /// Case-insensitive substring of the file name or original payload.
    pub search: Option<String>,
}

impl RecordFilter {
    pub fn matches(&self, record: &InvalidRecord) -> bool {
        if let Some(ds) = &self.data_source_id {
            if &record.data_source_id != ds {
                return false;
            }
        }
        if let Some(state) = self.review_state {
            if record.review_state != state {
                return false;
            }
        }
        if let Some(rule) = self.error_type {
            if record.primary_rule() != Some(rule) {
                return false;
            }
        }
        if let Some(needle) = self.search.as_deref().map(str::to_lowercase) {
            let in_name = record.file_name.to_lowercase().contains(&needle);
            let in_payload = record.original_record.to_string().to_lowercase().contains(&needle);
            if !in_name && !in_payload {
                return false;
            }
        }
        true
    }
}

/// One page of a listing plus the size of the full result.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Statistics {
    pub total_invalid_records: usize,
    pub unreviewed_records: usize,
    pub reviewed_records: usize,
    pub ignored_records: usize,
    pub by_data_source: BTreeMap<String, usize>,
    pub by_error_type: BTreeMap<String, usize>,
}

impl Statistics {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a InvalidRecord>) -> Self {
        let mut stats = Statistics::default();
        for record in records {
            stats.total_invalid_records += 1;
            match record.review_state {
                ReviewState::Unreviewed => stats.unreviewed_records += 1,
                ReviewState::Reviewed => stats.reviewed_records += 1,
                ReviewState::Ignored => stats.ignored_records += 1,
            }
            *stats
                .by_data_source
                .entry(record.data_source_id.clone())
                .or_default() += 1;
            if let Some(rule) = record.primary_rule() {
                *stats.by_error_type.entry(rule.code().to_string()).or_default() += 1;
            }
        }
        stats
    }
}

#[async_trait]
pub trait InvalidRecordStore: Send + Sync {
    async fn save_result(&self, summary: ValidationResultSummary) -> Result<(), StoreError>;

    async fn get_result(&self, id: &str) -> Result<Option<ValidationResultSummary>, StoreError>;

    async fn insert_many(&self, records: Vec<InvalidRecord>) -> Result<(), StoreError>;

    async fn get(&self, id: &str) -> Result<Option<InvalidRecord>, StoreError>;

    /// Replace a stored record; [`StoreError::NotFound`] when it does not exist.
    async fn update(&self, record: InvalidRecord) -> Result<(), StoreError>;

    /// Returns whether a record was deleted.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Newest first.
    async fn list(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<InvalidRecord>, StoreError>;

    /// Records produced by one validation run, in file order.
    async fn by_validation_result(&self, result_id: &str) -> Result<Vec<InvalidRecord>, StoreError>;

    async fn statistics(&self) -> Result<Statistics, StoreError> {
        let all = self.list(&RecordFilter::default(), 0, usize::MAX).await?;
        Ok(Statistics::from_records(&all.items))
    }
}

pub type SharedStore = Arc<dyn InvalidRecordStore>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dproc_common::types::ValidationError;
    use serde_json::json;

    fn record(ds: &str, rule: RuleKind, state: ReviewState) -> InvalidRecord {
        InvalidRecord {
            id: uuid::Uuid::new_v4().to_string(),
            data_source_id: ds.into(),
            validation_result_id: "r".into(),
            correlation_id: "c".into(),
            file_name: "orders.csv".into(),
            record_index: Some(0),
            original_record: json!({"customer": "Acme"}),
            errors: vec![ValidationError {
                field: "amount".into(),
                rule,
                message: "bad".into(),
                expected: None,
                actual: None,
            }],
            review_state: state,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            corrected_by: None,
            corrected_at: None,
            corrected_data: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_filter_matching() {
        let r = record("orders", RuleKind::Minimum, ReviewState::Unreviewed);

        assert!(RecordFilter::default().matches(&r));
        assert!(RecordFilter {
            data_source_id: Some("orders".into()),
            error_type: Some(RuleKind::Minimum),
            ..Default::default()
        }
        .matches(&r));
        assert!(!RecordFilter {
            review_state: Some(ReviewState::Ignored),
            ..Default::default()
        }
        .matches(&r));
        assert!(RecordFilter {
            search: Some("ACME".into()),
            ..Default::default()
        }
        .matches(&r));
        assert!(!RecordFilter {
            search: Some("globex".into()),
            ..Default::default()
        }
        .matches(&r));
    }

    #[test]
    fn test_statistics_from_records() {
        let records = vec![
            record("orders", RuleKind::Minimum, ReviewState::Unreviewed),
            record("orders", RuleKind::Required, ReviewState::Reviewed),
            record("invoices", RuleKind::Minimum, ReviewState::Ignored),
        ];
        let stats = Statistics::from_records(&records);

        assert_eq!(stats.total_invalid_records, 3);
        assert_eq!(stats.unreviewed_records, 1);
        assert_eq!(stats.reviewed_records, 1);
        assert_eq!(stats.ignored_records, 1);
        assert_eq!(stats.by_data_source["orders"], 2);
        assert_eq!(stats.by_error_type["minimum"], 2);
    }
}
