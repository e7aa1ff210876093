//! In-process store used when no database is configured

use std::collections::HashMap;

use async_trait::async_trait;
use dproc_common::types::{InvalidRecord, ValidationResultSummary};
use tokio::sync::RwLock;

use super::{InvalidRecordStore, Page, RecordFilter, StoreError};

#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<HashMap<String, InvalidRecord>>,
    results: RwLock<HashMap<String, ValidationResultSummary>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InvalidRecordStore for InMemoryStore {
    async fn save_result(&self, summary: ValidationResultSummary) -> Result<(), StoreError> {
        self.results
            .write()
            .await
            .insert(summary.id.clone(), summary);
        Ok(())
    }

    async fn get_result(&self, id: &str) -> Result<Option<ValidationResultSummary>, StoreError> {
        Ok(self.results.read().await.get(id).cloned())
    }

    async fn insert_many(&self, records: Vec<InvalidRecord>) -> Result<(), StoreError> {
        let mut map = self.records.write().await;
        for record in records {
            map.insert(record.id.clone(), record);
        }
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<InvalidRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, record: InvalidRecord) -> Result<(), StoreError> {
        let mut map = self.records.write().await;
        match map.get_mut(&record.id) {
            Some(slot) => {
                *slot = record;
                Ok(())
            },
            None => Err(StoreError::NotFound(record.id)),
        }
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }

    async fn list(
        &self,
        filter: &RecordFilter,
        offset: usize,
        limit: usize,
    ) -> Result<Page<InvalidRecord>, StoreError> {
        let map = self.records.read().await;
        let mut matching: Vec<&InvalidRecord> = map.values().filter(|r| filter.matches(r)).collect();
        matching.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.record_index.cmp(&b.record_index))
                .then_with(|| a.id.cmp(&b.id))
        });

        Ok(Page {
            total: matching.len(),
            items: matching
                .into_iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
        })
    }

    async fn by_validation_result(&self, result_id: &str) -> Result<Vec<InvalidRecord>, StoreError> {
        let map = self.records.read().await;
        let mut records: Vec<InvalidRecord> = map
            .values()
            .filter(|r| r.validation_result_id == result_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| r.record_index);
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use dproc_common::types::ReviewState;
    use serde_json::json;

    fn record(id: &str, result: &str, index: usize, age_secs: i64) -> InvalidRecord {
        InvalidRecord {
            id: id.into(),
            data_source_id: "ds".into(),
            validation_result_id: result.into(),
            correlation_id: "c".into(),
            file_name: "f.json".into(),
            record_index: Some(index),
            original_record: json!({"n": index}),
            errors: Vec::new(),
            review_state: ReviewState::Unreviewed,
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            corrected_by: None,
            corrected_at: None,
            corrected_data: None,
            created_at: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn test_list_is_newest_first_and_paginated() {
        let store = InMemoryStore::new();
        store
            .insert_many(vec![
                record("old", "r1", 0, 30),
                record("mid", "r1", 1, 20),
                record("new", "r2", 0, 10),
            ])
            .await
            .unwrap();

        let page = store.list(&RecordFilter::default(), 0, 2).await.unwrap();
        assert_eq!(page.total, 3);
        let ids: Vec<_> = page.items.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["new", "mid"]);

        let rest = store.list(&RecordFilter::default(), 2, 2).await.unwrap();
        assert_eq!(rest.items.len(), 1);
        assert_eq!(rest.items[0].id, "old");
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.update(record("x", "r", 0, 0)).await.unwrap_err();
        assert!(matches!(err, StoreError::NotFound(id) if id == "x"));
    }

    #[tokio::test]
    async fn test_by_validation_result_in_file_order() {
        let store = InMemoryStore::new();
        store
            .insert_many(vec![record("b", "r1", 1, 0), record("a", "r1", 0, 0), record("c", "r2", 0, 0)])
            .await
            .unwrap();

        let records = store.by_validation_result("r1").await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
    }
}
