//! Integration tests for the validation pipeline
//!
//! These tests verify:
//! - Conforming and non-conforming batches are partitioned correctly
//! - Completion and failure events are published
//! - Correction with reprocessing yields a valid outcome
//! - Cancellation stops a run without publishing
//! - Re-running a payload is stable and a staging failure persists nothing

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dproc_common::types::{RuleKind, ValidationRequestEvent, ValidationStatus};
use dproc_server::cache::{load_records, CacheError, CacheMap, InMemoryCache, StagingCache};
use dproc_server::orchestrator::OrchestratorError;
use dproc_server::store::{RecordFilter, StoreError};
use serde_json::json;

mod helpers;

use helpers::{build_orchestrator, inline_request, orders_source, Harness, STAGING_TTL};

/// Staging cache whose `valid-records` map rejects writes.
#[derive(Default)]
struct ValidRecordsDown {
    inner: InMemoryCache,
}

#[async_trait]
impl StagingCache for ValidRecordsDown {
    async fn get(&self, map: CacheMap, key: &str) -> Result<Option<String>, CacheError> {
        self.inner.get(map, key).await
    }

    async fn set(
        &self,
        map: CacheMap,
        key: &str,
        value: String,
        ttl: Option<Duration>,
    ) -> Result<(), CacheError> {
        if map == CacheMap::ValidRecords {
            return Err(CacheError::Unavailable("connection reset".into()));
        }
        self.inner.set(map, key, value, ttl).await
    }

    async fn remove(&self, map: CacheMap, key: &str) -> Result<bool, CacheError> {
        self.inner.remove(map, key).await
    }
}

#[tokio::test]
async fn test_conforming_record_is_valid() {
    let mut harness = Harness::new(vec![orders_source()]);

    let outcome = harness
        .orchestrator
        .handle(
            inline_request("c-1", "orders.json", json!([{"id": "1", "amount": 100}])),
            &harness.cancel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.total_records, 1);
    assert_eq!(outcome.valid_records, 1);
    assert_eq!(outcome.invalid_records, 0);
    assert_eq!(outcome.status, ValidationStatus::Success);

    let event = harness.receivers.completed.recv().await.unwrap();
    assert_eq!(event.correlation_id, "c-1");
    assert_eq!(event.valid_records, 1);

    let staged = load_records(harness.cache.as_ref(), &event.staged_valid_records_key)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(staged, vec![json!({"id": "1", "amount": 100})]);
}

#[tokio::test]
async fn test_negative_amount_is_stored_as_invalid() {
    let mut harness = Harness::new(vec![orders_source()]);

    let outcome = harness
        .orchestrator
        .handle(
            inline_request("c-2", "orders.json", json!([{"id": "1", "amount": -5}])),
            &harness.cancel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.valid_records, 0);
    assert_eq!(outcome.invalid_records, 1);
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].field, "amount");
    assert_eq!(outcome.errors[0].rule, RuleKind::Minimum);
    assert!(outcome.staged_valid_records_key.is_none());

    let record = harness
        .store
        .get(&outcome.invalid_record_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.original_record, json!({"id": "1", "amount": -5}));
    assert_eq!(record.record_index, Some(0));

    let event = harness.receivers.completed.recv().await.unwrap();
    assert_eq!(event.validation_status, ValidationStatus::PartialFailure);
    assert!(event.staged_valid_records_key.is_empty());
}

#[tokio::test]
async fn test_mixed_batch_keeps_input_order() {
    let harness = Harness::new(vec![orders_source()]);

    let outcome = harness
        .orchestrator
        .handle(
            inline_request(
                "c-3",
                "orders.json",
                json!([
                    {"id": "a", "amount": 1},
                    {"id": "b", "amount": -1},
                    {"id": "c", "amount": 3}
                ]),
            ),
            &harness.cancel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.total_records, 3);
    assert_eq!(outcome.total_records, outcome.valid_records + outcome.invalid_records);
    assert_eq!(outcome.status, ValidationStatus::PartialFailure);
    let ids: Vec<_> = outcome.valid.iter().map(|r| r["id"].clone()).collect();
    assert_eq!(ids, vec![json!("a"), json!("c")]);
}

#[tokio::test]
async fn test_staged_content_is_consumed() {
    let harness = Harness::new(vec![orders_source()]);
    let key = CacheMap::FileContent.new_key();
    harness
        .cache
        .set(
            CacheMap::FileContent,
            &key,
            json!([{"id": "1", "amount": 2}]).to_string(),
            Some(STAGING_TTL),
        )
        .await
        .unwrap();

    let outcome = harness
        .orchestrator
        .handle(
            ValidationRequestEvent::staged("c-4", "orders", "orders.csv", key.clone()),
            &harness.cancel,
        )
        .await
        .unwrap();

    assert_eq!(outcome.valid_records, 1);
    assert_eq!(harness.cache.get(CacheMap::FileContent, &key).await.unwrap(), None);
}

#[tokio::test]
async fn test_missing_payload_publishes_failure() {
    let mut harness = Harness::new(vec![orders_source()]);
    let mut request = inline_request("c-5", "orders.json", json!([]));
    request.file_content = None;

    let err = harness
        .orchestrator
        .handle(request, &harness.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::MissingPayload));

    let failure = harness.receivers.failed.recv().await.unwrap();
    assert_eq!(failure.correlation_id, "c-5");
    assert_eq!(failure.data_source_id, "orders");
    assert!(!failure.error_message.is_empty());
    assert!(harness.receivers.completed.try_recv().is_err());
}

#[tokio::test]
async fn test_expired_staging_key_publishes_failure() {
    let mut harness = Harness::new(vec![orders_source()]);

    let err = harness
        .orchestrator
        .handle(
            ValidationRequestEvent::staged("c-6", "orders", "orders.json", "file-content:gone"),
            &harness.cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::StagedContentMissing(_)));
    assert_eq!(harness.receivers.failed.recv().await.unwrap().correlation_id, "c-6");
}

#[tokio::test]
async fn test_unknown_data_source_publishes_failure() {
    let mut harness = Harness::new(Vec::new());

    let err = harness
        .orchestrator
        .handle(
            inline_request("c-7", "orders.json", json!([{"id": "1", "amount": 1}])),
            &harness.cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::DataSourceNotFound(_)));
    assert!(harness.receivers.failed.recv().await.is_some());
}

#[tokio::test]
async fn test_cancelled_run_publishes_nothing() {
    let mut harness = Harness::new(vec![orders_source()]);
    harness.cancel.cancel();

    let err = harness
        .orchestrator
        .handle(
            inline_request("c-8", "orders.json", json!([{"id": "1", "amount": 1}])),
            &harness.cancel,
        )
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Cancelled));
    assert!(harness.receivers.completed.try_recv().is_err());
    assert!(harness.receivers.failed.try_recv().is_err());
    assert_eq!(harness.store.statistics().await.unwrap().total_invalid_records, 0);
}

#[tokio::test]
async fn test_correct_with_reprocess_yields_valid_outcome() {
    let harness = Harness::new(vec![orders_source()]);
    let workflow = harness.workflow();

    let first = harness
        .orchestrator
        .handle(
            inline_request("c-9", "orders.json", json!([{"id": "1", "amount": -5}])),
            &harness.cancel,
        )
        .await
        .unwrap();
    let record_id = first.invalid_record_ids[0].clone();

    let result = workflow
        .correct(&record_id, json!({"amount": 50}), "dana", true)
        .await
        .unwrap();

    let outcome = result.outcome.unwrap();
    assert!(result.success);
    assert_eq!(outcome.valid_records, 1);
    assert_eq!(outcome.invalid_records, 0);
    assert_eq!(outcome.file_name, "orders.json_CORRECTED");
    assert_eq!(outcome.valid, vec![json!({"id": "1", "amount": 50})]);

    // The corrected original is removed once it validates.
    assert_eq!(harness.store.get(&record_id).await.unwrap(), None);
}

#[tokio::test]
async fn test_reprocess_still_invalid_creates_new_record() {
    let harness = Harness::new(vec![orders_source()]);
    let workflow = harness.workflow();

    let first = harness
        .orchestrator
        .handle(
            inline_request("c-10", "orders.json", json!([{"id": "1", "amount": -5}])),
            &harness.cancel,
        )
        .await
        .unwrap();
    let record_id = first.invalid_record_ids[0].clone();

    let result = workflow.reprocess(&record_id).await.unwrap();
    assert!(result.success);
    assert!(!result.is_valid);
    assert_eq!(result.validation_errors.unwrap().len(), 1);

    let page = harness
        .store
        .list(&RecordFilter::default(), 0, 10)
        .await
        .unwrap();
    assert_eq!(page.total, 1);
    assert_ne!(page.items[0].id, record_id);
    assert_eq!(page.items[0].file_name, "orders.json_REPROCESSED");
}

#[tokio::test]
async fn test_correction_without_reprocess_marks_reviewed() {
    let harness = Harness::new(vec![orders_source()]);
    let workflow = harness.workflow();

    let first = harness
        .orchestrator
        .handle(
            inline_request("c-11", "orders.json", json!([{"id": "1", "amount": -5}])),
            &harness.cancel,
        )
        .await
        .unwrap();
    let record_id = first.invalid_record_ids[0].clone();

    let result = workflow
        .correct(&record_id, json!({"amount": 7}), "dana", false)
        .await
        .unwrap();
    assert!(result.outcome.is_none());

    let record = harness.store.get(&record_id).await.unwrap().unwrap();
    assert_eq!(record.corrected_data, Some(json!({"id": "1", "amount": 7})));
    assert_eq!(record.corrected_by.as_deref(), Some("dana"));
    assert_eq!(record.review_state, dproc_common::types::ReviewState::Reviewed);
    assert_eq!(record.original_record, json!({"id": "1", "amount": -5}));
}

#[tokio::test]
async fn test_update_missing_record_is_not_found() {
    let harness = Harness::new(vec![orders_source()]);

    let err = harness
        .store
        .update(dproc_common::types::InvalidRecord {
            id: "missing".into(),
            data_source_id: "orders".into(),
            validation_result_id: "r".into(),
            correlation_id: "c".into(),
            file_name: "f".into(),
            record_index: None,
            original_record: json!({}),
            errors: Vec::new(),
            review_state: Default::default(),
            reviewed_by: None,
            reviewed_at: None,
            review_notes: None,
            corrected_by: None,
            corrected_at: None,
            corrected_data: None,
            created_at: chrono::Utc::now(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_rerunning_valid_payload_gives_same_counts() {
    let mut harness = Harness::new(vec![orders_source()]);
    let body = json!([{"id": "1", "amount": 10}, {"id": "2", "amount": 20}]);

    let first = harness
        .orchestrator
        .handle(inline_request("c-12", "orders.json", body.clone()), &harness.cancel)
        .await
        .unwrap();
    assert_eq!(harness.cache.len().await, 1);

    let second = harness
        .orchestrator
        .handle(inline_request("c-12", "orders.json", body), &harness.cancel)
        .await
        .unwrap();
    assert_eq!(harness.cache.len().await, 2);

    assert_eq!(first.total_records, second.total_records);
    assert_eq!(first.valid_records, second.valid_records);
    assert_eq!(first.invalid_records, second.invalid_records);
    assert_eq!(first.status, second.status);
    assert_eq!(first.valid, second.valid);
    assert_ne!(first.staged_valid_records_key, second.staged_valid_records_key);

    for outcome in [&first, &second] {
        let key = outcome.staged_valid_records_key.as_deref().unwrap();
        let staged = load_records(harness.cache.as_ref(), key).await.unwrap().unwrap();
        assert_eq!(staged.len(), outcome.valid_records);
        assert_eq!(
            harness.receivers.completed.recv().await.unwrap().staged_valid_records_key,
            key
        );
    }
}

#[tokio::test]
async fn test_staging_failure_persists_no_invalid_records() {
    let mut harness = Harness::new(vec![orders_source()]);
    let broken = build_orchestrator(
        Arc::new(ValidRecordsDown::default()),
        harness.datasource_repository(),
        harness.store.clone(),
        harness.publisher.clone(),
    );
    let body = json!([{"id": "1", "amount": 10}, {"id": "2", "amount": -1}]);

    let err = broken
        .handle(inline_request("c-13", "orders.json", body.clone()), &harness.cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::Cache(_)));
    assert_eq!(harness.receivers.failed.recv().await.unwrap().correlation_id, "c-13");
    assert_eq!(harness.store.statistics().await.unwrap().total_invalid_records, 0);

    // Redelivery to a healthy pipeline stores the invalid record once.
    harness
        .orchestrator
        .handle(inline_request("c-13", "orders.json", body), &harness.cancel)
        .await
        .unwrap();
    assert_eq!(harness.store.statistics().await.unwrap().total_invalid_records, 1);
}
