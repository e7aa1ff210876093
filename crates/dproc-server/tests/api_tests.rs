//! Integration tests for the HTTP API
//!
//! These tests verify:
//! - Health and root endpoints respond
//! - Invalid records can be listed, fetched, corrected, reviewed and deleted
//! - Bulk operations report per-record failures
//! - Uploads are staged and queued for validation
//! - Errors use the standard envelope and status codes

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use dproc_common::types::PayloadSource;
use dproc_server::api::create_router;
use dproc_server::cache::{CacheMap, StagingCache};
use dproc_server::config::Config;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt; // for `oneshot`

mod helpers;

use helpers::{inline_request, orders_source, Harness};

fn app(harness: &Harness) -> Router {
    create_router(harness.feature_state(), &Config::default())
}

async fn send(app: Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        },
        None => Body::empty(),
    };

    let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

/// Run one invalid record through the orchestrator and return its id.
async fn seed_invalid(harness: &Harness, correlation_id: &str) -> String {
    let outcome = harness
        .orchestrator
        .handle(
            inline_request(correlation_id, "orders.json", json!([{"id": "1", "amount": -5}])),
            &harness.cancel,
        )
        .await
        .unwrap();
    outcome.invalid_record_ids[0].clone()
}

#[tokio::test]
async fn test_health_and_root() {
    let harness = Harness::new(Vec::new());

    let response = app(&harness)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let (status, body) = send(app(&harness), Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "running");
}

#[tokio::test]
async fn test_list_empty() {
    let harness = Harness::new(Vec::new());

    let (status, body) = send(app(&harness), Method::GET, "/api/v1/invalid-records", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["pagination"]["total"], 0);
}

#[tokio::test]
async fn test_list_filters_and_paginates() {
    let harness = Harness::new(vec![orders_source()]);
    for i in 0..3 {
        seed_invalid(&harness, &format!("c-{i}")).await;
    }

    let (status, body) = send(
        app(&harness),
        Method::GET,
        "/api/v1/invalid-records?page=1&perPage=2&dataSourceId=orders&reviewState=unreviewed",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    assert_eq!(body["meta"]["pagination"]["total"], 3);

    let (_, body) = send(
        app(&harness),
        Method::GET,
        "/api/v1/invalid-records?dataSourceId=elsewhere",
        None,
    )
    .await;
    assert_eq!(body["data"], json!([]));
}

#[tokio::test]
async fn test_list_rejects_bad_page_size() {
    let harness = Harness::new(Vec::new());

    let (status, body) = send(app(&harness), Method::GET, "/api/v1/invalid-records?perPage=500", None).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_missing_record_is_404() {
    let harness = Harness::new(Vec::new());

    let (status, body) = send(app(&harness), Method::GET, "/api/v1/invalid-records/nope", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_correct_with_reprocess_over_http() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;

    let (status, body) = send(app(&harness), Method::GET, &format!("/api/v1/invalid-records/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["originalRecord"]["amount"], -5);

    let (status, body) = send(
        app(&harness),
        Method::PUT,
        &format!("/api/v1/invalid-records/{id}/correct"),
        Some(json!({"correctedData": {"amount": 50}, "correctedBy": "dana", "autoReprocess": true})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["success"], true);
    assert_eq!(body["data"]["outcome"]["validRecords"], 1);

    let (status, _) = send(app(&harness), Method::GET, &format!("/api/v1/invalid-records/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_correct_requires_corrected_by() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;

    let (status, body) = send(
        app(&harness),
        Method::PUT,
        &format!("/api/v1/invalid-records/{id}/correct"),
        Some(json!({"correctedData": {"amount": 50}, "correctedBy": "  "})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_reprocess_reports_remaining_errors() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;

    let (status, body) = send(
        app(&harness),
        Method::POST,
        &format!("/api/v1/invalid-records/{id}/reprocess"),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["isValid"], false);
    assert_eq!(body["data"]["validationErrors"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_status_and_statistics() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;
    seed_invalid(&harness, "c-2").await;

    let (status, body) = send(
        app(&harness),
        Method::PUT,
        &format!("/api/v1/invalid-records/{id}/status"),
        Some(json!({"status": "ignored", "reviewedBy": "dana", "notes": "duplicate"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["reviewState"], "ignored");
    assert_eq!(body["data"]["reviewNotes"], "duplicate");

    let (status, body) = send(app(&harness), Method::GET, "/api/v1/invalid-records/statistics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalInvalidRecords"], 2);
}

#[tokio::test]
async fn test_delete_record() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;
    let uri = format!("/api/v1/invalid-records/{id}");

    let (status, body) = send(app(&harness), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["deleted"], true);

    let (status, _) = send(app(&harness), Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_bulk_ignore_tallies_failures() {
    let harness = Harness::new(vec![orders_source()]);
    let id = seed_invalid(&harness, "c-1").await;

    let (status, body) = send(
        app(&harness),
        Method::POST,
        "/api/v1/invalid-records/bulk/ignore",
        Some(json!({"recordIds": [id, "missing"], "requestedBy": "dana"})),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["totalRequested"], 2);
    assert_eq!(body["data"]["successful"], 1);
    assert_eq!(body["data"]["failed"], 1);
    assert_eq!(body["data"]["errors"][0]["recordId"], "missing");
}

#[tokio::test]
async fn test_bulk_rejects_unknown_action_and_empty_ids() {
    let harness = Harness::new(Vec::new());

    let (status, _) = send(
        app(&harness),
        Method::POST,
        "/api/v1/invalid-records/bulk/archive",
        Some(json!({"recordIds": ["a"]})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        app(&harness),
        Method::POST,
        "/api/v1/invalid-records/bulk/delete",
        Some(json!({"recordIds": []})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_stages_and_queues() {
    let mut harness = Harness::new(vec![orders_source()]);

    let response = app(&harness)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/files/orders?fileName=orders.csv")
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from("id,amount\n1,100\n2,7\n"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["data"]["records"], 2);
    let staging_key = body["data"]["stagingKey"].as_str().unwrap().to_string();

    let staged = harness
        .cache
        .get(CacheMap::FileContent, &staging_key)
        .await
        .unwrap();
    assert!(staged.is_some());

    let request = harness.receivers.requests.recv().await.unwrap();
    assert_eq!(request.data_source_id, "orders");
    assert_eq!(request.file_name, "orders.csv");
    assert!(matches!(request.payload_source(), PayloadSource::Staged(key) if key == staging_key));
}

#[tokio::test]
async fn test_upload_to_unknown_data_source_is_404() {
    let harness = Harness::new(Vec::new());

    let response = app(&harness)
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri("/api/v1/files/missing?fileName=orders.json")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"[{"id":"1"}]"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_enqueue_validation_request() {
    let mut harness = Harness::new(vec![orders_source()]);

    let (status, body) = send(
        app(&harness),
        Method::POST,
        "/api/v1/validation-requests",
        Some(json!({
            "correlationId": "c-42",
            "dataSourceId": "orders",
            "fileName": "orders.json",
            "hazelcastKey": "file-content:abc"
        })),
    )
    .await;

    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["data"]["correlationId"], "c-42");
    assert_eq!(body["data"]["queued"], true);
    assert_eq!(harness.receivers.requests.recv().await.unwrap().correlation_id, "c-42");
}

#[tokio::test]
async fn test_enqueue_without_payload_is_rejected() {
    let harness = Harness::new(vec![orders_source()]);

    let (status, body) = send(
        app(&harness),
        Method::POST,
        "/api/v1/validation-requests",
        Some(json!({"correlationId": "c-1", "dataSourceId": "orders", "fileName": "orders.json"})),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}
