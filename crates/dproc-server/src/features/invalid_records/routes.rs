//! Invalid record API routes
//!
//! # Route Structure
//!
//! - `GET /api/v1/invalid-records` - List records with pagination and filters
//! - `GET /api/v1/invalid-records/statistics` - Totals by state, data source and rule
//! - `GET /api/v1/invalid-records/:id` - Get a single record
//! - `PUT /api/v1/invalid-records/:id/correct` - Correct a record, optionally reprocessing it
//! - `POST /api/v1/invalid-records/:id/reprocess` - Validate a record again
//! - `PUT /api/v1/invalid-records/:id/status` - Mark a record reviewed or ignored
//! - `DELETE /api/v1/invalid-records/:id` - Delete a record
//! - `POST /api/v1/invalid-records/bulk/:action` - Bulk reprocess, ignore or delete

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde_json::json;

use super::{
    commands::{
        BulkOperationCommand, BulkOperationError, CorrectRecordCommand, CorrectRecordError,
        DeleteRecordCommand, DeleteRecordError, ReprocessRecordCommand, ReprocessRecordError,
        UpdateStatusCommand, UpdateStatusError,
    },
    queries::{
        GetInvalidRecordError, GetInvalidRecordQuery, ListInvalidRecordsError,
        ListInvalidRecordsQuery, StatisticsError, StatisticsQuery,
    },
    workflow::{BulkAction, CorrectionWorkflow},
};
use crate::api::response::{ApiResponse, ErrorResponse};

// ============================================================================
// Router Configuration
// ============================================================================

pub fn invalid_records_routes() -> Router<CorrectionWorkflow> {
    Router::new()
        .route("/", get(list_records))
        .route("/statistics", get(statistics))
        .route("/bulk/:action", post(bulk_operation))
        .route("/:id", get(get_record).delete(delete_record))
        .route("/:id/correct", put(correct_record))
        .route("/:id/reprocess", post(reprocess_record))
        .route("/:id/status", put(update_status))
}

// ============================================================================
// Command Handlers (Write Operations)
// ============================================================================

/// `PUT /api/v1/invalid-records/:id/correct`
///
/// ```json
/// { "correctedData": { "amount": 50 }, "correctedBy": "dana", "autoReprocess": true }
/// ```
#[tracing::instrument(skip(workflow, command), fields(record_id = %id))]
async fn correct_record(
    State(workflow): State<CorrectionWorkflow>,
    Path(id): Path<String>,
    Json(mut command): Json<CorrectRecordCommand>,
) -> Result<Response, InvalidRecordApiError> {
    command.record_id = id;

    let result = super::commands::correct::handle(workflow, command).await?;

    tracing::info!(
        reprocessed = result.outcome.is_some(),
        "Invalid record corrected via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(result))).into_response())
}

/// `POST /api/v1/invalid-records/:id/reprocess`
#[tracing::instrument(skip(workflow), fields(record_id = %id))]
async fn reprocess_record(
    State(workflow): State<CorrectionWorkflow>,
    Path(id): Path<String>,
) -> Result<Response, InvalidRecordApiError> {
    let command = ReprocessRecordCommand { record_id: id };

    let result = super::commands::reprocess::handle(workflow, command).await?;

    tracing::info!(is_valid = result.is_valid, "Invalid record reprocessed via API");

    Ok((StatusCode::OK, Json(ApiResponse::success(result))).into_response())
}

/// `PUT /api/v1/invalid-records/:id/status`
#[tracing::instrument(skip(workflow, command), fields(record_id = %id))]
async fn update_status(
    State(workflow): State<CorrectionWorkflow>,
    Path(id): Path<String>,
    Json(mut command): Json<UpdateStatusCommand>,
) -> Result<Response, InvalidRecordApiError> {
    command.record_id = id;

    let record = super::commands::update_status::handle(workflow, command).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(record))).into_response())
}

/// `DELETE /api/v1/invalid-records/:id`
#[tracing::instrument(skip(workflow), fields(record_id = %id))]
async fn delete_record(
    State(workflow): State<CorrectionWorkflow>,
    Path(id): Path<String>,
) -> Result<Response, InvalidRecordApiError> {
    let command = DeleteRecordCommand { record_id: id };

    let response = super::commands::delete::handle(workflow, command).await?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// `POST /api/v1/invalid-records/bulk/:action`
///
/// ```json
/// { "recordIds": ["a1", "b2"], "requestedBy": "dana" }
/// ```
///
/// Always `200 OK` once the request is valid; per-record failures are in the body.
#[tracing::instrument(skip(workflow, command), fields(action = %action))]
async fn bulk_operation(
    State(workflow): State<CorrectionWorkflow>,
    Path(action): Path<String>,
    Json(mut command): Json<BulkOperationCommand>,
) -> Result<Response, InvalidRecordApiError> {
    command.action = parse_action(&action)?;

    let result = super::commands::bulk::handle(workflow, command).await?;

    tracing::info!(
        successful = result.successful,
        failed = result.failed,
        "Bulk operation completed via API"
    );

    Ok((StatusCode::OK, Json(ApiResponse::success(result))).into_response())
}

fn parse_action(action: &str) -> Result<BulkAction, InvalidRecordApiError> {
    match action {
        "reprocess" => Ok(BulkAction::Reprocess),
        "ignore" => Ok(BulkAction::Ignore),
        "delete" => Ok(BulkAction::Delete),
        other => Err(InvalidRecordApiError::UnknownAction(other.to_string())),
    }
}

// ============================================================================
// Query Handlers (Read Operations)
// ============================================================================

/// `GET /api/v1/invalid-records?page=1&perPage=25&dataSourceId=orders&reviewState=unreviewed`
#[tracing::instrument(skip(workflow, query))]
async fn list_records(
    State(workflow): State<CorrectionWorkflow>,
    Query(query): Query<ListInvalidRecordsQuery>,
) -> Result<Response, InvalidRecordApiError> {
    let response = super::queries::list::handle(workflow.store().clone(), query).await?;

    tracing::debug!(
        count = response.items.len(),
        total = response.pagination.total,
        "Invalid records listed via API"
    );

    let meta = json!({ "pagination": response.pagination });
    Ok(
        (StatusCode::OK, Json(ApiResponse::success_with_meta(response.items, meta)))
            .into_response(),
    )
}

/// `GET /api/v1/invalid-records/:id`
#[tracing::instrument(skip(workflow), fields(record_id = %id))]
async fn get_record(
    State(workflow): State<CorrectionWorkflow>,
    Path(id): Path<String>,
) -> Result<Response, InvalidRecordApiError> {
    let query = GetInvalidRecordQuery { record_id: id };
    let record = super::queries::get::handle(workflow.store().clone(), query).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(record))).into_response())
}

/// `GET /api/v1/invalid-records/statistics`
#[tracing::instrument(skip(workflow))]
async fn statistics(
    State(workflow): State<CorrectionWorkflow>,
) -> Result<Response, InvalidRecordApiError> {
    let stats = super::queries::statistics::handle(workflow.store().clone(), StatisticsQuery).await?;
    Ok((StatusCode::OK, Json(ApiResponse::success(stats))).into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
enum InvalidRecordApiError {
    UnknownAction(String),
    Correct(CorrectRecordError),
    Reprocess(ReprocessRecordError),
    UpdateStatus(UpdateStatusError),
    Delete(DeleteRecordError),
    Bulk(BulkOperationError),
    Get(GetInvalidRecordError),
    List(ListInvalidRecordsError),
    Statistics(StatisticsError),
}

impl From<CorrectRecordError> for InvalidRecordApiError {
    fn from(err: CorrectRecordError) -> Self {
        Self::Correct(err)
    }
}

impl From<ReprocessRecordError> for InvalidRecordApiError {
    fn from(err: ReprocessRecordError) -> Self {
        Self::Reprocess(err)
    }
}

impl From<UpdateStatusError> for InvalidRecordApiError {
    fn from(err: UpdateStatusError) -> Self {
        Self::UpdateStatus(err)
    }
}

impl From<DeleteRecordError> for InvalidRecordApiError {
    fn from(err: DeleteRecordError) -> Self {
        Self::Delete(err)
    }
}

impl From<BulkOperationError> for InvalidRecordApiError {
    fn from(err: BulkOperationError) -> Self {
        Self::Bulk(err)
    }
}

impl From<GetInvalidRecordError> for InvalidRecordApiError {
    fn from(err: GetInvalidRecordError) -> Self {
        Self::Get(err)
    }
}

impl From<ListInvalidRecordsError> for InvalidRecordApiError {
    fn from(err: ListInvalidRecordsError) -> Self {
        Self::List(err)
    }
}

impl From<StatisticsError> for InvalidRecordApiError {
    fn from(err: StatisticsError) -> Self {
        Self::Statistics(err)
    }
}

fn bad_request(message: String) -> (StatusCode, &'static str, String) {
    (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
}

fn not_found(message: String) -> (StatusCode, &'static str, String) {
    (StatusCode::NOT_FOUND, "NOT_FOUND", message)
}

fn internal(message: String) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %message, "Invalid record request failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for InvalidRecordApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::UnknownAction(action) => bad_request(format!(
                "Unknown bulk action '{action}', expected reprocess, ignore or delete"
            )),

            Self::Correct(e @ CorrectRecordError::NotFound(_)) => not_found(e.to_string()),
            Self::Correct(e @ CorrectRecordError::Workflow(_)) => internal(e.to_string()),
            Self::Correct(e) => bad_request(e.to_string()),

            Self::Reprocess(e @ ReprocessRecordError::NotFound(_)) => not_found(e.to_string()),
            Self::Reprocess(e @ ReprocessRecordError::Workflow(_)) => internal(e.to_string()),
            Self::Reprocess(e) => bad_request(e.to_string()),

            Self::UpdateStatus(e @ UpdateStatusError::NotFound(_)) => not_found(e.to_string()),
            Self::UpdateStatus(e @ UpdateStatusError::Workflow(_)) => internal(e.to_string()),
            Self::UpdateStatus(e) => bad_request(e.to_string()),

            Self::Delete(e @ DeleteRecordError::NotFound(_)) => not_found(e.to_string()),
            Self::Delete(e @ DeleteRecordError::Workflow(_)) => internal(e.to_string()),
            Self::Delete(e) => bad_request(e.to_string()),

            Self::Bulk(e) => bad_request(e.to_string()),

            Self::Get(e @ GetInvalidRecordError::NotFound(_)) => not_found(e.to_string()),
            Self::Get(e @ GetInvalidRecordError::Store(_)) => internal(e.to_string()),
            Self::Get(e) => bad_request(e.to_string()),

            Self::List(e @ ListInvalidRecordsError::Store(_)) => internal(e.to_string()),
            Self::List(e) => bad_request(e.to_string()),

            Self::Statistics(e) => internal(e.to_string()),
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
