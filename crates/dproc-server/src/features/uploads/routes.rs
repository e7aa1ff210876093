//! Upload API routes
//!
//! - `POST /api/v1/files/:data_source_id?fileName=orders.csv` - Raw upload, staged and queued
//! - `POST /api/v1/validation-requests` - Queue a validation request event as-is

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;

use super::{
    commands::{
        EnqueueValidationCommand, EnqueueValidationError, UploadFileCommand, UploadFileError,
    },
    UploadState,
};
use crate::api::response::{ApiResponse, ErrorResponse};

pub fn files_routes() -> Router<UploadState> {
    Router::new().route("/:data_source_id", post(upload_file))
}

pub fn validation_requests_routes() -> Router<UploadState> {
    Router::new().route("/", post(enqueue_validation))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UploadParams {
    file_name: String,
    #[serde(default)]
    delimiter: Option<char>,
}

#[tracing::instrument(skip(state, headers, params, body), fields(data_source_id = %data_source_id))]
async fn upload_file(
    State(state): State<UploadState>,
    Path(data_source_id): Path<String>,
    Query(params): Query<UploadParams>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, UploadApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let command = UploadFileCommand {
        data_source_id,
        file_name: params.file_name,
        content_type,
        delimiter: params.delimiter,
        content: body.to_vec(),
    };

    let response = super::commands::upload::handle(state, command).await?;

    tracing::info!(
        correlation_id = %response.correlation_id,
        records = response.records,
        "File uploaded via API"
    );

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

#[tracing::instrument(skip(state, command))]
async fn enqueue_validation(
    State(state): State<UploadState>,
    Json(command): Json<EnqueueValidationCommand>,
) -> Result<Response, UploadApiError> {
    let response = super::commands::enqueue::handle(state, command).await?;
    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

#[derive(Debug)]
enum UploadApiError {
    Upload(UploadFileError),
    Enqueue(EnqueueValidationError),
}

impl From<UploadFileError> for UploadApiError {
    fn from(err: UploadFileError) -> Self {
        Self::Upload(err)
    }
}

impl From<EnqueueValidationError> for UploadApiError {
    fn from(err: EnqueueValidationError) -> Self {
        Self::Enqueue(err)
    }
}

impl IntoResponse for UploadApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::Upload(e @ UploadFileError::DataSourceNotFound(_)) => {
                (StatusCode::NOT_FOUND, "NOT_FOUND", e.to_string())
            },
            Self::Upload(e @ UploadFileError::DataSourceInactive(_)) => {
                (StatusCode::CONFLICT, "CONFLICT", e.to_string())
            },
            Self::Upload(e @ UploadFileError::Conversion(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "CONVERSION_ERROR", e.to_string())
            },
            Self::Upload(e @ (UploadFileError::Bus(_) | UploadFileError::Cache(_))) => {
                tracing::error!(error = %e, "Upload could not be staged");
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", e.to_string())
            },
            Self::Upload(e @ UploadFileError::Encode(_)) => {
                tracing::error!(error = %e, "Upload could not be encoded");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            },
            Self::Upload(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),

            Self::Enqueue(e @ EnqueueValidationError::Bus(_)) => {
                tracing::error!(error = %e, "Validation request could not be queued");
                (StatusCode::SERVICE_UNAVAILABLE, "UNAVAILABLE", e.to_string())
            },
            Self::Enqueue(e) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", e.to_string()),
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}
