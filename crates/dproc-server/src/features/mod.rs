//! Feature modules implementing the dproc HTTP API
//!
//! Each feature is a vertical slice following the CQRS (Command Query
//! Responsibility Segregation) pattern, with its own commands, queries and
//! routes.
//!
//! # Features
//!
//! - **invalid_records**: review, correction, reprocessing and bulk operations
//!   on records that failed validation
//! - **uploads**: raw file uploads and validation requests (producer side)
//!
//! # Architecture
//!
//! Each feature module follows the structure:
//! - `commands/` - Write operations
//! - `queries/` - Read operations
//! - `routes.rs` - HTTP route definitions
//!
//! Commands and queries implement `mediator::Request`, one request type and
//! error enum per operation.

pub mod invalid_records;
pub mod uploads;

use axum::Router;

use invalid_records::CorrectionWorkflow;
use uploads::UploadState;

/// Shared state for all feature routes
#[derive(Clone)]
pub struct FeatureState {
    pub workflow: CorrectionWorkflow,
    pub uploads: UploadState,
}

/// Creates the API router with all feature routes mounted
///
/// - `/invalid-records` - Invalid record review and correction
/// - `/files` - Raw uploads
/// - `/validation-requests` - Validation request intake
pub fn router(state: FeatureState) -> Router<()> {
    Router::new()
        .nest(
            "/invalid-records",
            invalid_records::invalid_records_routes().with_state(state.workflow.clone()),
        )
        .nest("/files", uploads::files_routes().with_state(state.uploads.clone()))
        .nest(
            "/validation-requests",
            uploads::validation_requests_routes().with_state(state.uploads),
        )
}
