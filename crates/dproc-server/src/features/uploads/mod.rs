//! Producer side of the pipeline: uploads and raw validation requests

pub mod commands;
pub mod routes;
mod state;

pub use commands::{
    EnqueueValidationCommand, EnqueueValidationError, EnqueueValidationResponse,
    UploadFileCommand, UploadFileError, UploadFileResponse,
};
pub use routes::{files_routes, validation_requests_routes};
pub use state::UploadState;
