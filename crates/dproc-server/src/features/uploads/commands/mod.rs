pub mod enqueue;
pub mod upload;

pub use enqueue::{EnqueueValidationCommand, EnqueueValidationError, EnqueueValidationResponse};
pub use upload::{UploadFileCommand, UploadFileError, UploadFileResponse};
