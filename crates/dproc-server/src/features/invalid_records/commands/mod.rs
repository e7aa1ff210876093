pub mod bulk;
pub mod correct;
pub mod delete;
pub mod reprocess;
pub mod update_status;

pub use bulk::{BulkOperationCommand, BulkOperationError, MAX_BULK_RECORDS};
pub use correct::{CorrectRecordCommand, CorrectRecordError};
pub use delete::{DeleteRecordCommand, DeleteRecordError, DeleteRecordResponse};
pub use reprocess::{ReprocessRecordCommand, ReprocessRecordError};
pub use update_status::{UpdateStatusCommand, UpdateStatusError};
