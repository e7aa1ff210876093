//! Invalid record review, correction and reprocessing

pub mod commands;
pub mod queries;
pub mod routes;
pub mod workflow;

pub use commands::{
    BulkOperationCommand, BulkOperationError, CorrectRecordCommand, CorrectRecordError,
    DeleteRecordCommand, DeleteRecordError, DeleteRecordResponse, ReprocessRecordCommand,
    ReprocessRecordError, UpdateStatusCommand, UpdateStatusError,
};
pub use queries::{
    GetInvalidRecordError, GetInvalidRecordQuery, ListInvalidRecordsError,
    ListInvalidRecordsQuery, ListInvalidRecordsResponse, StatisticsError, StatisticsQuery,
};
pub use routes::invalid_records_routes;
pub use workflow::{
    merge_fields, BulkAction, BulkOperationResult, BulkRecordError, CorrectionResult,
    CorrectionWorkflow, ReprocessResult, WorkflowError,
};
