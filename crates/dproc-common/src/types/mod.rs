//! Domain types shared across dproc crates
//!
//! Event payloads use camelCase field names on the wire.

mod bytes;
pub mod events;
pub mod metrics;
pub mod output;
pub mod records;

pub use events::{
    FileProcessingFailedEvent, MetricConfigurationDto, MetricsConfigurationRequest,
    MetricsConfigurationResponse, PayloadSource, ValidationCompletedEvent,
    ValidationRequestEvent, ValidationStatus,
};
pub use metrics::{Aggregation, AlertRule, AlertSeverity, MetricDefinition, MetricScope};
pub use output::{
    DestinationType, FolderOutputConfig, HttpOutputConfig, KafkaOutputConfig,
    OutputConfiguration, OutputDestination, OutputFormat, SftpOutputConfig,
};
pub use records::{InvalidRecord, ReviewState, RuleKind, ValidationError, ValidationResultSummary};
