//! Output dispatching
//!
//! - [`handler`]: the `OutputHandler` contract and per-write result types
//! - [`folder`], [`kafka`]: built-in destination handlers
//! - [`resilience`]: retry/backoff and circuit breakers composed around writes
//! - [`dead_letter`]: terminal storage for batches that could not be written
//! - [`dispatcher`]: fan-out of one completed run to all destinations

pub mod dead_letter;
pub mod dispatcher;
pub mod folder;
pub mod handler;
pub mod kafka;
pub mod resilience;
pub mod template;

pub use dead_letter::{DeadLetterEnvelope, DeadLetterQueue};
pub use dispatcher::{DispatchError, DispatchSummary, OutputDispatcher};
pub use folder::FolderOutputHandler;
pub use handler::{OutputAttempt, OutputContent, OutputHandler, WriteError, Written};
pub use kafka::{InProcessProducer, KafkaOutputHandler, MessageProducer, OutboundMessage};
#[cfg(feature = "kafka")]
pub use kafka::RdKafkaProducer;
