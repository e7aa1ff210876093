//! Schema validation engine
//!
//! A data source schema is compiled once per run into a [`CompiledSchema`]
//! tree, then every record of the batch is walked against it.

mod catalog;
mod engine;
mod formats;
mod schema;

pub use catalog::MessageCatalog;
pub use engine::{Partition, RejectedRecord, SchemaValidator};
pub use formats::StringFormat;
pub use schema::{display_value, CompiledSchema, JsonType, SchemaError};
