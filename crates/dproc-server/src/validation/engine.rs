use std::sync::Arc;

use dproc_common::types::{RuleKind, ValidationError};
use serde_json::Value;
use tracing::debug;

use super::catalog::MessageCatalog;
use super::schema::{display_value, CompiledSchema, JsonType, SchemaError};

/// A record that failed at least one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRecord {
    /// Position in the input batch.
    pub index: usize,
    pub record: Value,
    pub errors: Vec<ValidationError>,
}

/// Records of one batch split by validity, both halves in input order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partition {
    pub valid: Vec<Value>,
    pub invalid: Vec<RejectedRecord>,
}

impl Partition {
    pub fn total(&self) -> usize {
        self.valid.len() + self.invalid.len()
    }
}

/// Validates record batches against data source schemas.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    catalog: Arc<MessageCatalog>,
}

impl SchemaValidator {
    pub fn new(catalog: Arc<MessageCatalog>) -> Self {
        Self { catalog }
    }

    pub fn catalog(&self) -> &MessageCatalog {
        &self.catalog
    }

    /// Compile `schema` and partition `records`.
    ///
    /// Only a broken schema fails the call; a bad record never does.
    pub fn validate(&self, schema: &Value, records: Vec<Value>) -> Result<Partition, SchemaError> {
        let compiled = CompiledSchema::compile(schema)?;
        Ok(self.validate_compiled(&compiled, records))
    }

    pub fn validate_compiled(&self, schema: &CompiledSchema, records: Vec<Value>) -> Partition {
        let mut partition = Partition::default();

        for (index, record) in records.into_iter().enumerate() {
            let errors = if record.is_object() {
                schema.validate(&record, &self.catalog)
            } else {
                vec![self.malformed(&record)]
            };

            if errors.is_empty() {
                partition.valid.push(record);
            } else {
                debug!(
                    index,
                    error_count = errors.len(),
                    first_field = %errors[0].field,
                    first_rule = %errors[0].rule.code(),
                    "Record failed validation"
                );
                partition.invalid.push(RejectedRecord {
                    index,
                    record,
                    errors,
                });
            }
        }

        partition
    }

    fn malformed(&self, record: &Value) -> ValidationError {
        let actual = JsonType::of(record).name().to_string();
        ValidationError {
            field: "$".to_string(),
            rule: RuleKind::MalformedRecord,
            message: self
                .catalog
                .render(RuleKind::MalformedRecord, "$", None, Some(&actual)),
            expected: Some("object".to_string()),
            actual: Some(match record {
                Value::String(_) => display_value(record),
                _ => actual,
            }),
        }
    }
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new(Arc::new(MessageCatalog::default()))
    }
}
