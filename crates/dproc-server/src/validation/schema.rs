//! Compiled JSON Schema subset
//!
//! Supported keywords: `type`, `required`, `properties`, `items`, `enum`,
//! `minimum`, `maximum`, `exclusiveMinimum`, `exclusiveMaximum`,
//! `minLength`, `maxLength`, `pattern`, `format`, `minItems`, `maxItems`.
//! Everything else is ignored.

use dproc_common::types::{RuleKind, ValidationError};
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::debug;

use super::catalog::MessageCatalog;
use super::formats::StringFormat;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema at '{path}' must be an object or boolean")]
    NotAnObject { path: String },

    #[error("invalid pattern at '{path}': {source}")]
    Pattern {
        path: String,
        #[source]
        source: regex::Error,
    },

    #[error("unknown type '{name}' at '{path}'")]
    UnknownType { path: String, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(JsonType::Null),
            "boolean" => Some(JsonType::Boolean),
            "integer" => Some(JsonType::Integer),
            "number" => Some(JsonType::Number),
            "string" => Some(JsonType::String),
            "array" => Some(JsonType::Array),
            "object" => Some(JsonType::Object),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            JsonType::Null => "null",
            JsonType::Boolean => "boolean",
            JsonType::Integer => "integer",
            JsonType::Number => "number",
            JsonType::String => "string",
            JsonType::Array => "array",
            JsonType::Object => "object",
        }
    }

    /// Most specific type of `value`; whole numbers are integers.
    pub fn of(value: &Value) -> Self {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(n) if is_integer(n) => JsonType::Integer,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match (self, value) {
            (JsonType::Number, Value::Number(_)) => true,
            (JsonType::Integer, Value::Number(n)) => is_integer(n),
            _ => JsonType::of(value) == self,
        }
    }
}

fn is_integer(n: &serde_json::Number) -> bool {
    n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.is_finite() && f.fract() == 0.0)
}

#[derive(Debug, Clone)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// One node of a compiled schema tree.
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    types: Vec<JsonType>,
    required: Vec<String>,
    properties: Vec<(String, SchemaNode)>,
    items: Option<Box<SchemaNode>>,
    enum_values: Option<Vec<Value>>,
    minimum: Option<f64>,
    maximum: Option<f64>,
    exclusive_minimum: Option<f64>,
    exclusive_maximum: Option<f64>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    pattern: Option<CompiledPattern>,
    format: Option<StringFormat>,
    min_items: Option<usize>,
    max_items: Option<usize>,
}

/// A data source schema ready to validate records.
#[derive(Debug, Clone)]
pub struct CompiledSchema {
    root: SchemaNode,
}

impl CompiledSchema {
    /// Compile a schema document. `null`, `true` and `{}` accept everything.
    pub fn compile(schema: &Value) -> Result<Self, SchemaError> {
        Ok(Self {
            root: compile_node(schema, "$")?,
        })
    }

    /// Every violation in `record`, in schema order. Empty means valid.
    pub fn validate(&self, record: &Value, catalog: &MessageCatalog) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        check(&self.root, record, "", catalog, &mut errors);
        errors
    }
}

fn as_usize(value: Option<&Value>) -> Option<usize> {
    value
        .and_then(Value::as_u64)
        .and_then(|n| usize::try_from(n).ok())
}

fn compile_node(schema: &Value, path: &str) -> Result<SchemaNode, SchemaError> {
    let map = match schema {
        Value::Null | Value::Bool(true) => return Ok(SchemaNode::default()),
        Value::Object(map) => map,
        _ => {
            return Err(SchemaError::NotAnObject {
                path: path.to_string(),
            })
        },
    };

    let mut node = SchemaNode {
        types: compile_types(map.get("type"), path)?,
        required: map
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(|n| n.as_str().map(String::from)).collect())
            .unwrap_or_default(),
        enum_values: map.get("enum").and_then(Value::as_array).cloned(),
        minimum: map.get("minimum").and_then(Value::as_f64),
        maximum: map.get("maximum").and_then(Value::as_f64),
        min_length: as_usize(map.get("minLength")),
        max_length: as_usize(map.get("maxLength")),
        min_items: as_usize(map.get("minItems")),
        max_items: as_usize(map.get("maxItems")),
        ..SchemaNode::default()
    };

    // Draft 4 spells exclusive bounds as booleans next to minimum/maximum.
    match map.get("exclusiveMinimum") {
        Some(Value::Bool(true)) => node.exclusive_minimum = node.minimum.take(),
        Some(v) => node.exclusive_minimum = v.as_f64(),
        None => {},
    }
    match map.get("exclusiveMaximum") {
        Some(Value::Bool(true)) => node.exclusive_maximum = node.maximum.take(),
        Some(v) => node.exclusive_maximum = v.as_f64(),
        None => {},
    }

    if let Some(pattern) = map.get("pattern").and_then(Value::as_str) {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|source| SchemaError::Pattern {
            path: path.to_string(),
            source,
        })?;
        node.pattern = Some(CompiledPattern {
            source: pattern.to_string(),
            regex,
        });
    }

    if let Some(format) = map.get("format").and_then(Value::as_str) {
        node.format = StringFormat::from_name(format);
        if node.format.is_none() {
            debug!(path, format, "Ignoring unsupported string format");
        }
    }

    if let Some(Value::Object(properties)) = map.get("properties") {
        node.properties = compile_properties(properties, path)?;
    }

    if let Some(items) = map.get("items") {
        node.items = Some(Box::new(compile_node(items, &format!("{path}.items"))?));
    }

    Ok(node)
}

fn compile_types(value: Option<&Value>, path: &str) -> Result<Vec<JsonType>, SchemaError> {
    let names: Vec<&str> = match value {
        None => return Ok(Vec::new()),
        Some(Value::String(name)) => vec![name.as_str()],
        Some(Value::Array(names)) => names.iter().filter_map(Value::as_str).collect(),
        Some(_) => return Ok(Vec::new()),
    };
    names
        .into_iter()
        .map(|name| {
            JsonType::from_name(name).ok_or_else(|| SchemaError::UnknownType {
                path: path.to_string(),
                name: name.to_string(),
            })
        })
        .collect()
}

fn compile_properties(
    properties: &Map<String, Value>,
    path: &str,
) -> Result<Vec<(String, SchemaNode)>, SchemaError> {
    properties
        .iter()
        .map(|(name, schema)| {
            compile_node(schema, &format!("{path}.properties.{name}")).map(|n| (name.clone(), n))
        })
        .collect()
}

fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}.{name}")
    }
}

/// Text shown to reviewers: strings raw, everything else as JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

// Numbers compare by value so that `1` matches an enum entry `1.0`.
fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

struct Reporter<'a> {
    catalog: &'a MessageCatalog,
    errors: &'a mut Vec<ValidationError>,
}

impl Reporter<'_> {
    fn push(&mut self, field: &str, rule: RuleKind, expected: Option<String>, actual: Option<String>) {
        let message = self
            .catalog
            .render(rule, field, expected.as_deref(), actual.as_deref());
        self.errors.push(ValidationError {
            field: field.to_string(),
            rule,
            message,
            expected,
            actual,
        });
    }
}

fn check(
    node: &SchemaNode,
    value: &Value,
    path: &str,
    catalog: &MessageCatalog,
    errors: &mut Vec<ValidationError>,
) {
    let mut report = Reporter { catalog, errors };

    if !node.types.is_empty() && !node.types.iter().any(|t| t.accepts(value)) {
        let expected = node
            .types
            .iter()
            .map(|t| t.name())
            .collect::<Vec<_>>()
            .join(" or ");
        report.push(path, RuleKind::Type, Some(expected), Some(JsonType::of(value).name().to_string()));
        // Remaining keywords assume the declared type.
        return;
    }

    if let Some(allowed) = &node.enum_values {
        if !allowed.iter().any(|a| json_equal(a, value)) {
            let expected = Value::Array(allowed.clone()).to_string();
            report.push(path, RuleKind::Enum, Some(expected), Some(display_value(value)));
        }
    }

    match value {
        Value::Number(n) => {
            let Some(x) = n.as_f64() else { return };
            let actual = || Some(display_value(value));
            if let Some(min) = node.minimum.filter(|min| x < *min) {
                report.push(path, RuleKind::Minimum, Some(format_number(min)), actual());
            }
            if let Some(max) = node.maximum.filter(|max| x > *max) {
                report.push(path, RuleKind::Maximum, Some(format_number(max)), actual());
            }
            if let Some(min) = node.exclusive_minimum.filter(|min| x <= *min) {
                report.push(path, RuleKind::ExclusiveMinimum, Some(format_number(min)), actual());
            }
            if let Some(max) = node.exclusive_maximum.filter(|max| x >= *max) {
                report.push(path, RuleKind::ExclusiveMaximum, Some(format_number(max)), actual());
            }
        },
        Value::String(s) => {
            let length = s.chars().count();
            if let Some(min) = node.min_length.filter(|min| length < *min) {
                report.push(path, RuleKind::MinLength, Some(min.to_string()), Some(length.to_string()));
            }
            if let Some(max) = node.max_length.filter(|max| length > *max) {
                report.push(path, RuleKind::MaxLength, Some(max.to_string()), Some(length.to_string()));
            }
            if let Some(pattern) = &node.pattern {
                if !pattern.regex.is_match(s) {
                    report.push(path, RuleKind::Pattern, Some(pattern.source.clone()), Some(s.clone()));
                }
            }
            if let Some(format) = node.format {
                if !format.matches(s) {
                    report.push(path, RuleKind::Format, Some(format.name().to_string()), Some(s.clone()));
                }
            }
        },
        Value::Array(items) => {
            if let Some(min) = node.min_items.filter(|min| items.len() < *min) {
                report.push(path, RuleKind::MinItems, Some(min.to_string()), Some(items.len().to_string()));
            }
            if let Some(max) = node.max_items.filter(|max| items.len() > *max) {
                report.push(path, RuleKind::MaxItems, Some(max.to_string()), Some(items.len().to_string()));
            }
            if let Some(item_schema) = &node.items {
                for (i, item) in items.iter().enumerate() {
                    check(item_schema, item, &format!("{path}[{i}]"), catalog, report.errors);
                }
            }
        },
        Value::Object(map) => {
            for name in &node.required {
                if !map.contains_key(name) {
                    report.push(&join(path, name), RuleKind::Required, None, None);
                }
            }
            for (name, child) in &node.properties {
                if let Some(v) = map.get(name) {
                    check(child, v, &join(path, name), catalog, report.errors);
                }
            }
        },
        Value::Null | Value::Bool(_) => {},
    }
}
