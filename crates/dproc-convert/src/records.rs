//! Splitting a JSON document into records

use serde_json::{json, Value};

/// Turn a parsed document into the records it carries.
///
/// - a top-level array yields its elements, in order
/// - a top-level object yields the elements of its first array-valued
///   property, or the object itself when it has none
/// - anything else becomes `{"value": <scalar>}`
///
/// Non-object array elements are passed through untouched; the validator
/// reports them as malformed.
pub fn extract_records(document: Value) -> Vec<Value> {
    match document {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            let first_array = map
                .iter()
                .find(|(_, v)| v.is_array())
                .map(|(k, _)| k.clone());
            match first_array.and_then(|key| map.remove(&key)) {
                Some(Value::Array(items)) => items,
                _ => vec![Value::Object(map)],
            }
        }
        scalar => vec![json!({ "value": scalar })],
    }
}

/// Parse JSON text and extract its records.
pub fn parse_records(text: &str) -> crate::Result<Vec<Value>> {
    let document: Value = serde_json::from_str(text.trim_start_matches('\u{feff}'))?;
    Ok(extract_records(document))
}
