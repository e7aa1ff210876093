//! Cell typing and rendering shared by the tabular formats

use serde_json::{Number, Value};

/// Type a raw text cell: integer, then float, then boolean, else string.
///
/// Blank cells stay empty strings.
pub fn infer_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(raw.to_string());
    }

    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::from(int);
    }

    if looks_numeric(trimmed) {
        if let Some(number) = trimmed
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .and_then(Number::from_f64)
        {
            return Value::Number(number);
        }
    }

    if trimmed.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if trimmed.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }

    Value::String(raw.to_string())
}

// Rejects words Rust's float parser accepts, such as "inf" and "NaN".
fn looks_numeric(s: &str) -> bool {
    s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
}

/// Render a JSON value as cell text.
///
/// Nested objects and arrays are written as compact JSON.
pub fn render_cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
