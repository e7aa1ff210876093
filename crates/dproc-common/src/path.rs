//! Record path expressions
//!
//! A small dotted/bracket path language for reaching into JSON records:
//! `$.amount`, `customer.address.city`, `items[0].price`, `items[*].price`.
//! The leading `$` is optional.

use serde_json::Value;

use crate::error::{DprocError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
    Wildcard,
}

/// A parsed record path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPath {
    raw: String,
    segments: Vec<Segment>,
}

impl RecordPath {
    pub fn parse(expression: &str) -> Result<Self> {
        let trimmed = expression.trim();
        let body = trimmed
            .strip_prefix("$.")
            .or_else(|| trimmed.strip_prefix('$'))
            .unwrap_or(trimmed);

        if body.is_empty() {
            return Err(DprocError::Parse(format!("empty record path: '{expression}'")));
        }

        let mut segments = Vec::new();
        for part in body.split('.') {
            parse_part(part, expression, &mut segments)?;
        }

        Ok(Self {
            raw: trimmed.to_string(),
            segments,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Every value the path reaches in `record`; empty when nothing matches.
    pub fn select<'a>(&self, record: &'a Value) -> Vec<&'a Value> {
        let mut current = vec![record];
        for segment in &self.segments {
            let mut next = Vec::new();
            for value in current {
                match (segment, value) {
                    (Segment::Key(key), Value::Object(map)) => {
                        if let Some(v) = map.get(key) {
                            next.push(v);
                        }
                    }
                    (Segment::Index(i), Value::Array(items)) => {
                        if let Some(v) = items.get(*i) {
                            next.push(v);
                        }
                    }
                    (Segment::Wildcard, Value::Array(items)) => next.extend(items.iter()),
                    (Segment::Wildcard, Value::Object(map)) => next.extend(map.values()),
                    _ => {}
                }
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }
        current
    }

    /// First value the path reaches, if any.
    pub fn select_first<'a>(&self, record: &'a Value) -> Option<&'a Value> {
        self.select(record).into_iter().next()
    }
}

impl std::str::FromStr for RecordPath {
    type Err = DprocError;

    fn from_str(s: &str) -> Result<Self> {
        RecordPath::parse(s)
    }
}

impl std::fmt::Display for RecordPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_part(part: &str, expression: &str, out: &mut Vec<Segment>) -> Result<()> {
    let bad = || DprocError::Parse(format!("invalid record path: '{expression}'"));

    let (name, mut rest) = match part.find('[') {
        Some(pos) => (&part[..pos], &part[pos..]),
        None => (part, ""),
    };

    if name.is_empty() && rest.is_empty() {
        return Err(bad());
    }
    if name == "*" {
        out.push(Segment::Wildcard);
    } else if !name.is_empty() {
        out.push(Segment::Key(name.to_string()));
    }

    while !rest.is_empty() {
        let inner_end = rest.find(']').ok_or_else(bad)?;
        let inner = rest[1..inner_end].trim();
        let segment = if inner == "*" {
            Segment::Wildcard
        } else {
            Segment::Index(inner.parse().map_err(|_| bad())?)
        };
        out.push(segment);
        rest = &rest[inner_end + 1..];
        if !rest.is_empty() && !rest.starts_with('[') {
            return Err(bad());
        }
    }

    Ok(())
}
