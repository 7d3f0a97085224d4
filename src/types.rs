//! Core types for the feed.

use crate::error::{FeedError, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::fmt;

/// Opaque, stable identifier of a record in the remote collection.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordId({})", self.0)
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// Milliseconds since Unix epoch.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct Timestamp(pub i64);

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

/// Position of a record in feed order: newest first, ties broken by id
/// ascending.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SortKey {
    pub created_at: Timestamp,
    pub id: RecordId,
}

impl Ord for SortKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }
}

impl PartialOrd for SortKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A record exactly as the remote collection delivers it: a key plus an
/// untyped JSON document.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub id: String,
    pub data: Value,
}

impl RawRecord {
    pub fn new(id: impl Into<String>, data: Value) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    /// Feed position of this document, if it carries a usable sort field.
    pub fn sort_key(&self, sort_field: &str) -> Option<SortKey> {
        let created_at = self.data.get(sort_field).and_then(sort_value)?;
        Some(SortKey {
            created_at,
            id: RecordId::new(self.id.as_str()),
        })
    }
}

/// A validated listing in the feed.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Unique identifier (assigned by the remote collection).
    pub id: RecordId,

    /// Creation time, the feed's sort field.
    pub created_at: Timestamp,

    /// Every field of the document, sort field included.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Validate a raw document, reading the sort key from `sort_field`.
    ///
    /// The document must be a JSON object with a non-empty key and an
    /// integral sort field; anything else is a `MalformedRecord`.
    pub fn from_raw(raw: RawRecord, sort_field: &str) -> Result<Self> {
        if raw.id.trim().is_empty() {
            return Err(FeedError::MalformedRecord {
                id: raw.id,
                reason: "empty id".to_string(),
            });
        }

        let fields = match raw.data {
            Value::Object(map) => map,
            other => {
                return Err(FeedError::MalformedRecord {
                    id: raw.id,
                    reason: format!("expected object, got {}", json_kind(&other)),
                })
            }
        };

        let created_at = match fields.get(sort_field).and_then(sort_value) {
            Some(ts) => ts,
            None => {
                return Err(FeedError::MalformedRecord {
                    id: raw.id,
                    reason: format!("missing or non-numeric sort field '{}'", sort_field),
                })
            }
        };

        Ok(Self {
            id: RecordId(raw.id),
            created_at,
            fields,
        })
    }

    pub fn sort_key(&self) -> SortKey {
        SortKey {
            created_at: self.created_at,
            id: self.id.clone(),
        }
    }

    /// Compare two records in feed order.
    pub fn feed_cmp(&self, other: &Record) -> Ordering {
        other
            .created_at
            .cmp(&self.created_at)
            .then_with(|| self.id.cmp(&other.id))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// String value of a field, if present and a string.
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name).and_then(Value::as_str)
    }
}

/// Integral sort field value. Whole-number floats are accepted.
pub(crate) fn sort_value(value: &Value) -> Option<Timestamp> {
    if let Some(n) = value.as_i64() {
        return Some(Timestamp(n));
    }
    match value.as_f64() {
        Some(f) if f.is_finite() && f.fract() == 0.0 => Some(Timestamp(f as i64)),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
