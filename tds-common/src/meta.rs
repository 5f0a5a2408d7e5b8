//! Per-trial metadata
//!
//! Metadata keys are case-insensitive: every key is trimmed and uppercased
//! before it is stored or looked up. Each key holds an ordered list of JSON
//! values, one per contributing trial for merged curves.

use indexmap::IndexMap;
use serde_json::Value;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Normalized key → ordered value list
pub type Metadata = IndexMap<String, Vec<Value>>;

/// Canonical form of a metadata key
pub fn normalize_key(key: &str) -> String {
    key.trim().to_uppercase()
}

/// Convert the `meta` section of a raw record into [`Metadata`]
///
/// A JSON array becomes the value list as-is; any other value becomes a
/// one-element list. Keys that collide after normalization are concatenated
/// in record order.
pub fn from_record_meta(meta: &IndexMap<String, Value>) -> Metadata {
    let mut out = Metadata::new();
    for (key, value) in meta {
        let values = match value {
            Value::Array(items) => items.clone(),
            other => vec![other.clone()],
        };
        out.entry(normalize_key(key)).or_default().extend(values);
    }
    out
}

/// Human-readable rendering of a metadata value (strings without quotes)
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Hashable, totally ordered metadata value used for grouping and sorting
///
/// Values of different JSON kinds order as
/// null < bool < number < string < array < object; arrays and objects
/// compare by their JSON text.
#[derive(Debug, Clone)]
pub struct MetaKey(Value);

impl MetaKey {
    /// Key used for curves that carry no value
    pub fn null() -> Self {
        Self(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    fn rank(&self) -> u8 {
        match self.0 {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
}

impl PartialEq for MetaKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for MetaKey {}

impl PartialOrd for MetaKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for MetaKey {
    fn cmp(&self, other: &Self) -> Ordering {
        match (&self.0, &other.0) {
            (Value::Null, Value::Null) => Ordering::Equal,
            (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
            (Value::Number(a), Value::Number(b)) => {
                let a = a.as_f64().unwrap_or(f64::NAN);
                let b = b.as_f64().unwrap_or(f64::NAN);
                a.total_cmp(&b)
            }
            (Value::String(a), Value::String(b)) => a.cmp(b),
            (a @ Value::Array(_), b @ Value::Array(_))
            | (a @ Value::Object(_), b @ Value::Object(_)) => a.to_string().cmp(&b.to_string()),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl Hash for MetaKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match &self.0 {
            Value::Null => {}
            Value::Bool(b) => b.hash(state),
            Value::Number(n) => n.as_f64().unwrap_or(f64::NAN).to_bits().hash(state),
            Value::String(s) => s.hash(state),
            other => other.to_string().hash(state),
        }
    }
}

impl fmt::Display for MetaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::Null => write!(f, "(none)"),
            other => write!(f, "{}", display_value(other)),
        }
    }
}

impl From<Value> for MetaKey {
    fn from(value: Value) -> Self {
        Self(value)
    }
}

impl From<Option<Value>> for MetaKey {
    fn from(value: Option<Value>) -> Self {
        Self(value.unwrap_or(Value::Null))
    }
}

impl From<&str> for MetaKey {
    fn from(value: &str) -> Self {
        Self(Value::from(value))
    }
}

impl From<String> for MetaKey {
    fn from(value: String) -> Self {
        Self(Value::from(value))
    }
}

impl From<f64> for MetaKey {
    fn from(value: f64) -> Self {
        Self(Value::from(value))
    }
}

impl From<i64> for MetaKey {
    fn from(value: i64) -> Self {
        Self(Value::from(value))
    }
}

impl From<usize> for MetaKey {
    fn from(value: usize) -> Self {
        Self(Value::from(value))
    }
}

impl From<bool> for MetaKey {
    fn from(value: bool) -> Self {
        Self(Value::from(value))
    }
}
