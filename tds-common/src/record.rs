//! Raw trial record as written by the capture front end
//!
//! ```yaml
//! data:
//!   SWEET: [1.2, 7.9]
//!   SOUR: [4.0]
//! duration: 12.5
//! meta:
//!   ASSESSOR: [alice]
//!   PRODUCT: A
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One completed trial: per-attribute assertion timestamps plus duration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    /// Attribute name → timestamps (seconds) at which it was asserted
    /// dominant, in record order
    pub data: IndexMap<String, Vec<f64>>,

    /// Wall-clock trial length, same unit as the timestamps
    pub duration: f64,

    /// Arbitrary metadata; each value is a scalar or a list
    #[serde(default)]
    pub meta: IndexMap<String, Value>,
}

impl TrialRecord {
    /// Record with no metadata
    pub fn new<I, S>(data: I, duration: f64) -> Self
    where
        I: IntoIterator<Item = (S, Vec<f64>)>,
        S: Into<String>,
    {
        Self {
            data: data.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            duration,
            meta: IndexMap::new(),
        }
    }

    /// Builder-style metadata insertion
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }

    /// Total number of timestamps across all attributes
    pub fn event_count(&self) -> usize {
        self.data.values().map(Vec::len).sum()
    }
}
