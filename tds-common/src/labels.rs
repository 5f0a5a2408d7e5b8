//! Attribute label registry
//!
//! A [`Labels`] value maps an ordered attribute vocabulary to row indices of a
//! dominance matrix. Registries are interned: asking twice for the same
//! ordered tuple of names returns the same `Arc`, so curves built from the
//! same vocabulary can be checked for compatibility with a pointer compare
//! before falling back to comparing names.
//!
//! Order matters. `["SWEET", "SOUR"]` and `["SOUR", "SWEET"]` are different
//! registries because row 0 means a different attribute in each.

use crate::{Error, Result};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Process-wide interning cache, keyed by the ordered name tuple.
///
/// Entries are never evicted.
static REGISTRY: Lazy<Mutex<HashMap<Vec<String>, Arc<Labels>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

/// Ordered, immutable attribute vocabulary
#[derive(Debug)]
pub struct Labels {
    keys: Vec<String>,
    index: HashMap<String, usize>,
}

impl Labels {
    /// Get the canonical registry for this exact ordered sequence of names
    ///
    /// Creates and caches the registry on first use. Lookup and insertion
    /// happen under one lock, so concurrent callers asking for the same tuple
    /// always receive the same instance.
    ///
    /// # Errors
    /// [`Error::DuplicateLabel`] if a name appears more than once.
    pub fn get<I, S>(names: I) -> Result<Arc<Labels>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<String> = names.into_iter().map(Into::into).collect();

        let mut registry = REGISTRY.lock();
        if let Some(existing) = registry.get(&keys) {
            return Ok(Arc::clone(existing));
        }

        let labels = Arc::new(Labels::build(keys.clone())?);
        registry.insert(keys, Arc::clone(&labels));
        Ok(labels)
    }

    fn build(keys: Vec<String>) -> Result<Self> {
        let mut index = HashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            if index.insert(key.clone(), i).is_some() {
                return Err(Error::DuplicateLabel(key.clone()));
            }
        }
        Ok(Self { keys, index })
    }

    /// Row index of an attribute name
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    /// Attribute name stored at a row index
    pub fn name_at(&self, index: usize) -> Option<&str> {
        self.keys.get(index).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Names in stored order
    pub fn names(&self) -> &[String] {
        &self.keys
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }
}

impl PartialEq for Labels {
    fn eq(&self, other: &Self) -> bool {
        self.keys == other.keys
    }
}

impl Eq for Labels {}

impl Hash for Labels {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.keys.hash(state);
    }
}

impl fmt::Display for Labels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, key) in self.keys.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "'{}': {}", key, i)?;
        }
        write!(f, "}}")
    }
}
