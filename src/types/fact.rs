use std::collections::HashMap;
use std::fmt;

use super::Value;

/// A single observed data point.
///
/// The `id` names the fact's subject and stays stable across repeated
/// observations of it. Facts are immutable once handed to the engine, which
/// shares them read-only between every rule task that evaluates them.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Fact {
    id: String,
    timestamp: Option<i64>,
    values: HashMap<String, Value>,
}

impl Fact {
    /// Create a fact with no values and no timestamp.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            timestamp: None,
            values: HashMap::new(),
        }
    }

    /// Set a named value.
    #[must_use]
    pub fn set(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value.into());
        self
    }

    /// Set the observation timestamp, in milliseconds since the Unix epoch.
    #[must_use]
    pub fn with_timestamp(mut self, timestamp_ms: i64) -> Self {
        self.timestamp = Some(timestamp_ms);
        self
    }

    /// Insert a named value (mutable reference version).
    pub fn insert(&mut self, name: &str, value: Value) {
        self.values.insert(name.to_owned(), value);
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn timestamp(&self) -> Option<i64> {
        self.timestamp
    }

    /// Look up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// All values, keyed by name. Iteration order is unspecified.
    #[must_use]
    pub fn values(&self) -> &HashMap<String, Value> {
        &self.values
    }

    /// The only value of a single-valued fact.
    ///
    /// Returns `None` when the fact carries zero or several values, since the
    /// map has no meaningful "first" entry.
    #[must_use]
    pub fn single_value(&self) -> Option<&Value> {
        if self.values.len() == 1 {
            self.values.values().next()
        } else {
            None
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fact({}, {} values)", self.id, self.values.len())
    }
}
