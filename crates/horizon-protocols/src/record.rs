//! Server dataset rows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Name of the primary key field of a server row.
pub const ID_FIELD: &str = "Id";

/// One row of the server dataset.
///
/// Field names and value shapes are owned by the store; the real-time core
/// passes records through without interpreting them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerRecord(Map<String, Value>);

impl ServerRecord {
    /// Create an empty record.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a field (builder style).
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.0.insert(field.into(), value);
        self
    }

    /// Set a field, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// The row's `Id`, when present and a string.
    pub fn id(&self) -> Option<&str> {
        self.0.get(ID_FIELD).and_then(Value::as_str)
    }

    /// Iterate over `(field, value)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Map<String, Value>> for ServerRecord {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}
