//! Database rows.

use crate::error::{Error, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Name of the primary key column every mapped table carries.
pub const UID: &str = "uid";

/// A string-keyed map of scalar values.
///
/// Columns are kept sorted so rows compare and print deterministically.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    columns: BTreeMap<String, Value>,
}

impl Row {
    /// Create an empty row.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column assignment.
    #[must_use]
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(column, value);
        self
    }

    /// Parse a row from a JSON object.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        serde_json::from_value(json)
            .map_err(|e| Error::invalid_argument(format!("row must be a flat JSON object: {e}")))
    }

    /// Set a column, returning the previous value.
    pub fn insert(&mut self, column: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.columns.insert(column.into(), value.into())
    }

    /// Get a column value.
    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns.get(column)
    }

    /// Remove a column.
    pub fn remove(&mut self, column: &str) -> Option<Value> {
        self.columns.remove(column)
    }

    /// Whether the column is present (NULL counts as present).
    pub fn contains(&self, column: &str) -> bool {
        self.columns.contains_key(column)
    }

    /// The `uid` column as a positive id, if it holds one.
    pub fn id(&self) -> Option<i64> {
        self.get(UID).map(Value::to_int).filter(|id| *id > 0)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Iterate over `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.columns.iter()
    }
}

impl FromIterator<(String, Value)> for Row {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Row {
    type Item = (String, Value);
    type IntoIter = std::collections::btree_map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_id_requires_positive_uid() {
        assert_eq!(Row::new().with("uid", 3).id(), Some(3));
        assert_eq!(Row::new().with("uid", "8").id(), Some(8));
        assert_eq!(Row::new().with("uid", 0).id(), None);
        assert_eq!(Row::new().with("title", "x").id(), None);
    }

    #[test]
    fn test_from_json_object() {
        let row = Row::from_json(json!({"uid": 1, "title": "Rust", "hidden": false})).unwrap();
        assert_eq!(row.get("title"), Some(&Value::from("Rust")));
        assert_eq!(row.get("hidden"), Some(&Value::Bool(false)));
        assert_eq!(row.len(), 3);
    }

    #[test]
    fn test_from_json_rejects_nested_values() {
        let err = Row::from_json(json!({"uid": 1, "tags": [1, 2]})).unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }
}
