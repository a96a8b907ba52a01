//! Lookup caches for additional single-field keys and one compound key.

use ormap_core::{Error, Model, Result, Row, Value};
use std::collections::{BTreeMap, HashMap};

/// Separator between the parts of a compound key.
const COMPOUND_SEPARATOR: &str = ".";

/// Models indexed by their key values.
///
/// Single-field keys are cached only for non-empty values. The compound key
/// is cached only when every part is present in the row.
#[derive(Debug, Default)]
pub struct KeyCache {
    by_key: HashMap<String, HashMap<String, Model>>,
    compound_parts: Vec<String>,
    by_compound: HashMap<String, Model>,
}

impl KeyCache {
    pub fn new(additional_keys: &[String], compound_parts: &[String]) -> Self {
        Self {
            by_key: additional_keys
                .iter()
                .map(|key| (key.clone(), HashMap::new()))
                .collect(),
            compound_parts: compound_parts.to_vec(),
            by_compound: HashMap::new(),
        }
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    pub fn has_compound_key(&self) -> bool {
        !self.compound_parts.is_empty()
    }

    pub fn compound_parts(&self) -> &[String] {
        &self.compound_parts
    }

    /// Index `model` under every key `row` provides.
    pub fn cache(&mut self, model: &Model, row: &Row) {
        for (key, entries) in &mut self.by_key {
            if let Some(value) = row.get(key).filter(|v| !v.is_empty()) {
                entries.insert(value.to_key_string(), model.clone());
            }
        }

        if self.compound_parts.is_empty() {
            return;
        }
        let parts: Vec<String> = self
            .compound_parts
            .iter()
            .filter_map(|part| row.get(part).filter(|v| !v.is_null()))
            .map(Value::to_key_string)
            .collect();
        if parts.len() == self.compound_parts.len() {
            self.by_compound
                .insert(parts.join(COMPOUND_SEPARATOR), model.clone());
        }
    }

    pub fn get(&self, key: &str, value: &Value) -> Option<Model> {
        self.by_key
            .get(key)
            .and_then(|entries| entries.get(&value.to_key_string()))
            .cloned()
    }

    pub fn get_compound(&self, compound_key: &str) -> Option<Model> {
        self.by_compound.get(compound_key).cloned()
    }

    /// Validate `values` against the declared parts and join them in
    /// declaration order.
    pub fn compound_key(&self, values: &BTreeMap<String, Value>) -> Result<String> {
        if values.is_empty() {
            return Err(Error::invalid_argument("compound key values must not be empty"));
        }
        if !self.has_compound_key() {
            return Err(Error::invalid_argument(
                "this mapper does not declare a compound key",
            ));
        }
        if values.len() != self.compound_parts.len() {
            return Err(Error::invalid_argument(format!(
                "the compound key has {} parts ({}), got {} values",
                self.compound_parts.len(),
                self.compound_parts.join(", "),
                values.len()
            )));
        }
        let mut joined = Vec::with_capacity(self.compound_parts.len());
        for part in &self.compound_parts {
            let value = values.get(part).ok_or_else(|| {
                Error::invalid_argument(format!("compound key part \"{part}\" is missing"))
            })?;
            if value.is_empty() {
                return Err(Error::invalid_argument(format!(
                    "compound key part \"{part}\" must not be empty"
                )));
            }
            joined.push(value.to_key_string());
        }
        Ok(joined.join(COMPOUND_SEPARATOR))
    }
}
