//! Per-mapper identity map.

use ormap_core::{Error, Model, Result};
use std::collections::HashMap;

/// Map from id to the one live model carrying it.
///
/// The map remembers the highest id it has ever seen so it can mint ids for
/// memory-only models. Minted ids are only guaranteed not to collide with
/// ids the map already knows about; a persisted row with a higher id that
/// is loaded later can still land on a minted id.
#[derive(Debug, Default)]
pub struct IdentityMap {
    items: HashMap<i64, Model>,
    highest_id: i64,
}

impl IdentityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `model` to its id, replacing any previous binding.
    pub fn add(&mut self, model: &Model) -> Result<()> {
        let id = model
            .id()
            .ok_or_else(|| Error::invalid_argument("only models with a uid can be added"))?;
        self.items.insert(id, model.clone());
        self.highest_id = self.highest_id.max(id);
        Ok(())
    }

    /// The model bound to `id`.
    pub fn get(&self, id: i64) -> Result<Model> {
        if id <= 0 {
            return Err(Error::invalid_argument(format!("uid must be > 0, got {id}")));
        }
        self.items
            .get(&id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no model with uid {id} in the identity map")))
    }

    pub fn contains(&self, id: i64) -> bool {
        self.items.contains_key(&id)
    }

    /// The next id after every id added so far.
    pub fn new_id(&self) -> i64 {
        self.highest_id + 1
    }

    pub fn highest_id(&self) -> i64 {
        self.highest_id
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
