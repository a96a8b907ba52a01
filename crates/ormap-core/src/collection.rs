//! Ordered, identity-deduplicated model collections.

use crate::model::{Model, WeakModel};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Default)]
struct CollectionInner {
    items: Vec<Model>,
    parent: Option<WeakModel>,
    owned_by_parent: bool,
}

/// Shared handle to an ordered list of distinct models.
///
/// A collection may point back at the model that holds it. Adding or
/// removing members then marks that parent dirty. When the collection is
/// owned by its parent, members removed from it are deleted (not merely
/// unlinked) the next time the parent is saved.
#[derive(Clone, Default)]
pub struct Collection {
    inner: Rc<RefCell<CollectionInner>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a collection, dropping repeated models.
    pub fn from_models(models: impl IntoIterator<Item = Model>) -> Self {
        let collection = Self::new();
        {
            let mut inner = collection.inner.borrow_mut();
            for model in models {
                if !inner.items.iter().any(|m| m.ptr_eq(&model)) {
                    inner.items.push(model);
                }
            }
        }
        collection
    }

    /// Whether both handles point at the same collection.
    pub fn ptr_eq(&self, other: &Collection) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Append a model unless it is already a member.
    ///
    /// Returns whether the model was added.
    pub fn add(&self, model: Model) -> bool {
        let added = {
            let mut inner = self.inner.borrow_mut();
            if inner.items.iter().any(|m| m.ptr_eq(&model)) {
                false
            } else {
                inner.items.push(model);
                true
            }
        };
        if added {
            self.touch_parent();
        }
        added
    }

    /// Append every member of `other` that is not already present.
    pub fn append(&self, other: &Collection) {
        for model in other.to_vec() {
            self.add(model);
        }
    }

    /// Remove a model. Returns whether it was a member.
    pub fn remove(&self, model: &Model) -> bool {
        let removed = {
            let mut inner = self.inner.borrow_mut();
            let before = inner.items.len();
            inner.items.retain(|m| !m.ptr_eq(model));
            inner.items.len() != before
        };
        if removed {
            self.touch_parent();
        }
        removed
    }

    pub fn contains(&self, model: &Model) -> bool {
        self.inner.borrow().items.iter().any(|m| m.ptr_eq(model))
    }

    /// Whether a member carries the given id.
    pub fn has_id(&self, id: i64) -> bool {
        self.inner.borrow().items.iter().any(|m| m.id() == Some(id))
    }

    /// Ids of the members that have one, in member order.
    pub fn ids(&self) -> Vec<i64> {
        self.inner.borrow().items.iter().filter_map(Model::id).collect()
    }

    /// Comma-separated member ids, e.g. `"3,1,2"`.
    pub fn ids_string(&self) -> String {
        self.ids()
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    pub fn len(&self) -> usize {
        self.inner.borrow().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.borrow().items.is_empty()
    }

    pub fn first(&self) -> Option<Model> {
        self.inner.borrow().items.first().cloned()
    }

    pub fn get(&self, index: usize) -> Option<Model> {
        self.inner.borrow().items.get(index).cloned()
    }

    /// Snapshot of the members.
    ///
    /// Iterate over this rather than the live collection when the loop body
    /// may add or remove members.
    pub fn to_vec(&self) -> Vec<Model> {
        self.inner.borrow().items.clone()
    }

    /// Attach the model holding this collection.
    pub fn set_parent_model(&self, parent: &Model) {
        self.inner.borrow_mut().parent = Some(parent.downgrade());
    }

    pub fn parent_model(&self) -> Option<Model> {
        self.inner.borrow().parent.as_ref().and_then(WeakModel::upgrade)
    }

    pub fn mark_as_owned_by_parent(&self) {
        self.inner.borrow_mut().owned_by_parent = true;
    }

    pub fn is_owned_by_parent(&self) -> bool {
        self.inner.borrow().owned_by_parent
    }

    fn touch_parent(&self) {
        if let Some(parent) = self.parent_model() {
            parent.mark_as_dirty();
        }
    }
}

impl FromIterator<Model> for Collection {
    fn from_iter<I: IntoIterator<Item = Model>>(iter: I) -> Self {
        Self::from_models(iter)
    }
}

impl fmt::Debug for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Collection")
                .field("len", &inner.items.len())
                .field("ids", &inner.items.iter().map(Model::id).collect::<Vec<_>>())
                .field("owned_by_parent", &inner.owned_by_parent)
                .finish(),
            Err(_) => f.write_str("Collection { <borrowed> }"),
        }
    }
}
