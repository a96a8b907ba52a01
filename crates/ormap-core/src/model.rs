//! Identity-tracked domain objects.
//!
//! A [`Model`] is a cheap, shared handle: cloning it clones the handle, not
//! the record. Two handles are the same model iff [`Model::ptr_eq`] holds,
//! which is what identity maps and collections rely on.
//!
//! # Lifecycle
//!
//! ```text
//! Virgin --set_id--> Ghost --load ok--> Loaded --set_to_deleted + save--> Dead
//!    |                  \--load fails--> Dead
//!    \--set / set_data--> Loaded
//! ```
//!
//! Any state can be killed with [`Model::mark_as_dead`]; Dead is terminal.

use crate::collection::Collection;
use crate::error::{Error, Result};
use crate::row::{Row, UID};
use crate::value::Value;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Boolean data field carrying the logical deletion flag.
pub const DELETED: &str = "deleted";

/// Boolean data field carrying the hidden flag.
pub const HIDDEN: &str = "hidden";

/// Field data of a model.
pub type ModelData = BTreeMap<String, FieldValue>;

/// Load status of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ModelState {
    /// Neither an id nor data.
    #[default]
    Virgin,
    /// An id but no data yet.
    Ghost,
    /// Its loader is currently running.
    Loading,
    /// Data present.
    Loaded,
    /// Load failed or the model was deleted. Terminal.
    Dead,
}

/// Deferred-load capability held by ghosts.
///
/// Implementations must leave the model either Loaded (via
/// [`Model::set_data`]) or Dead.
pub trait ModelLoader {
    fn load(&self, model: &Model) -> Result<()>;
}

/// A field value: a scalar, a single related model, or a collection.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Value(Value),
    Model(Option<Model>),
    Collection(Collection),
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Value(Value::Null)
    }
}

impl FieldValue {
    /// The scalar, if this is one.
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            FieldValue::Value(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Value> for FieldValue {
    fn from(v: Value) -> Self {
        FieldValue::Value(v)
    }
}

impl From<Model> for FieldValue {
    fn from(m: Model) -> Self {
        FieldValue::Model(Some(m))
    }
}

impl From<Option<Model>> for FieldValue {
    fn from(m: Option<Model>) -> Self {
        FieldValue::Model(m)
    }
}

impl From<Collection> for FieldValue {
    fn from(c: Collection) -> Self {
        FieldValue::Collection(c)
    }
}

macro_rules! scalar_field_value {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for FieldValue {
                fn from(v: $ty) -> Self {
                    FieldValue::Value(Value::from(v))
                }
            }
        )*
    };
}

scalar_field_value!(bool, i32, i64, u32, f64, &str, String);

/// Convert a row into model data, dropping nothing (the `uid` column is
/// consumed by [`Model::set_data`]).
pub fn data_from_row(row: Row) -> ModelData {
    row.into_iter()
        .map(|(column, value)| (column, FieldValue::Value(value)))
        .collect()
}

struct ModelInner {
    id: Option<i64>,
    state: ModelState,
    dirty: bool,
    read_only: bool,
    data: ModelData,
    loader: Option<Weak<dyn ModelLoader>>,
}

/// Shared handle to one record.
#[derive(Clone)]
pub struct Model {
    inner: Rc<RefCell<ModelInner>>,
}

/// Non-owning model handle, used for collection back-references.
#[derive(Clone)]
pub(crate) struct WeakModel(Weak<RefCell<ModelInner>>);

impl WeakModel {
    pub(crate) fn upgrade(&self) -> Option<Model> {
        self.0.upgrade().map(|inner| Model { inner })
    }
}

impl Default for Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Model {
    /// A virgin model: no id, no data.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(RefCell::new(ModelInner {
                id: None,
                state: ModelState::Virgin,
                dirty: false,
                read_only: false,
                data: ModelData::new(),
                loader: None,
            })),
        }
    }

    /// A ghost with `id` and no loader.
    pub fn ghost(id: i64) -> Result<Self> {
        let model = Self::new();
        model.set_id(id)?;
        Ok(model)
    }

    /// A new model filled with `data`; Loaded and, unless `data` carries a
    /// `uid`, dirty.
    pub fn with_data(data: ModelData) -> Result<Self> {
        let model = Self::new();
        model.set_data(data)?;
        Ok(model)
    }

    /// Whether both handles point at the same model.
    pub fn ptr_eq(&self, other: &Model) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub(crate) fn downgrade(&self) -> WeakModel {
        WeakModel(Rc::downgrade(&self.inner))
    }

    // ------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------

    pub fn id(&self) -> Option<i64> {
        self.inner.borrow().id
    }

    pub fn has_id(&self) -> bool {
        self.id().is_some()
    }

    /// Assign the id. A virgin model becomes a ghost.
    pub fn set_id(&self, id: i64) -> Result<()> {
        if id <= 0 {
            return Err(Error::invalid_argument(format!(
                "uid must be > 0, got {id}"
            )));
        }
        let mut inner = self.inner.borrow_mut();
        if let Some(existing) = inner.id {
            return Err(Error::bad_method_call(format!(
                "the uid of a model cannot be set a second time (has {existing}, got {id})"
            )));
        }
        inner.id = Some(id);
        if inner.state == ModelState::Virgin {
            inner.state = ModelState::Ghost;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn state(&self) -> ModelState {
        self.inner.borrow().state
    }

    pub fn is_virgin(&self) -> bool {
        self.state() == ModelState::Virgin
    }

    pub fn is_ghost(&self) -> bool {
        self.state() == ModelState::Ghost
    }

    pub fn is_loading(&self) -> bool {
        self.state() == ModelState::Loading
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == ModelState::Loaded
    }

    pub fn is_dead(&self) -> bool {
        self.state() == ModelState::Dead
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.borrow().dirty
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.borrow().read_only
    }

    /// Whether the logical deletion flag is set. Never triggers a load.
    pub fn is_deleted(&self) -> bool {
        self.inner
            .borrow()
            .data
            .get(DELETED)
            .and_then(FieldValue::as_value)
            .is_some_and(Value::is_truthy)
    }

    /// Whether the hidden flag is set. Loads a ghost.
    pub fn is_hidden(&self) -> Result<bool> {
        self.get_as_boolean(HIDDEN)
    }

    pub fn mark_as_dead(&self) {
        self.inner.borrow_mut().state = ModelState::Dead;
    }

    pub fn mark_as_clean(&self) {
        self.inner.borrow_mut().dirty = false;
    }

    pub fn mark_as_dirty(&self) {
        self.inner.borrow_mut().dirty = true;
    }

    /// Forbid [`Model::set`] on this model; mappers skip it on save.
    pub fn make_read_only(&self) {
        self.inner.borrow_mut().read_only = true;
    }

    /// Install the deferred loader used on first field access.
    pub fn set_loader(&self, loader: Weak<dyn ModelLoader>) {
        self.inner.borrow_mut().loader = Some(loader);
    }

    pub fn has_loader(&self) -> bool {
        self.inner
            .borrow()
            .loader
            .as_ref()
            .is_some_and(|loader| loader.strong_count() > 0)
    }

    // ------------------------------------------------------------------
    // Bulk data
    // ------------------------------------------------------------------

    /// First fill. Only valid for virgin, ghost and loading models.
    ///
    /// A `uid` entry assigns the id when the model has none and is never
    /// kept as field data. The model ends up Loaded; clean if it has an id,
    /// dirty otherwise.
    pub fn set_data(&self, data: ModelData) -> Result<()> {
        let state = self.state();
        if !matches!(
            state,
            ModelState::Virgin | ModelState::Ghost | ModelState::Loading
        ) {
            return Err(Error::bad_method_call(format!(
                "set_data must only be called on virgin models or ghosts, this model is {state:?}"
            )));
        }
        self.replace_data(data);
        Ok(())
    }

    /// Replace all field data regardless of state.
    pub fn reset_data(&self, data: ModelData) {
        self.replace_data(data);
    }

    fn replace_data(&self, mut data: ModelData) {
        let uid = data.remove(UID).and_then(|value| match value {
            FieldValue::Value(v) => Some(v.to_int()).filter(|id| *id > 0),
            _ => None,
        });
        let mut inner = self.inner.borrow_mut();
        if inner.id.is_none() {
            inner.id = uid;
        }
        inner.data = data;
        inner.state = ModelState::Loaded;
        inner.dirty = inner.id.is_none();
    }

    /// Snapshot of the field data, without triggering a load.
    pub fn export_data(&self) -> ModelData {
        self.inner.borrow().data.clone()
    }

    // ------------------------------------------------------------------
    // Field access
    // ------------------------------------------------------------------

    /// Run the deferred loader if this is a ghost.
    fn load(&self) -> Result<()> {
        let (id, loader) = {
            let inner = self.inner.borrow();
            if inner.state != ModelState::Ghost {
                return Ok(());
            }
            (inner.id, inner.loader.as_ref().and_then(Weak::upgrade))
        };
        let Some(loader) = loader else {
            return Err(Error::bad_method_call(format!(
                "ghost with uid {} has no loader, its data cannot be accessed",
                id.unwrap_or_default()
            )));
        };

        self.inner.borrow_mut().state = ModelState::Loading;
        let result = loader.load(self);
        let mut inner = self.inner.borrow_mut();
        if inner.state == ModelState::Loading {
            inner.state = if result.is_ok() {
                ModelState::Dead
            } else {
                ModelState::Ghost
            };
        }
        result
    }

    fn ensure_alive(&self) -> Result<()> {
        if self.is_dead() {
            return Err(Error::not_found(format!(
                "the model with uid {} has been deleted or has never existed, but is still accessed",
                self.id().unwrap_or_default()
            )));
        }
        Ok(())
    }

    /// Read a field, loading a ghost first.
    ///
    /// Missing fields read as NULL.
    pub fn get(&self, key: &str) -> Result<FieldValue> {
        self.load()?;
        self.ensure_alive()?;
        Ok(self.inner.borrow().data.get(key).cloned().unwrap_or_default())
    }

    fn get_scalar(&self, key: &str, expected: &'static str) -> Result<Value> {
        match self.get(key)? {
            FieldValue::Value(v) => Ok(v),
            FieldValue::Model(_) | FieldValue::Collection(_) => Err(Error::UnexpectedValue {
                field: key.to_string(),
                expected,
            }),
        }
    }

    pub fn get_as_string(&self, key: &str) -> Result<String> {
        Ok(self.get_scalar(key, "string")?.to_key_string())
    }

    pub fn get_as_integer(&self, key: &str) -> Result<i64> {
        Ok(self.get_scalar(key, "integer")?.to_int())
    }

    pub fn get_as_float(&self, key: &str) -> Result<f64> {
        Ok(self.get_scalar(key, "float")?.to_float())
    }

    pub fn get_as_boolean(&self, key: &str) -> Result<bool> {
        Ok(self.get_scalar(key, "boolean")?.is_truthy())
    }

    /// A single related model; NULL reads as `None`.
    pub fn get_as_model(&self, key: &str) -> Result<Option<Model>> {
        match self.get(key)? {
            FieldValue::Model(m) => Ok(m),
            FieldValue::Value(Value::Null) => Ok(None),
            _ => Err(Error::UnexpectedValue {
                field: key.to_string(),
                expected: "model",
            }),
        }
    }

    pub fn get_as_collection(&self, key: &str) -> Result<Collection> {
        match self.get(key)? {
            FieldValue::Collection(c) => Ok(c),
            _ => Err(Error::UnexpectedValue {
                field: key.to_string(),
                expected: "collection",
            }),
        }
    }

    pub fn has_string(&self, key: &str) -> Result<bool> {
        Ok(!self.get_as_string(key)?.is_empty())
    }

    pub fn has_integer(&self, key: &str) -> Result<bool> {
        Ok(self.get_as_integer(key)? != 0)
    }

    /// Write a field and mark the model dirty.
    ///
    /// `uid` and `deleted` are reserved: use [`Model::set_id`] and
    /// [`Model::set_to_deleted`].
    pub fn set(&self, key: &str, value: impl Into<FieldValue>) -> Result<()> {
        if key == UID || key == DELETED {
            return Err(Error::invalid_argument(format!(
                "\"{key}\" must not be set directly"
            )));
        }
        if self.is_read_only() {
            return Err(Error::bad_method_call(format!(
                "cannot set \"{key}\" on a read-only model"
            )));
        }
        self.load()?;
        self.ensure_alive()?;
        self.write(key, value.into());
        Ok(())
    }

    fn write(&self, key: &str, value: FieldValue) {
        let mut inner = self.inner.borrow_mut();
        if inner.state == ModelState::Virgin {
            inner.state = ModelState::Loaded;
        }
        inner.data.insert(key.to_string(), value);
        inner.dirty = true;
    }

    /// Stamp the creation time. Only valid before the model has an id.
    pub fn set_creation_date(&self, column: &str, now: i64) -> Result<()> {
        if self.has_id() {
            return Err(Error::bad_method_call(
                "the creation date may only be set for models without a uid",
            ));
        }
        self.write(column, FieldValue::Value(Value::Int(now)));
        Ok(())
    }

    /// Stamp the modification time.
    pub fn set_timestamp(&self, column: &str, now: i64) {
        self.write(column, FieldValue::Value(Value::Int(now)));
    }

    /// Set the logical deletion flag and mark the model dirty.
    pub fn set_to_deleted(&self) -> Result<()> {
        self.load()?;
        self.ensure_alive()?;
        self.write(DELETED, FieldValue::Value(Value::Bool(true)));
        Ok(())
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Model {}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(inner) => f
                .debug_struct("Model")
                .field("id", &inner.id)
                .field("state", &inner.state)
                .field("dirty", &inner.dirty)
                .field("read_only", &inner.read_only)
                .finish_non_exhaustive(),
            Err(_) => f.write_str("Model { <borrowed> }"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    struct FixedLoader {
        title: &'static str,
        calls: Cell<usize>,
    }

    impl ModelLoader for FixedLoader {
        fn load(&self, model: &Model) -> Result<()> {
            self.calls.set(self.calls.get() + 1);
            let mut data = ModelData::new();
            data.insert("title".to_string(), self.title.into());
            model.set_data(data)
        }
    }

    struct MissingLoader;

    impl ModelLoader for MissingLoader {
        fn load(&self, model: &Model) -> Result<()> {
            model.mark_as_dead();
            Ok(())
        }
    }

    fn ghost(id: i64) -> Model {
        Model::ghost(id).unwrap()
    }

    #[test]
    fn test_set_id_turns_virgin_into_ghost() {
        let model = Model::new();
        assert!(model.is_virgin());
        model.set_id(5).unwrap();
        assert!(model.is_ghost());
        assert_eq!(model.id(), Some(5));
    }

    #[test]
    fn test_set_id_twice_is_rejected() {
        let model = ghost(5);
        assert!(matches!(model.set_id(6), Err(Error::BadMethodCall(_))));
        assert!(matches!(Model::new().set_id(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn test_ghost_without_loader_rejects_access() {
        let model = ghost(1);
        assert!(matches!(model.get("title"), Err(Error::BadMethodCall(_))));
        assert!(model.is_ghost());
    }

    #[test]
    fn test_first_access_runs_loader_once() {
        let loader: Rc<FixedLoader> = Rc::new(FixedLoader {
            title: "loaded",
            calls: Cell::new(0),
        });
        let model = ghost(1);
        let weak: Weak<FixedLoader> = Rc::downgrade(&loader);
        model.set_loader(weak);

        assert_eq!(model.get_as_string("title").unwrap(), "loaded");
        assert_eq!(model.get_as_string("title").unwrap(), "loaded");
        assert_eq!(loader.calls.get(), 1);
        assert!(model.is_loaded());
        assert!(!model.is_dirty());
    }

    #[test]
    fn test_dead_model_access_is_not_found() {
        let loader = Rc::new(MissingLoader);
        let model = ghost(9);
        let weak: Weak<MissingLoader> = Rc::downgrade(&loader);
        model.set_loader(weak);

        let err = model.get("title").unwrap_err();
        assert!(err.is_not_found());
        assert!(model.is_dead());
    }

    #[test]
    fn test_set_data_consumes_uid() {
        let mut data = ModelData::new();
        data.insert("uid".to_string(), 12.into());
        data.insert("title".to_string(), "x".into());
        let model = Model::with_data(data).unwrap();
        assert_eq!(model.id(), Some(12));
        assert!(model.is_loaded());
        assert!(!model.is_dirty());
        assert!(!model.export_data().contains_key("uid"));
    }

    #[test]
    fn test_set_data_on_loaded_model_is_rejected() {
        let model = Model::with_data(ModelData::new()).unwrap();
        assert!(model.is_dirty());
        assert!(matches!(
            model.set_data(ModelData::new()),
            Err(Error::BadMethodCall(_))
        ));
        model.reset_data(ModelData::new());
        assert!(model.is_loaded());
    }

    #[test]
    fn test_set_on_virgin_loads_and_dirties() {
        let model = Model::new();
        model.set("title", "new").unwrap();
        assert!(model.is_loaded());
        assert!(model.is_dirty());
        assert_eq!(model.get_as_string("title").unwrap(), "new");
    }

    #[test]
    fn test_reserved_and_read_only_fields() {
        let model = Model::new();
        assert!(matches!(model.set("uid", 3), Err(Error::InvalidArgument(_))));
        assert!(matches!(model.set("deleted", true), Err(Error::InvalidArgument(_))));
        model.make_read_only();
        assert!(matches!(model.set("title", "x"), Err(Error::BadMethodCall(_))));
    }

    #[test]
    fn test_set_to_deleted_sets_flag() {
        let model = Model::new();
        model.set("title", "x").unwrap();
        model.mark_as_clean();
        model.set_to_deleted().unwrap();
        assert!(model.is_deleted());
        assert!(model.is_dirty());
    }

    #[test]
    fn test_typed_accessors() {
        let related = Model::new();
        let model = Model::new();
        model.set("count", "7").unwrap();
        model.set("flag", 1).unwrap();
        model.set("owner", related.clone()).unwrap();

        assert_eq!(model.get_as_integer("count").unwrap(), 7);
        assert!(model.get_as_boolean("flag").unwrap());
        assert!(model.has_integer("count").unwrap());
        assert!(!model.has_string("missing").unwrap());
        assert!(model.get_as_model("owner").unwrap().unwrap().ptr_eq(&related));
        assert!(model.get_as_model("missing").unwrap().is_none());
        assert!(matches!(
            model.get_as_string("owner"),
            Err(Error::UnexpectedValue { .. })
        ));
        assert!(matches!(
            model.get_as_collection("count"),
            Err(Error::UnexpectedValue { .. })
        ));
    }

    #[test]
    fn test_creation_date_requires_idless_model() {
        let model = Model::new();
        model.set_creation_date("crdate", 100).unwrap();
        model.set_timestamp("tstamp", 101);
        assert_eq!(model.get_as_integer("crdate").unwrap(), 100);
        assert_eq!(model.get_as_integer("tstamp").unwrap(), 101);

        let persisted = ghost(3);
        assert!(matches!(
            persisted.set_creation_date("crdate", 100),
            Err(Error::BadMethodCall(_))
        ));
    }
}
