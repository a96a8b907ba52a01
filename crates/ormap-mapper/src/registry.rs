//! Mapper registry.
//!
//! The registry is the one context object an application passes around. It
//! owns the store, the schema, the shared [`MapperConfig`] and one lazily
//! built [`DataMapper`] per registered name. Mappers reach their siblings
//! through it when they resolve relations.
//!
//! Names are unified before lookup (trimmed and lowercased), so `"Event"`,
//! `" event "` and `"EVENT"` address the same mapper.

use crate::config::MapperConfig;
use crate::definition::MapperDefinition;
use crate::mapper::DataMapper;
use ormap_core::{Error, Result, RowStore, SchemaProvider};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};

/// Registry of named data mappers sharing one store.
pub struct MapperRegistry {
    this: Weak<MapperRegistry>,
    store: Rc<dyn RowStore>,
    schema: Rc<dyn SchemaProvider>,
    config: MapperConfig,
    definitions: RefCell<HashMap<String, MapperDefinition>>,
    mappers: RefCell<HashMap<String, Rc<DataMapper>>>,
    storage_denied: Cell<bool>,
    test_mode: Cell<bool>,
}

impl MapperRegistry {
    pub fn new(store: Rc<dyn RowStore>, schema: Rc<dyn SchemaProvider>) -> Rc<Self> {
        Self::with_config(store, schema, MapperConfig::default())
    }

    pub fn with_config(
        store: Rc<dyn RowStore>,
        schema: Rc<dyn SchemaProvider>,
        config: MapperConfig,
    ) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            store,
            schema,
            config,
            definitions: RefCell::new(HashMap::new()),
            mappers: RefCell::new(HashMap::new()),
            storage_denied: Cell::new(false),
            test_mode: Cell::new(false),
        })
    }

    /// Trimmed, lowercased form of a mapper name.
    pub fn unify_name(name: &str) -> String {
        name.trim().to_lowercase()
    }

    /// Make `definition` available under its name. A later registration of
    /// the same name replaces the definition but not an already built mapper.
    pub fn register(&self, definition: MapperDefinition) -> Result<()> {
        let key = Self::unify_name(&definition.name);
        if key.is_empty() {
            return Err(Error::invalid_argument("mapper name must not be empty"));
        }
        tracing::debug!(mapper = %key, table = %definition.table_name, "Registered mapper definition");
        self.definitions.borrow_mut().insert(key, definition);
        Ok(())
    }

    /// [`MapperRegistry::register`] for each definition.
    pub fn with_definitions(
        self: Rc<Self>,
        definitions: impl IntoIterator<Item = MapperDefinition>,
    ) -> Result<Rc<Self>> {
        for definition in definitions {
            self.register(definition)?;
        }
        Ok(self)
    }

    /// The mapper registered under `name`, built on first request.
    ///
    /// Registry-wide flags (denied storage access, test mode) are applied
    /// to the mapper on every call.
    pub fn get(&self, name: &str) -> Result<Rc<DataMapper>> {
        let key = Self::unify_name(name);
        if key.is_empty() {
            return Err(Error::invalid_argument("mapper name must not be empty"));
        }

        let existing = self.mappers.borrow().get(&key).cloned();
        let mapper = match existing {
            Some(mapper) => mapper,
            None => {
                let definition = self.definitions.borrow().get(&key).cloned().ok_or_else(|| {
                    Error::invalid_argument(format!("no mapper named \"{name}\" is registered"))
                })?;
                let mapper = self.build(definition)?.into_shared();
                self.mappers.borrow_mut().insert(key, Rc::clone(&mapper));
                mapper
            }
        };

        if self.storage_denied.get() {
            mapper.disable_storage_access();
        }
        if self.test_mode.get() {
            mapper.set_test_mode(true);
        }
        Ok(mapper)
    }

    /// Build an unregistered mapper wired to this registry's store, schema
    /// and configuration. Relations are resolved here.
    pub fn build(&self, definition: MapperDefinition) -> Result<DataMapper> {
        DataMapper::new(
            definition,
            Rc::clone(&self.store),
            self.schema.as_ref(),
            self.config.clone(),
            self.this.clone(),
        )
    }

    /// Install `mapper` under `name`, e.g. a test double built with
    /// [`MapperRegistry::build`] and [`DataMapper::with_store`].
    ///
    /// A name can be set only while no mapper exists for it.
    pub fn set(&self, name: &str, mapper: DataMapper) -> Result<Rc<DataMapper>> {
        let key = Self::unify_name(name);
        if key.is_empty() {
            return Err(Error::invalid_argument("mapper name must not be empty"));
        }
        if self.mappers.borrow().contains_key(&key) {
            return Err(Error::bad_method_call(format!(
                "a mapper named \"{name}\" already exists"
            )));
        }
        let mapper = mapper.into_shared();
        self.mappers.borrow_mut().insert(key, Rc::clone(&mapper));
        Ok(mapper)
    }

    /// Whether a mapper has been built or set for `name`.
    pub fn has(&self, name: &str) -> bool {
        self.mappers.borrow().contains_key(&Self::unify_name(name))
    }

    /// Drop every built mapper and reset the flags. Definitions stay, so
    /// the next `get` builds fresh mappers with empty identity maps.
    pub fn purge(&self) {
        let dropped = self.mappers.borrow_mut().drain().count();
        self.storage_denied.set(false);
        self.test_mode.set(false);
        tracing::debug!(dropped, "Purged mapper registry");
    }

    /// Cut every current and future mapper off from the store.
    pub fn deny_storage_access(&self) {
        self.storage_denied.set(true);
        for mapper in self.mappers.borrow().values() {
            mapper.disable_storage_access();
        }
    }

    pub fn has_storage_access(&self) -> bool {
        !self.storage_denied.get()
    }

    /// Put every current and future mapper into test mode.
    pub fn activate_test_mode(&self) {
        self.test_mode.set(true);
        for mapper in self.mappers.borrow().values() {
            mapper.set_test_mode(true);
        }
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode.get()
    }

    pub fn store(&self) -> Rc<dyn RowStore> {
        Rc::clone(&self.store)
    }

    pub fn schema(&self) -> Rc<dyn SchemaProvider> {
        Rc::clone(&self.schema)
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }
}

impl fmt::Debug for MapperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = self.mappers.borrow().keys().cloned().collect();
        names.sort();
        f.debug_struct("MapperRegistry")
            .field("mappers", &names)
            .field("definitions", &self.definitions.borrow().len())
            .field("storage_denied", &self.storage_denied.get())
            .field("test_mode", &self.test_mode.get())
            .finish_non_exhaustive()
    }
}
