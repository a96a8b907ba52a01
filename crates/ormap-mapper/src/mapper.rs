//! The data mapper: rows in, identity-tracked models out, and back.
//!
//! One [`DataMapper`] serves one table. It hands out at most one model per
//! id (through its [`IdentityMap`]), creates ghosts that load themselves on
//! first access, resolves declared relations by asking sibling mappers from
//! the [`MapperRegistry`], and flattens model graphs back into rows on save.
//!
//! # Save order
//!
//! A save writes the model's own row first, marks the model clean, and only
//! then cascades into one-to-many children and many-to-many junction rows.
//! Children pointing back at the parent therefore see a clean parent and do
//! not save it again. A model that is reached again while its own save is
//! still running, through to-one relations that form a cycle, is skipped.
//!
//! None of this is transactional. A cascade is a sequence of independent
//! store writes; if one of them fails, the writes before it stay in place
//! and the error is returned.

use crate::config::MapperConfig;
use crate::definition::MapperDefinition;
use crate::identity_map::IdentityMap;
use crate::key_cache::KeyCache;
use crate::registry::MapperRegistry;
use crate::relation::{
    JUNCTION_SORTING, Relation, RelationKind, junction_order, own_junction_column,
    related_junction_column,
};
use ormap_core::{
    Collection, DELETED, Error, FieldValue, Filter, Model, ModelData, ModelLoader, OrderBy,
    Result, Row, RowStore, SchemaProvider, UID, Value, data_from_row,
};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

/// Mapper for one table.
pub struct DataMapper {
    name: String,
    table_name: String,
    relations: Vec<Relation>,
    read_only: bool,
    default_sortby: Option<String>,
    config: MapperConfig,
    store: Rc<dyn RowStore>,
    registry: Weak<MapperRegistry>,
    this: Weak<DataMapper>,
    map: RefCell<IdentityMap>,
    keys: RefCell<KeyCache>,
    memory_only: RefCell<HashSet<i64>>,
    saving: RefCell<Vec<Model>>,
    storage_disabled: Cell<bool>,
    test_mode: Cell<bool>,
}

impl DataMapper {
    /// Build a mapper, resolving every declared relation against `schema`.
    pub(crate) fn new(
        definition: MapperDefinition,
        store: Rc<dyn RowStore>,
        schema: &dyn SchemaProvider,
        config: MapperConfig,
        registry: Weak<MapperRegistry>,
    ) -> Result<Self> {
        if definition.table_name.is_empty() {
            return Err(Error::misconfiguration(format!(
                "mapper \"{}\" has no table name",
                definition.name
            )));
        }
        let default_sortby = match schema.table(&definition.table_name) {
            Ok(table) => table.default_sortby,
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        let relations = definition
            .relations
            .iter()
            .map(|(field, mapper)| Relation::resolve(schema, &definition.table_name, field, mapper))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            mapper = %definition.name,
            table = %definition.table_name,
            relations = relations.len(),
            "Built data mapper"
        );

        Ok(Self {
            keys: RefCell::new(KeyCache::new(
                &definition.additional_keys,
                &definition.compound_key_parts,
            )),
            name: definition.name,
            table_name: definition.table_name,
            relations,
            read_only: definition.read_only,
            default_sortby,
            config,
            store,
            registry,
            this: Weak::new(),
            map: RefCell::new(IdentityMap::new()),
            memory_only: RefCell::new(HashSet::new()),
            saving: RefCell::new(Vec::new()),
            storage_disabled: Cell::new(false),
            test_mode: Cell::new(false),
        })
    }

    /// Replace the row store, e.g. to build a test double.
    #[must_use]
    pub fn with_store(mut self, store: Rc<dyn RowStore>) -> Self {
        self.store = store;
        self
    }

    /// Move the mapper behind an `Rc` so its ghosts can point back at it.
    pub(crate) fn into_shared(self) -> Rc<Self> {
        Rc::new_cyclic(|this| DataMapper {
            this: this.clone(),
            ..self
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn config(&self) -> &MapperConfig {
        &self.config
    }

    // ========================================================================
    // Flags
    // ========================================================================

    /// Cut this mapper off from its store: loads fail, finders come back
    /// empty, saves do nothing.
    pub fn disable_storage_access(&self) {
        self.storage_disabled.set(true);
    }

    pub fn has_storage_access(&self) -> bool {
        !self.storage_disabled.get()
    }

    /// In test mode every inserted row is flagged with the configured
    /// dummy-record column.
    pub fn set_test_mode(&self, enabled: bool) {
        self.test_mode.set(enabled);
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode.get()
    }

    /// Number of models in the identity map.
    pub fn tracked_count(&self) -> usize {
        self.map.borrow().len()
    }

    // ========================================================================
    // Retrieval
    // ========================================================================

    /// The model for `id`: the cached one, or a new ghost.
    ///
    /// Never checks whether a row exists.
    pub fn find(&self, id: i64) -> Result<Model> {
        let cached = self.map.borrow().get(id);
        match cached {
            Ok(model) => Ok(model),
            Err(e) if e.is_not_found() => self.create_ghost(id),
            Err(e) => Err(e),
        }
    }

    fn create_ghost(&self, id: i64) -> Result<Model> {
        let model = Model::new();
        model.set_id(id)?;
        let loader: Weak<dyn ModelLoader> = self.this.clone();
        model.set_loader(loader);
        if self.read_only {
            model.make_read_only();
        }
        self.map.borrow_mut().add(&model)?;
        Ok(model)
    }

    /// The model for `row`'s uid, filled from `row` if it is still a ghost.
    ///
    /// A model that already has data keeps it: the first row wins.
    pub fn get_model(&self, row: Row) -> Result<Model> {
        let id = row
            .id()
            .ok_or_else(|| Error::invalid_argument("row must contain a positive \"uid\""))?;
        let model = self.find(id)?;
        if model.is_ghost() {
            self.fill_model(&model, row)?;
        }
        Ok(model)
    }

    /// [`DataMapper::get_model`] for each row, in order.
    pub fn get_list_of_models(&self, rows: Vec<Row>) -> Result<Collection> {
        let models = Collection::new();
        for row in rows {
            models.add(self.get_model(row)?);
        }
        Ok(models)
    }

    /// Fill a ghost from its row, or mark it dead if there is none.
    #[tracing::instrument(level = "debug", skip(self, model), fields(mapper = %self.name, id = ?model.id()))]
    pub fn load(&self, model: &Model) -> Result<()> {
        let id = self.persisted_id(model, "loaded")?;
        match self.retrieve_row(id) {
            Ok(row) => self.fill_model(model, row),
            Err(e) if e.is_not_found() => {
                tracing::debug!(table = %self.table_name, id, "No row, marking model as dead");
                model.mark_as_dead();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Re-read a model's row and overwrite its data, whatever its state.
    #[tracing::instrument(level = "debug", skip(self, model), fields(mapper = %self.name, id = ?model.id()))]
    pub fn reload(&self, model: &Model) -> Result<()> {
        let id = self.persisted_id(model, "reloaded")?;
        match self.retrieve_row(id) {
            Ok(row) => {
                self.keys.borrow_mut().cache(model, &row);
                let data = self.create_relations(model, row)?;
                model.reset_data(data);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                model.mark_as_dead();
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Whether a visible row exists for `id`. Loads the model if needed.
    pub fn exists_model(&self, id: i64, allow_hidden: bool) -> Result<bool> {
        let model = self.find(id)?;
        if model.is_ghost() {
            self.load(&model)?;
        }
        if !model.is_loaded() {
            return Ok(false);
        }
        Ok(allow_hidden || !model.is_hidden()?)
    }

    fn persisted_id(&self, model: &Model, action: &str) -> Result<i64> {
        if self.is_memory_only_dummy(model) {
            return Err(Error::invalid_argument(format!(
                "a memory-only dummy must not be {action}"
            )));
        }
        model
            .id()
            .ok_or_else(|| Error::invalid_argument(format!("only models with a uid can be {action}")))
    }

    fn fill_model(&self, model: &Model, row: Row) -> Result<()> {
        self.keys.borrow_mut().cache(model, &row);
        let data = self.create_relations(model, row)?;
        model.set_data(data)
    }

    // ========================================================================
    // Memory-only dummies
    // ========================================================================

    /// A ghost with a fresh id that exists only in memory.
    pub fn get_new_ghost(&self) -> Result<Model> {
        let id = self.map.borrow().new_id();
        let model = self.create_ghost(id)?;
        self.memory_only.borrow_mut().insert(id);
        Ok(model)
    }

    /// A memory-only dummy already filled with `data`.
    pub fn get_loaded_test_model(&self, data: ModelData) -> Result<Model> {
        let model = self.get_new_ghost()?;
        model.set_data(data)?;
        Ok(model)
    }

    pub fn is_memory_only_dummy(&self, model: &Model) -> bool {
        model
            .id()
            .is_some_and(|id| self.memory_only.borrow().contains(&id))
    }

    // ========================================================================
    // Relations
    // ========================================================================

    fn related_mapper(&self, name: &str) -> Result<Rc<DataMapper>> {
        self.registry
            .upgrade()
            .ok_or_else(|| {
                Error::bad_method_call(format!(
                    "mapper \"{}\" is not attached to a live registry",
                    self.name
                ))
            })?
            .get(name)
    }

    /// Turn `row` into model data with every relation field resolved.
    fn create_relations(&self, model: &Model, row: Row) -> Result<ModelData> {
        let id = model
            .id()
            .or_else(|| row.id())
            .ok_or_else(|| Error::invalid_argument("relations need a model with a uid"))?;
        let mut data = data_from_row(row);

        for relation in &self.relations {
            let raw = data
                .get(&relation.field)
                .and_then(FieldValue::as_value)
                .cloned()
                .unwrap_or_default();
            let related = self.related_mapper(&relation.mapper)?;

            let resolved = match &relation.kind {
                RelationKind::OneToMany {
                    foreign_table,
                    foreign_field,
                    order,
                } => {
                    let children = if raw.to_int() == 0 {
                        Collection::new()
                    } else {
                        if foreign_table != related.table_name() {
                            tracing::warn!(
                                field = %relation.field,
                                foreign_table = %foreign_table,
                                mapper_table = %related.table_name(),
                                "One-to-many foreign table differs from the related mapper's table"
                            );
                        }
                        let order = match order {
                            Some(clause) => OrderBy::parse(clause)?,
                            None => OrderBy::none(),
                        };
                        related.find_by_filter(Filter::new().eq(foreign_field.as_str(), id), &order)?
                    };
                    children.set_parent_model(model);
                    children.mark_as_owned_by_parent();
                    FieldValue::Collection(children)
                }
                RelationKind::ManyToOne => {
                    let foreign_id = raw.to_int();
                    if foreign_id > 0 {
                        FieldValue::Model(Some(related.find(foreign_id)?))
                    } else {
                        FieldValue::Model(None)
                    }
                }
                RelationKind::ManyToMany {
                    junction_table,
                    opposite,
                } => {
                    let members = Collection::new();
                    if raw.to_int() != 0 {
                        let related_column = related_junction_column(*opposite);
                        let rows = self.select_junction(
                            junction_table,
                            &Filter::new().eq(own_junction_column(*opposite), id),
                            &junction_order(*opposite),
                        )?;
                        for junction_row in rows {
                            let related_id =
                                junction_row.get(related_column).map_or(0, Value::to_int);
                            if related_id > 0 {
                                members.add(related.find(related_id)?);
                            } else {
                                tracing::warn!(
                                    junction_table = %junction_table,
                                    id,
                                    "Skipping junction row without a related uid"
                                );
                            }
                        }
                    }
                    members.set_parent_model(model);
                    FieldValue::Collection(members)
                }
                RelationKind::CommaSeparated => {
                    let members = Collection::new();
                    for part in raw.to_key_string().split(',').map(str::trim) {
                        if part.is_empty() {
                            continue;
                        }
                        match part.parse::<i64>() {
                            Ok(related_id) if related_id > 0 => {
                                members.add(related.find(related_id)?);
                            }
                            _ => tracing::warn!(
                                field = %relation.field,
                                entry = part,
                                "Skipping invalid entry in id list"
                            ),
                        }
                    }
                    members.set_parent_model(model);
                    FieldValue::Collection(members)
                }
            };
            data.insert(relation.field.clone(), resolved);
        }

        Ok(data)
    }

    // ========================================================================
    // Key caches
    // ========================================================================

    /// The model whose `key` column equals `value`.
    ///
    /// Served from the key cache when possible; otherwise one filtered query
    /// is issued. NotFound only if no row matches.
    #[tracing::instrument(level = "debug", skip(self, value), fields(mapper = %self.name))]
    pub fn find_one_by_key(&self, key: &str, value: impl Into<Value>) -> Result<Model> {
        if key.is_empty() {
            return Err(Error::invalid_argument("key must not be empty"));
        }
        if !self.keys.borrow().has_key(key) {
            return Err(Error::invalid_argument(format!(
                "\"{key}\" is not a valid key for mapper \"{}\"",
                self.name
            )));
        }
        let value = value.into();
        if value.is_empty() {
            return Err(Error::invalid_argument("key value must not be empty"));
        }

        let cached = self.keys.borrow().get(key, &value);
        if let Some(model) = cached {
            tracing::debug!(key, "Key cache hit");
            return Ok(model);
        }
        tracing::debug!(key, "Key cache miss");
        self.find_single(Filter::new().eq(key, value))
    }

    /// The model matching every part of the compound key.
    #[tracing::instrument(level = "debug", skip(self, values), fields(mapper = %self.name))]
    pub fn find_one_by_compound_key<K, V>(
        &self,
        values: impl IntoIterator<Item = (K, V)>,
    ) -> Result<Model>
    where
        K: Into<String>,
        V: Into<Value>,
    {
        let values: BTreeMap<String, Value> = values
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let compound_key = self.keys.borrow().compound_key(&values)?;

        let cached = self.keys.borrow().get_compound(&compound_key);
        if let Some(model) = cached {
            tracing::debug!(compound_key, "Compound key cache hit");
            return Ok(model);
        }
        tracing::debug!(compound_key, "Compound key cache miss");
        let filter = values
            .into_iter()
            .fold(Filter::new(), |filter, (column, value)| filter.eq(column, value));
        self.find_single(filter)
    }

    fn find_single(&self, filter: Filter) -> Result<Model> {
        if !self.has_storage_access() {
            return Err(Error::not_found(format!(
                "storage access is disabled for mapper \"{}\"",
                self.name
            )));
        }
        let row = self.store.select_single(
            &self.table_name,
            &filter.and(self.visible_filter()),
            &OrderBy::none(),
        )?;
        self.get_model(row)
    }

    // ========================================================================
    // Bulk finders
    // ========================================================================

    /// Every visible row, sorted by `sort` or the table's default order.
    pub fn find_all(&self, sort: Option<&str>) -> Result<Collection> {
        self.find_by_filter(Filter::new(), &self.sort_order(sort)?)
    }

    /// Rows stored on any of `page_ids`. No pages, or just page 0, means
    /// every page.
    pub fn find_by_page_uid(&self, page_ids: &[i64], sort: Option<&str>) -> Result<Collection> {
        self.find_by_filter(self.page_filter(page_ids), &self.sort_order(sort)?)
    }

    /// Number of visible rows stored on any of `page_ids`.
    pub fn count_by_page_uid(&self, page_ids: &[i64]) -> Result<usize> {
        if !self.has_storage_access() {
            return Ok(0);
        }
        self.store.count(
            &self.table_name,
            &self.page_filter(page_ids).and(self.visible_filter()),
        )
    }

    /// Rows whose `relation_key` column points at `model`, minus the
    /// members of `ignore`.
    pub fn find_all_by_relation(
        &self,
        model: &Model,
        relation_key: &str,
        ignore: Option<&Collection>,
    ) -> Result<Collection> {
        let id = model
            .id()
            .ok_or_else(|| Error::invalid_argument("the related model must have a uid"))?;
        if relation_key.is_empty() {
            return Err(Error::invalid_argument("relation key must not be empty"));
        }
        let mut filter = Filter::new().eq(relation_key, id);
        if let Some(ignore) = ignore {
            filter = filter.not_in(UID, ignore.ids().into_iter().map(Value::from).collect());
        }
        self.find_by_filter(filter, &OrderBy::none())
    }

    /// Visible rows matching `filter`, as models.
    pub fn find_by_filter(&self, filter: Filter, order: &OrderBy) -> Result<Collection> {
        let rows = self.select_rows(filter, order)?;
        self.get_list_of_models(rows)
    }

    fn sort_order(&self, sort: Option<&str>) -> Result<OrderBy> {
        match sort.filter(|s| !s.trim().is_empty()) {
            Some(clause) => OrderBy::parse(clause),
            None => self
                .default_sortby
                .as_deref()
                .map_or_else(|| Ok(OrderBy::none()), OrderBy::parse),
        }
    }

    fn page_filter(&self, page_ids: &[i64]) -> Filter {
        if matches!(page_ids, [] | [0]) {
            Filter::new()
        } else {
            Filter::new().is_in(
                self.config.page_column.as_str(),
                page_ids.iter().copied().map(Value::from).collect(),
            )
        }
    }

    // ========================================================================
    // Store access
    // ========================================================================

    fn visible_filter(&self) -> Filter {
        match &self.config.deleted_column {
            Some(column) => Filter::new().unset(column.as_str()),
            None => Filter::new(),
        }
    }

    fn retrieve_row(&self, id: i64) -> Result<Row> {
        if !self.has_storage_access() {
            return Err(Error::not_found(format!(
                "storage access is disabled for mapper \"{}\"",
                self.name
            )));
        }
        let row = self.store.select_by_id(&self.table_name, id)?;
        if !self.visible_filter().matches(&row) {
            return Err(Error::not_found(format!(
                "row {id} of {} is deleted",
                self.table_name
            )));
        }
        Ok(row)
    }

    fn select_rows(&self, filter: Filter, order: &OrderBy) -> Result<Vec<Row>> {
        if !self.has_storage_access() {
            return Ok(Vec::new());
        }
        self.store
            .select_filtered(&self.table_name, &filter.and(self.visible_filter()), order)
    }

    fn select_junction(&self, table: &str, filter: &Filter, order: &OrderBy) -> Result<Vec<Row>> {
        if !self.has_storage_access() {
            return Ok(Vec::new());
        }
        self.store.select_filtered(table, filter, order)
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Write a loaded, dirty, writable model and cascade into its relations.
    ///
    /// Does nothing for clean, unloaded or read-only models and when storage
    /// access is disabled. Memory-only dummies are rejected.
    #[tracing::instrument(level = "debug", skip(self, model), fields(mapper = %self.name, id = ?model.id()))]
    pub fn save(&self, model: &Model) -> Result<()> {
        if self.is_memory_only_dummy(model) {
            return Err(Error::invalid_argument(
                "a memory-only dummy must not be saved",
            ));
        }
        if !self.has_storage_access()
            || !model.is_loaded()
            || !model.is_dirty()
            || model.is_read_only()
        {
            return Ok(());
        }
        if self.saving.borrow().iter().any(|m| m.ptr_eq(model)) {
            tracing::debug!("Model is already being saved, skipping");
            return Ok(());
        }
        let _saving = SaveInProgress::enter(&self.saving, model);

        let row = self.prepare_row(model)?;
        self.keys.borrow_mut().cache(model, &row);

        if let Some(id) = model.id() {
            tracing::info!(table = %self.table_name, id, "Updating row");
            self.store.update(&self.table_name, row, id)?;
        } else {
            let mut row = row;
            if self.is_test_mode() {
                row.insert(self.config.dummy_record_column.as_str(), 1);
            }
            let id = self.store.insert(&self.table_name, row)?;
            tracing::info!(table = %self.table_name, id, "Inserted row");
            model.set_id(id)?;
            self.map.borrow_mut().add(model)?;
        }

        if model.is_deleted() {
            model.mark_as_dead();
            return Ok(());
        }

        model.mark_as_clean();
        self.save_one_to_many_children(model)?;
        self.sync_many_to_many(model)
    }

    /// Stamp times and flatten the model's data into a storable row.
    fn prepare_row(&self, model: &Model) -> Result<Row> {
        let now = self.config.now();
        if !model.has_id() {
            if let Some(column) = &self.config.creation_column {
                model.set_creation_date(column, now)?;
            }
        }
        if let Some(column) = &self.config.timestamp_column {
            model.set_timestamp(column, now);
        }

        let mut data = model.export_data();
        let mut row = Row::new();

        for relation in &self.relations {
            let flattened = match (&relation.kind, data.remove(&relation.field)) {
                (RelationKind::OneToMany { .. }, Some(FieldValue::Collection(children))) => {
                    Value::from(children.len() as i64)
                }
                (RelationKind::ManyToOne, Some(FieldValue::Model(Some(related)))) => {
                    if related.is_dirty() {
                        self.related_mapper(&relation.mapper)?.save(&related)?;
                    }
                    Value::from(related.id().unwrap_or(0))
                }
                (RelationKind::ManyToMany { .. }, Some(FieldValue::Collection(members))) => {
                    self.save_dirty_members(relation, &members)?;
                    Value::from(members.len() as i64)
                }
                (RelationKind::CommaSeparated, Some(FieldValue::Collection(members))) => {
                    self.save_dirty_members(relation, &members)?;
                    Value::from(members.ids_string())
                }
                (_, Some(FieldValue::Value(scalar))) => scalar,
                (_, _) => Value::from(0),
            };
            row.insert(relation.field.as_str(), flattened.into_storable());
        }

        for (field, value) in data {
            let flattened = match value {
                FieldValue::Value(scalar) => scalar,
                FieldValue::Model(related) => {
                    Value::from(related.and_then(|m| m.id()).unwrap_or(0))
                }
                FieldValue::Collection(members) => Value::from(members.ids_string()),
            };
            row.insert(field, flattened.into_storable());
        }

        if let Some(column) = self.config.deleted_column.as_deref().filter(|c| *c != DELETED) {
            if let Some(flag) = row.remove(DELETED) {
                row.insert(column, flag);
            }
        }

        Ok(row)
    }

    fn save_dirty_members(&self, relation: &Relation, members: &Collection) -> Result<()> {
        let dirty: Vec<Model> = members.to_vec().into_iter().filter(Model::is_dirty).collect();
        if dirty.is_empty() {
            return Ok(());
        }
        let mapper = self.related_mapper(&relation.mapper)?;
        for member in dirty {
            mapper.save(&member)?;
        }
        Ok(())
    }

    /// Save every child of every one-to-many relation, then delete the
    /// children that were removed from an owned collection.
    fn save_one_to_many_children(&self, model: &Model) -> Result<()> {
        let data = model.export_data();
        for relation in &self.relations {
            let RelationKind::OneToMany { foreign_field, .. } = &relation.kind else {
                continue;
            };
            let Some(FieldValue::Collection(children)) = data.get(&relation.field) else {
                continue;
            };
            let mapper = self.related_mapper(&relation.mapper)?;

            for child in children.to_vec() {
                if child.is_dead() {
                    continue;
                }
                if !points_at(&child.get(foreign_field)?, model) {
                    child.set(foreign_field, model.clone())?;
                }
                mapper.save(&child)?;
            }

            if !children.is_owned_by_parent() {
                continue;
            }
            let orphans = mapper.find_all_by_relation(model, foreign_field, Some(children))?;
            for orphan in orphans.to_vec() {
                tracing::debug!(
                    field = %relation.field,
                    child = ?orphan.id(),
                    "Deleting child removed from its parent"
                );
                mapper.delete(&orphan)?;
            }
        }
        Ok(())
    }

    /// Rewrite every junction table of this model from scratch.
    fn sync_many_to_many(&self, model: &Model) -> Result<()> {
        if !self.relations.iter().any(|r| r.kind.is_many_to_many()) {
            return Ok(());
        }
        let Some(id) = model.id() else {
            return Ok(());
        };
        let data = model.export_data();
        for relation in &self.relations {
            let RelationKind::ManyToMany {
                junction_table,
                opposite,
            } = &relation.kind
            else {
                continue;
            };
            let own_column = own_junction_column(*opposite);
            let related_column = related_junction_column(*opposite);

            self.store
                .delete(junction_table, &Filter::new().eq(own_column, id))?;

            let Some(FieldValue::Collection(members)) = data.get(&relation.field) else {
                continue;
            };
            let mut sorting: i64 = 0;
            for member in members.to_vec() {
                let Some(member_id) = member.id() else {
                    tracing::warn!(
                        field = %relation.field,
                        "Skipping many-to-many member without a uid"
                    );
                    continue;
                };
                let junction_row = Row::new()
                    .with(own_column, id)
                    .with(related_column, member_id)
                    .with(JUNCTION_SORTING, sorting);
                self.store.insert(junction_table, junction_row)?;
                sorting += 1;
            }
        }
        Ok(())
    }

    /// Logically delete a model and, recursively, its one-to-many children.
    ///
    /// Deleting a dead model does nothing. The model is dead afterwards.
    #[tracing::instrument(level = "debug", skip(self, model), fields(mapper = %self.name, id = ?model.id()))]
    pub fn delete(&self, model: &Model) -> Result<()> {
        if self.is_memory_only_dummy(model) {
            return Err(Error::invalid_argument(
                "a memory-only dummy must not be deleted",
            ));
        }
        if model.is_dead() {
            return Ok(());
        }
        if model.is_read_only() {
            return Err(Error::invalid_argument(
                "a read-only model must not be deleted",
            ));
        }

        if model.has_id() {
            if model.is_ghost() {
                self.load(model)?;
                if model.is_dead() {
                    return Ok(());
                }
            }
            let children = self.one_to_many_snapshot(model)?;
            model.set_to_deleted()?;
            self.save(model)?;
            for (mapper, members) in children {
                for child in members {
                    mapper.delete(&child)?;
                }
            }
        }

        model.mark_as_dead();
        Ok(())
    }

    fn one_to_many_snapshot(&self, model: &Model) -> Result<Vec<(Rc<DataMapper>, Vec<Model>)>> {
        let data = model.export_data();
        let mut snapshot = Vec::new();
        for relation in self.relations.iter().filter(|r| r.kind.is_one_to_many()) {
            if let Some(FieldValue::Collection(children)) = data.get(&relation.field) {
                snapshot.push((self.related_mapper(&relation.mapper)?, children.to_vec()));
            }
        }
        Ok(snapshot)
    }
}

/// Marks a model as being saved by one mapper until dropped, so that a
/// cycle of to-one relations leads back to a no-op instead of a second save.
struct SaveInProgress<'a> {
    saving: &'a RefCell<Vec<Model>>,
    model: Model,
}

impl<'a> SaveInProgress<'a> {
    fn enter(saving: &'a RefCell<Vec<Model>>, model: &Model) -> Self {
        saving.borrow_mut().push(model.clone());
        Self {
            saving,
            model: model.clone(),
        }
    }
}

impl Drop for SaveInProgress<'_> {
    fn drop(&mut self) {
        self.saving.borrow_mut().retain(|m| !m.ptr_eq(&self.model));
    }
}

/// Whether a child's back-reference already names `parent`.
fn points_at(value: &FieldValue, parent: &Model) -> bool {
    match value {
        FieldValue::Model(Some(model)) => model.ptr_eq(parent),
        FieldValue::Value(scalar) => parent.id().is_some_and(|id| scalar.to_int() == id),
        _ => false,
    }
}

impl ModelLoader for DataMapper {
    fn load(&self, model: &Model) -> Result<()> {
        DataMapper::load(self, model)
    }
}

impl fmt::Debug for DataMapper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataMapper")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("relations", &self.relations)
            .field("tracked", &self.map.borrow().len())
            .field("storage_disabled", &self.storage_disabled.get())
            .field("test_mode", &self.test_mode.get())
            .finish_non_exhaustive()
    }
}
