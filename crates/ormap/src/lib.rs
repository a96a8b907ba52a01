//! ormap: identity-mapped data mappers with lazy ghosts and cascading
//! persistence.
//!
//! This is the facade crate. It re-exports the building blocks from
//! `ormap-core` and the mappers from `ormap-mapper`, and offers a
//! [`prelude`] for applications.
//!
//! # Quick Start
//!
//! ```
//! use ormap::prelude::*;
//! use std::rc::Rc;
//!
//! let store = Rc::new(MemoryStore::new());
//! store.seed("places", [Row::new().with("uid", 1).with("title", "Berlin")]);
//! store.seed(
//!     "events",
//!     [Row::new().with("uid", 7).with("title", "RustConf").with("place", 1)],
//! );
//!
//! let schema = StaticSchema::new()
//!     .with_table(
//!         "events",
//!         TableSchema::new().column("place", ColumnConfig::many_to_one("places")),
//!     )
//!     .with_table("places", TableSchema::new());
//!
//! let registry = MapperRegistry::new(store, Rc::new(schema));
//! registry.register(MapperDefinition::new("Event", "events").relation("place", "Place"))?;
//! registry.register(MapperDefinition::new("Place", "places"))?;
//!
//! let event = registry.get("Event")?.find(7)?;
//! assert!(event.is_ghost());
//!
//! let place = event.get_as_model("place")?.expect("event has a place");
//! assert_eq!(place.get_as_string("title")?, "Berlin");
//! # Ok::<(), ormap::Error>(())
//! ```

pub use ormap_core::{
    Collection, ColumnConfig, Condition, DELETED, Direction, Error, FieldValue, Filter, HIDDEN,
    MemoryStore, Model, ModelData, ModelLoader, ModelState, OrderBy, Result, Row, RowStore,
    SchemaProvider, StaticSchema, StoreStats, TableSchema, UID, Value, data_from_row,
};
pub use ormap_mapper::{
    DataMapper, IdentityMap, KeyCache, MapperConfig, MapperDefinition, MapperRegistry, Relation,
    RelationKind,
};

/// The underlying crates, for code that implements its own store or schema
/// or needs relation internals such as the junction column helpers.
pub use ormap_core;
pub use ormap_mapper;

/// Everything an application typically needs.
pub mod prelude {
    pub use crate::{
        Collection, ColumnConfig, DataMapper, Error, FieldValue, Filter, MapperConfig,
        MapperDefinition, MapperRegistry, MemoryStore, Model, ModelData, ModelState, OrderBy,
        Result, Row, RowStore, SchemaProvider, StaticSchema, TableSchema, Value,
    };
}
