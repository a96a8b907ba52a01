//! Data mappers, identity maps and the mapper registry for ormap.
//!
//! `ormap-mapper` is the **persistence layer** of the workspace. It turns
//! rows from a [`ormap_core::RowStore`] into identity-tracked
//! [`ormap_core::Model`]s and writes them back.
//!
//! # Role In The Architecture
//!
//! - **Identity**: each [`DataMapper`] keeps an [`IdentityMap`], so one id
//!   maps to one model handle for the mapper's lifetime.
//! - **Lazy loading**: `find` returns ghosts; the first read of a ghost
//!   loads its row through the mapper.
//! - **Relations**: one-to-many, many-to-one, many-to-many (junction table)
//!   and comma-separated id lists, classified from schema metadata into
//!   [`RelationKind`]s when the mapper is built.
//! - **Persistence**: save flattens model graphs back into rows and
//!   cascades into children and junction tables; delete is logical and
//!   cascades into one-to-many children.
//! - **Registry**: [`MapperRegistry`] owns the store, schema and config and
//!   builds mappers lazily by name.
//!
//! # Who Uses This Crate
//!
//! Applications, usually through the `ormap` facade. Tests use
//! [`MapperRegistry::activate_test_mode`] and
//! [`DataMapper::get_loaded_test_model`] for fixtures.

pub mod config;
pub mod definition;
pub mod identity_map;
pub mod key_cache;
pub mod mapper;
pub mod registry;
pub mod relation;

pub use config::{MapperConfig, unix_now};
pub use definition::MapperDefinition;
pub use identity_map::IdentityMap;
pub use key_cache::KeyCache;
pub use mapper::DataMapper;
pub use registry::MapperRegistry;
pub use relation::{
    JUNCTION_FOREIGN, JUNCTION_LOCAL, JUNCTION_SORTING, Relation, RelationKind, junction_order,
    own_junction_column, related_junction_column,
};
