//! Core types and contracts for ormap.
//!
//! `ormap-core` is the **foundation layer** of the workspace. It defines the
//! data and contract types the mapper layer is built on.
//!
//! # Role In The Architecture
//!
//! - **Data model**: `Value` and `Row` are what a row store reads and writes.
//! - **Object model**: `Model` is an identity-tracked record handle with a
//!   load state machine (virgin, ghost, loading, loaded, dead), and
//!   `Collection` is an ordered set of models that may be owned by a parent.
//! - **Contracts**: `RowStore` (storage), `SchemaProvider` (relation
//!   metadata) and `ModelLoader` (deferred loading of ghosts).
//! - **Reference implementations**: `MemoryStore` and `StaticSchema`, used by
//!   tests and by applications that keep their data in memory.
//!
//! # Who Uses This Crate
//!
//! - `ormap-mapper` builds data mappers, identity maps and the mapper
//!   registry on top of these types.
//! - Applications implement `RowStore` for their database and usually go
//!   through the `ormap` facade.
//!
//! Everything here is single-threaded: models and collections are `Rc`
//! handles and are neither `Send` nor `Sync`.

pub mod collection;
pub mod error;
pub mod model;
pub mod query;
pub mod row;
pub mod schema;
pub mod store;
pub mod value;

pub use collection::Collection;
pub use error::{Error, Result};
pub use model::{DELETED, FieldValue, HIDDEN, Model, ModelData, ModelLoader, ModelState, data_from_row};
pub use query::{Condition, Direction, Filter, OrderBy};
pub use row::{Row, UID};
pub use schema::{ColumnConfig, SchemaProvider, StaticSchema, TableSchema};
pub use store::{MemoryStore, RowStore, StoreStats};
pub use value::Value;
