//! Table and column metadata consumed by mappers.
//!
//! The metadata describes how relation columns are backed: a foreign table
//! whose rows point back (`foreign_field`), a single foreign key
//! (`maxitems = 1`), a junction table (`mm`), or a plain comma-separated id
//! list. Mappers read it once, when they are built.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Relation metadata of one column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Table holding the related rows.
    pub foreign_table: Option<String>,
    /// Column in `foreign_table` pointing back at this row (one-to-many).
    pub foreign_field: Option<String>,
    /// Explicit sort column for one-to-many children.
    pub foreign_sortby: Option<String>,
    /// Fallback sort clause for one-to-many children.
    pub foreign_default_sortby: Option<String>,
    /// Cardinality limit; `1` marks a many-to-one column.
    pub maxitems: Option<u32>,
    /// Junction table of a many-to-many relation.
    pub mm: Option<String>,
    /// Set on the inverse side of a many-to-many relation.
    pub mm_opposite_field: Option<String>,
}

impl ColumnConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// A one-to-many column: rows of `table` point back via `field`.
    pub fn one_to_many(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            foreign_table: Some(table.into()),
            foreign_field: Some(field.into()),
            ..Self::default()
        }
    }

    /// A many-to-one column referencing `table`.
    pub fn many_to_one(table: impl Into<String>) -> Self {
        Self {
            foreign_table: Some(table.into()),
            maxitems: Some(1),
            ..Self::default()
        }
    }

    /// A many-to-many column through junction table `mm`.
    pub fn many_to_many(table: impl Into<String>, mm: impl Into<String>) -> Self {
        Self {
            foreign_table: Some(table.into()),
            mm: Some(mm.into()),
            ..Self::default()
        }
    }

    /// A comma-separated list of ids into `table`.
    pub fn comma_separated(table: impl Into<String>) -> Self {
        Self {
            foreign_table: Some(table.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn sortby(mut self, column: impl Into<String>) -> Self {
        self.foreign_sortby = Some(column.into());
        self
    }

    #[must_use]
    pub fn default_sortby(mut self, clause: impl Into<String>) -> Self {
        self.foreign_default_sortby = Some(clause.into());
        self
    }

    #[must_use]
    pub fn opposite_field(mut self, field: impl Into<String>) -> Self {
        self.mm_opposite_field = Some(field.into());
        self
    }
}

/// Metadata of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableSchema {
    /// Sort clause used when a finder gets no explicit order.
    pub default_sortby: Option<String>,
    pub columns: BTreeMap<String, ColumnConfig>,
}

impl TableSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn default_sortby(mut self, clause: impl Into<String>) -> Self {
        self.default_sortby = Some(clause.into());
        self
    }

    #[must_use]
    pub fn column(mut self, name: impl Into<String>, config: ColumnConfig) -> Self {
        self.columns.insert(name.into(), config);
        self
    }
}

/// Source of table and column metadata.
pub trait SchemaProvider {
    /// Metadata of `table`; NotFound if unknown.
    fn table(&self, table: &str) -> Result<TableSchema>;

    /// Metadata of one column; NotFound if the table or column is unknown.
    fn column(&self, table: &str, column: &str) -> Result<ColumnConfig> {
        self.table(table)?
            .columns
            .get(column)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no metadata for column {table}.{column}")))
    }
}

/// In-memory schema, typically deserialized from a JSON document of the
/// form `{"tables": {"name": {"default_sortby": ..., "columns": {...}}}}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticSchema {
    pub tables: BTreeMap<String, TableSchema>,
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_table(mut self, name: impl Into<String>, schema: TableSchema) -> Self {
        self.tables.insert(name.into(), schema);
        self
    }

    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        serde_json::from_value(json)
            .map_err(|e| Error::misconfiguration(format!("invalid schema document: {e}")))
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::misconfiguration(format!("invalid schema document: {e}")))
    }
}

impl SchemaProvider for StaticSchema {
    fn table(&self, table: &str) -> Result<TableSchema> {
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("no metadata for table {table}")))
    }
}
