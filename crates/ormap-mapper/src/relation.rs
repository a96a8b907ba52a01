//! Relation descriptors.
//!
//! A mapper declares which of its fields are relations and which mapper
//! builds the related models. How each relation is stored is read from the
//! schema once, when the mapper is built, and kept as a [`Relation`].

use ormap_core::{ColumnConfig, Error, OrderBy, Result, SchemaProvider};

/// Junction table column pointing at the owning side.
pub const JUNCTION_LOCAL: &str = "uid_local";
/// Junction table column pointing at the inverse side.
pub const JUNCTION_FOREIGN: &str = "uid_foreign";
/// Junction table sort column.
pub const JUNCTION_SORTING: &str = "sorting";

/// How a relation field is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Rows of `foreign_table` point back via `foreign_field`; this row's
    /// column holds the number of children.
    OneToMany {
        foreign_table: String,
        foreign_field: String,
        /// Sort clause for the children, if any.
        order: Option<String>,
    },
    /// This row's column holds the id of one related row.
    ManyToOne,
    /// Related through `junction_table`; this row's column holds the number
    /// of related rows.
    ManyToMany {
        junction_table: String,
        /// This side is the inverse one (`uid_foreign` points at it).
        opposite: bool,
    },
    /// This row's column holds a comma-separated list of ids.
    CommaSeparated,
}

impl RelationKind {
    /// Classify a column. Checked in order: one-to-many, many-to-one,
    /// many-to-many, comma-separated.
    pub fn from_column(table: &str, field: &str, config: &ColumnConfig) -> Result<Self> {
        if let Some(foreign_field) = &config.foreign_field {
            let foreign_table = config.foreign_table.clone().ok_or_else(|| {
                Error::misconfiguration(format!(
                    "{table}.{field} declares foreign_field \"{foreign_field}\" but no foreign_table"
                ))
            })?;
            return Ok(RelationKind::OneToMany {
                foreign_table,
                foreign_field: foreign_field.clone(),
                order: config
                    .foreign_sortby
                    .clone()
                    .or_else(|| config.foreign_default_sortby.clone()),
            });
        }
        if config.maxitems == Some(1) {
            return Ok(RelationKind::ManyToOne);
        }
        if let Some(junction_table) = &config.mm {
            return Ok(RelationKind::ManyToMany {
                junction_table: junction_table.clone(),
                opposite: config.mm_opposite_field.is_some(),
            });
        }
        Ok(RelationKind::CommaSeparated)
    }

    pub fn is_one_to_many(&self) -> bool {
        matches!(self, RelationKind::OneToMany { .. })
    }

    pub fn is_many_to_many(&self) -> bool {
        matches!(self, RelationKind::ManyToMany { .. })
    }
}

/// Junction column pointing at the model that owns the relation field.
pub fn own_junction_column(opposite: bool) -> &'static str {
    if opposite { JUNCTION_FOREIGN } else { JUNCTION_LOCAL }
}

/// Junction column pointing at the related models.
pub fn related_junction_column(opposite: bool) -> &'static str {
    if opposite { JUNCTION_LOCAL } else { JUNCTION_FOREIGN }
}

/// Read order of junction rows: the sort column on the owning side, the
/// owning key on the inverse side.
pub fn junction_order(opposite: bool) -> OrderBy {
    if opposite {
        OrderBy::asc(JUNCTION_LOCAL)
    } else {
        OrderBy::asc(JUNCTION_SORTING)
    }
}

/// One resolved relation of a mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    /// Field (and column) name on the owning model.
    pub field: String,
    /// Registry name of the mapper building the related models.
    pub mapper: String,
    pub kind: RelationKind,
}

impl Relation {
    /// Resolve `field` of `table` against the schema.
    ///
    /// A field without schema metadata is a misconfiguration.
    pub fn resolve(
        schema: &dyn SchemaProvider,
        table: &str,
        field: &str,
        mapper: &str,
    ) -> Result<Self> {
        let config = schema.column(table, field).map_err(|e| {
            if e.is_not_found() {
                Error::misconfiguration(format!(
                    "relation field {table}.{field} has no schema metadata"
                ))
            } else {
                e
            }
        })?;
        Ok(Self {
            field: field.to_string(),
            mapper: mapper.to_string(),
            kind: RelationKind::from_column(table, field, &config)?,
        })
    }
}
