//! Row storage contract and the in-memory reference store.
//!
//! Stores are synchronous and single-threaded: every call blocks until the
//! backing storage answered. Nothing here is transactional; each call is
//! one independent write or read.

use crate::error::{Error, Result};
use crate::query::{Filter, OrderBy};
use crate::row::{Row, UID};
use crate::value::Value;
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;

/// Access to table rows.
pub trait RowStore {
    /// All rows of `table` matching `filter`, sorted by `order`.
    fn select_filtered(&self, table: &str, filter: &Filter, order: &OrderBy) -> Result<Vec<Row>>;

    /// The row with `uid = id`; NotFound if there is none.
    fn select_by_id(&self, table: &str, id: i64) -> Result<Row>;

    /// Insert a row and return its newly allocated id.
    fn insert(&self, table: &str, row: Row) -> Result<i64>;

    /// Overwrite the given columns of the row with `uid = id`.
    fn update(&self, table: &str, row: Row, id: i64) -> Result<()>;

    /// Delete every matching row, returning how many were removed.
    fn delete(&self, table: &str, filter: &Filter) -> Result<usize>;

    /// First matching row; NotFound if nothing matches.
    fn select_single(&self, table: &str, filter: &Filter, order: &OrderBy) -> Result<Row> {
        self.select_filtered(table, filter, order)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("no row in {table} matches {filter:?}")))
    }

    /// Number of matching rows.
    fn count(&self, table: &str, filter: &Filter) -> Result<usize> {
        Ok(self.select_filtered(table, filter, &OrderBy::none())?.len())
    }
}

/// Operation counters of a [`MemoryStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub selects: usize,
    pub inserts: usize,
    pub updates: usize,
    pub deletes: usize,
}

impl StoreStats {
    /// Inserts, updates and deletes combined.
    pub fn writes(&self) -> usize {
        self.inserts + self.updates + self.deletes
    }
}

#[derive(Debug, Default)]
struct MemoryTable {
    rows: Vec<Row>,
    highest_id: i64,
}

impl MemoryTable {
    /// Store `row`, keeping a positive `uid` it already carries.
    fn push(&mut self, mut row: Row) -> i64 {
        let id = match row.id() {
            Some(id) => id,
            None => self.highest_id + 1,
        };
        self.highest_id = self.highest_id.max(id);
        row.insert(UID, id);
        self.rows.push(row);
        id
    }
}

/// Row store kept entirely in memory.
///
/// Rows keep insertion order; every table auto-assigns `uid` values. Seeding
/// does not count towards [`StoreStats`], so tests can assert exactly which
/// reads and writes a mapper issued.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RefCell<BTreeMap<String, MemoryTable>>,
    stats: Cell<StoreStats>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from `{"table": [row, ...], ...}`.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        let tables: BTreeMap<String, Vec<Row>> = serde_json::from_value(json)
            .map_err(|e| Error::invalid_argument(format!("invalid store fixture: {e}")))?;
        let store = Self::new();
        for (table, rows) in tables {
            store.seed(&table, rows);
        }
        Ok(store)
    }

    /// Add rows without touching the counters.
    pub fn seed(&self, table: &str, rows: impl IntoIterator<Item = Row>) {
        let mut tables = self.tables.borrow_mut();
        let entry = tables.entry(table.to_string()).or_default();
        for row in rows {
            entry.push(row);
        }
    }

    /// Snapshot of every row of `table`, in insertion order.
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.tables
            .borrow()
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Snapshot of one row, regardless of any deletion flag.
    pub fn row(&self, table: &str, id: i64) -> Option<Row> {
        self.rows(table).into_iter().find(|row| row.id() == Some(id))
    }

    /// Dump every table as `{"table": [row, ...]}`.
    pub fn to_json(&self) -> serde_json::Value {
        let tables: BTreeMap<String, Vec<Row>> = self
            .tables
            .borrow()
            .iter()
            .map(|(name, table)| (name.clone(), table.rows.clone()))
            .collect();
        serde_json::to_value(tables).unwrap_or(serde_json::Value::Null)
    }

    pub fn stats(&self) -> StoreStats {
        self.stats.get()
    }

    pub fn reset_stats(&self) {
        self.stats.set(StoreStats::default());
    }

    fn record(&self, update: impl FnOnce(&mut StoreStats)) {
        let mut stats = self.stats.get();
        update(&mut stats);
        self.stats.set(stats);
    }
}

impl RowStore for MemoryStore {
    fn select_filtered(&self, table: &str, filter: &Filter, order: &OrderBy) -> Result<Vec<Row>> {
        self.record(|s| s.selects += 1);
        let mut rows: Vec<Row> = self
            .tables
            .borrow()
            .get(table)
            .map(|t| t.rows.iter().filter(|row| filter.matches(row)).cloned().collect())
            .unwrap_or_default();
        order.sort(&mut rows);
        tracing::trace!(table, matched = rows.len(), "memory store select");
        Ok(rows)
    }

    fn select_by_id(&self, table: &str, id: i64) -> Result<Row> {
        self.record(|s| s.selects += 1);
        self.tables
            .borrow()
            .get(table)
            .and_then(|t| t.rows.iter().find(|row| row.id() == Some(id)).cloned())
            .ok_or_else(|| Error::not_found(format!("no row in {table} with uid {id}")))
    }

    fn insert(&self, table: &str, row: Row) -> Result<i64> {
        self.record(|s| s.inserts += 1);
        let id = self
            .tables
            .borrow_mut()
            .entry(table.to_string())
            .or_default()
            .push(row);
        tracing::trace!(table, id, "memory store insert");
        Ok(id)
    }

    fn update(&self, table: &str, row: Row, id: i64) -> Result<()> {
        self.record(|s| s.updates += 1);
        let mut tables = self.tables.borrow_mut();
        let Some(target) = tables
            .get_mut(table)
            .and_then(|t| t.rows.iter_mut().find(|r| r.id() == Some(id)))
        else {
            tracing::trace!(table, id, "memory store update matched no row");
            return Ok(());
        };
        for (column, value) in row {
            if column != UID {
                target.insert(column, value);
            }
        }
        Ok(())
    }

    fn delete(&self, table: &str, filter: &Filter) -> Result<usize> {
        self.record(|s| s.deletes += 1);
        let mut tables = self.tables.borrow_mut();
        let Some(target) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = target.rows.len();
        target.rows.retain(|row| !filter.matches(row));
        Ok(before - target.rows.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let store = MemoryStore::new();
        let a = store.insert("t", Row::new().with("title", "a")).unwrap();
        let b = store.insert("t", Row::new().with("title", "b")).unwrap();
        assert_eq!((a, b), (1, 2));
        assert_eq!(store.row("t", 2).unwrap().get("title"), Some(&Value::from("b")));
        assert_eq!(store.stats().inserts, 2);
    }

    #[test]
    fn test_seed_keeps_ids_and_skips_counters() {
        let store = MemoryStore::from_json(json!({
            "t": [{"uid": 10, "title": "x"}, {"title": "y"}]
        }))
        .unwrap();
        assert_eq!(store.row("t", 11).unwrap().get("title"), Some(&Value::from("y")));
        assert_eq!(store.stats(), StoreStats::default());
    }

    #[test]
    fn test_select_by_id_missing_is_not_found() {
        let store = MemoryStore::new();
        assert!(store.select_by_id("t", 1).unwrap_err().is_not_found());
    }

    #[test]
    fn test_update_merges_columns() {
        let store = MemoryStore::new();
        store.seed("t", [Row::new().with("uid", 1).with("a", 1).with("b", 2)]);
        store.update("t", Row::new().with("b", 3).with("uid", 99), 1).unwrap();
        let row = store.row("t", 1).unwrap();
        assert_eq!(row.get("a"), Some(&Value::from(1)));
        assert_eq!(row.get("b"), Some(&Value::from(3)));
        assert_eq!(row.id(), Some(1));
    }

    #[test]
    fn test_delete_and_select_with_order() {
        let store = MemoryStore::new();
        store.seed(
            "mm",
            [
                Row::new().with("uid_local", 1).with("sorting", 1),
                Row::new().with("uid_local", 1).with("sorting", 0),
                Row::new().with("uid_local", 2).with("sorting", 0),
            ],
        );
        let rows = store
            .select_filtered("mm", &Filter::new().eq("uid_local", 1), &OrderBy::asc("sorting"))
            .unwrap();
        assert_eq!(rows[0].get("sorting"), Some(&Value::from(0)));

        let removed = store.delete("mm", &Filter::new().eq("uid_local", 1)).unwrap();
        assert_eq!(removed, 2);
        assert_eq!(store.rows("mm").len(), 1);
        assert_eq!(store.stats().writes(), 1);
    }
}
