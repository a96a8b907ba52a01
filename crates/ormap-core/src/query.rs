//! Row filters and sort orders understood by every [`RowStore`].
//!
//! [`RowStore`]: crate::store::RowStore

use crate::error::{Error, Result};
use crate::row::{Row, UID};
use crate::value::Value;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use std::sync::LazyLock;

static ORDER_BY_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*ORDER\s+BY\s+").expect("valid regex"));

static SORT_TERM: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*([a-z_][a-z0-9_.]*)\s*(ASC|DESC)?\s*$").expect("valid regex")
});

/// One predicate on a column. A missing column reads as NULL.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// `column = value` (numeric text matches numbers).
    Eq(String, Value),
    /// `column IN (values)`.
    In(String, Vec<Value>),
    /// `column NOT IN (values)`.
    NotIn(String, Vec<Value>),
    /// Column is NULL, false, 0 or empty. Used for `deleted = 0`.
    Unset(String),
}

impl Condition {
    pub fn matches(&self, row: &Row) -> bool {
        let read = |column: &str| row.get(column).cloned().unwrap_or_default();
        match self {
            Condition::Eq(column, value) => read(column).loosely_equals(value),
            Condition::In(column, values) => {
                let actual = read(column);
                values.iter().any(|v| actual.loosely_equals(v))
            }
            Condition::NotIn(column, values) => {
                let actual = read(column);
                !values.iter().any(|v| actual.loosely_equals(v))
            }
            Condition::Unset(column) => !read(column).is_truthy(),
        }
    }
}

/// Conjunction of conditions. The empty filter matches every row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    conditions: Vec<Condition>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `uid = id`.
    pub fn by_id(id: i64) -> Self {
        Self::new().eq(UID, id)
    }

    #[must_use]
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions
            .push(Condition::Eq(column.into(), value.into()));
        self
    }

    #[must_use]
    pub fn is_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        self.conditions.push(Condition::In(column.into(), values));
        self
    }

    /// Adds nothing when `values` is empty.
    #[must_use]
    pub fn not_in(mut self, column: impl Into<String>, values: Vec<Value>) -> Self {
        if !values.is_empty() {
            self.conditions.push(Condition::NotIn(column.into(), values));
        }
        self
    }

    #[must_use]
    pub fn unset(mut self, column: impl Into<String>) -> Self {
        self.conditions.push(Condition::Unset(column.into()));
        self
    }

    /// Append all conditions of `other`.
    #[must_use]
    pub fn and(mut self, other: Filter) -> Self {
        self.conditions.extend(other.conditions);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches(&self, row: &Row) -> bool {
        self.conditions.iter().all(|c| c.matches(row))
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

/// Ordered list of sort terms. The empty order leaves rows in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderBy {
    terms: Vec<(String, Direction)>,
}

impl OrderBy {
    /// No ordering.
    pub fn none() -> Self {
        Self::default()
    }

    /// Ascending on one column.
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            terms: vec![(column.into(), Direction::Asc)],
        }
    }

    #[must_use]
    pub fn then(mut self, column: impl Into<String>, direction: Direction) -> Self {
        self.terms.push((column.into(), direction));
        self
    }

    /// Parse a clause such as `"ORDER BY title DESC, uid"`.
    ///
    /// The `ORDER BY` prefix is optional; a blank clause yields no ordering.
    pub fn parse(clause: &str) -> Result<Self> {
        let body = ORDER_BY_PREFIX.replace(clause, "");
        if body.trim().is_empty() {
            return Ok(Self::none());
        }
        let mut terms = Vec::new();
        for part in body.split(',') {
            let caps = SORT_TERM.captures(part).ok_or_else(|| {
                Error::invalid_argument(format!("invalid sort term \"{}\"", part.trim()))
            })?;
            let direction = match caps.get(2) {
                Some(d) if d.as_str().eq_ignore_ascii_case("desc") => Direction::Desc,
                _ => Direction::Asc,
            };
            terms.push((caps[1].to_string(), direction));
        }
        Ok(Self { terms })
    }

    pub fn terms(&self) -> &[(String, Direction)] {
        &self.terms
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn compare(&self, a: &Row, b: &Row) -> Ordering {
        for (column, direction) in &self.terms {
            let left = a.get(column).cloned().unwrap_or_default();
            let right = b.get(column).cloned().unwrap_or_default();
            let ordering = match direction {
                Direction::Asc => left.compare(&right),
                Direction::Desc => right.compare(&left),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }

    /// Stable in-place sort.
    pub fn sort(&self, rows: &mut [Row]) {
        if !self.is_empty() {
            rows.sort_by(|a, b| self.compare(a, b));
        }
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self
            .terms
            .iter()
            .map(|(column, direction)| match direction {
                Direction::Asc => format!("{column} ASC"),
                Direction::Desc => format!("{column} DESC"),
            })
            .collect();
        f.write_str(&rendered.join(", "))
    }
}
