//! Mapper configuration.
//!
//! Column conventions shared by every mapper of one registry. All fields
//! have defaults; a configuration can be deserialized from any serde format
//! with only the fields that differ.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, 0 if the system clock is before it.
pub fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs() as i64)
}

fn default_clock() -> fn() -> i64 {
    unix_now
}

/// Column conventions and clock used by mappers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Page (storage folder) column used by `find_by_page_uid`.
    pub page_column: String,
    /// Logical deletion column; rows with a truthy value are invisible.
    /// `None` disables logical deletion filtering.
    pub deleted_column: Option<String>,
    /// Column stamped with the creation time of new rows.
    pub creation_column: Option<String>,
    /// Column stamped with the modification time on every save.
    pub timestamp_column: Option<String>,
    /// Column set to 1 on rows inserted while in test mode.
    pub dummy_record_column: String,
    /// Source of "now" for the time stamps.
    #[serde(skip, default = "default_clock")]
    pub clock: fn() -> i64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            page_column: "pid".to_string(),
            deleted_column: Some("deleted".to_string()),
            creation_column: Some("crdate".to_string()),
            timestamp_column: Some("tstamp".to_string()),
            dummy_record_column: "is_dummy_record".to_string(),
            clock: unix_now,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page column.
    pub fn page_column(mut self, column: impl Into<String>) -> Self {
        self.page_column = column.into();
        self
    }

    /// Set or disable the logical deletion column.
    pub fn deleted_column(mut self, column: Option<&str>) -> Self {
        self.deleted_column = column.map(str::to_string);
        self
    }

    /// Set or disable the creation time column.
    pub fn creation_column(mut self, column: Option<&str>) -> Self {
        self.creation_column = column.map(str::to_string);
        self
    }

    /// Set or disable the modification time column.
    pub fn timestamp_column(mut self, column: Option<&str>) -> Self {
        self.timestamp_column = column.map(str::to_string);
        self
    }

    /// Set the test-mode marker column.
    pub fn dummy_record_column(mut self, column: impl Into<String>) -> Self {
        self.dummy_record_column = column.into();
        self
    }

    /// Use a different clock, e.g. a fixed one in tests.
    pub fn clock(mut self, clock: fn() -> i64) -> Self {
        self.clock = clock;
        self
    }

    /// Current time according to the configured clock.
    pub fn now(&self) -> i64 {
        (self.clock)()
    }
}
