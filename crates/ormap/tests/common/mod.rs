//! Shared fixture: a small conference database.
//!
//! Events sit on a place (many-to-one), own their sessions (one-to-many,
//! sorted by title), share speakers through a junction table (many-to-many,
//! speakers are the inverse side) and carry a comma-separated tag list.
//! Tags are read-only.

#![allow(dead_code)]

use ormap::prelude::*;
use serde_json::json;
use std::rc::Rc;

pub const NOW: i64 = 1_700_000_000;

pub struct Fixture {
    pub store: Rc<MemoryStore>,
    pub registry: Rc<MapperRegistry>,
}

impl Fixture {
    pub fn events(&self) -> Rc<DataMapper> {
        self.registry.get("Event").unwrap()
    }

    pub fn sessions(&self) -> Rc<DataMapper> {
        self.registry.get("Session").unwrap()
    }

    pub fn speakers(&self) -> Rc<DataMapper> {
        self.registry.get("Speaker").unwrap()
    }

    pub fn places(&self) -> Rc<DataMapper> {
        self.registry.get("Place").unwrap()
    }

    pub fn tags(&self) -> Rc<DataMapper> {
        self.registry.get("Tag").unwrap()
    }

    /// The stored value of one column.
    pub fn column(&self, table: &str, id: i64, column: &str) -> Value {
        self.store
            .row(table, id)
            .and_then(|row| row.get(column).cloned())
            .unwrap_or_default()
    }

    /// `(related id, sorting)` of every junction row of one event, by sorting.
    pub fn speaker_links(&self, event: i64) -> Vec<(i64, i64)> {
        let mut links: Vec<(i64, i64)> = self
            .store
            .rows("events_speakers_mm")
            .iter()
            .filter(|row| row.get("uid_local").map(Value::to_int) == Some(event))
            .map(|row| {
                (
                    row.get("uid_foreign").map_or(0, Value::to_int),
                    row.get("sorting").map_or(0, Value::to_int),
                )
            })
            .collect();
        links.sort_by_key(|(_, sorting)| *sorting);
        links
    }
}

pub fn schema() -> StaticSchema {
    StaticSchema::from_json(json!({
        "tables": {
            "events": {
                "default_sortby": "ORDER BY title",
                "columns": {
                    "place": {"foreign_table": "places", "maxitems": 1},
                    "sessions": {
                        "foreign_table": "sessions",
                        "foreign_field": "event",
                        "foreign_sortby": "title"
                    },
                    "speakers": {"foreign_table": "speakers", "mm": "events_speakers_mm"},
                    "tags": {"foreign_table": "tags"}
                }
            },
            "sessions": {
                "columns": {
                    "event": {"foreign_table": "events", "maxitems": 1}
                }
            },
            "speakers": {
                "default_sortby": "name",
                "columns": {
                    "events": {
                        "foreign_table": "events",
                        "mm": "events_speakers_mm",
                        "mm_opposite_field": "speakers"
                    }
                }
            },
            "places": {},
            "tags": {}
        }
    }))
    .unwrap()
}

pub fn store() -> MemoryStore {
    MemoryStore::from_json(json!({
        "events": [
            {"uid": 1, "pid": 5, "title": "RustConf", "slug": "rustconf", "place": 1,
             "sessions": 2, "speakers": 2, "tags": "2,1", "deleted": 0},
            {"uid": 2, "pid": 5, "title": "EuroRust", "slug": "eurorust", "place": 0,
             "sessions": 0, "speakers": 0, "tags": ""},
            {"uid": 3, "pid": 6, "title": "Gone", "slug": "gone", "deleted": 1},
            {"uid": 4, "pid": 6, "title": "Hidden", "slug": "hidden", "hidden": 1},
            {"uid": 5, "pid": 6, "title": "Junk tags", "tags": " 3, ,0,abc,1"},
            {"uid": 6, "title": "NoPage", "slug": "nopage"}
        ],
        "sessions": [
            {"uid": 1, "event": 1, "title": "Keynote"},
            {"uid": 2, "event": 1, "title": "Async"}
        ],
        "speakers": [
            {"uid": 1, "name": "Ada", "events": 1},
            {"uid": 2, "name": "Grace", "events": 1}
        ],
        "events_speakers_mm": [
            {"uid_local": 1, "uid_foreign": 2, "sorting": 0},
            {"uid_local": 1, "uid_foreign": 1, "sorting": 1}
        ],
        "places": [
            {"uid": 1, "title": "Berlin"}
        ],
        "tags": [
            {"uid": 1, "title": "systems"},
            {"uid": 2, "title": "web"}
        ]
    }))
    .unwrap()
}

pub fn definitions() -> Vec<MapperDefinition> {
    vec![
        MapperDefinition::new("Event", "events")
            .relation("place", "Place")
            .relation("sessions", "Session")
            .relation("speakers", "Speaker")
            .relation("tags", "Tag")
            .additional_key("slug")
            .compound_key(["title", "pid"]),
        MapperDefinition::new("Session", "sessions").relation("event", "Event"),
        MapperDefinition::new("Speaker", "speakers").relation("events", "Event"),
        MapperDefinition::new("Place", "places"),
        MapperDefinition::new("Tag", "tags").read_only(),
    ]
}

pub fn config() -> MapperConfig {
    MapperConfig::new().clock(|| NOW)
}

pub fn fixture() -> Fixture {
    fixture_with_store(Rc::new(store()))
}

pub fn fixture_with_store(store: Rc<MemoryStore>) -> Fixture {
    let registry = MapperRegistry::with_config(store.clone(), Rc::new(schema()), config())
        .with_definitions(definitions())
        .unwrap();
    store.reset_stats();
    Fixture { store, registry }
}
