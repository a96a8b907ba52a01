//! Declarative description of one table's mapper.

/// Everything that distinguishes one concrete mapper from another.
///
/// # Example
///
/// ```
/// use ormap_mapper::MapperDefinition;
///
/// let events = MapperDefinition::new("Event", "events")
///     .relation("place", "Place")
///     .relation("sessions", "Session")
///     .additional_key("slug")
///     .compound_key(["title", "pid"]);
///
/// assert_eq!(events.relations.len(), 2);
/// assert_eq!(events.compound_key_parts, vec!["title", "pid"]);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapperDefinition {
    /// Registry name of the mapper.
    pub name: String,
    /// Table the mapper reads and writes.
    pub table_name: String,
    /// Relation fields with the registry name of the related mapper, in
    /// resolution order.
    pub relations: Vec<(String, String)>,
    /// Single-field lookup keys.
    pub additional_keys: Vec<String>,
    /// Parts of the compound lookup key, in join order.
    pub compound_key_parts: Vec<String>,
    /// Models built by this mapper are read-only.
    pub read_only: bool,
}

impl MapperDefinition {
    pub fn new(name: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table_name: table_name.into(),
            ..Self::default()
        }
    }

    /// Declare `field` as a relation built by the mapper named `mapper`.
    #[must_use]
    pub fn relation(mut self, field: impl Into<String>, mapper: impl Into<String>) -> Self {
        self.relations.push((field.into(), mapper.into()));
        self
    }

    #[must_use]
    pub fn additional_key(mut self, key: impl Into<String>) -> Self {
        self.additional_keys.push(key.into());
        self
    }

    /// Declare the compound key. A mapper has at most one; calling this
    /// again replaces it.
    #[must_use]
    pub fn compound_key<I, S>(mut self, parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.compound_key_parts = parts.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}
