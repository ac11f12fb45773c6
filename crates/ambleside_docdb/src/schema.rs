//! Schema description: collections, key fields, and indices.

/// Declares a secondary index over one document field.
///
/// Indices order reads; they carry no uniqueness constraint. Index keys are
/// scalar JSON values (numbers are treated as integers, which is what the
/// schedule schema stores).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexSpec {
    /// Index name, also the indexed document field.
    pub field: String,
}

impl IndexSpec {
    /// Declares an index on `field`.
    #[must_use]
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
        }
    }
}

/// Declares one named collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    /// Collection name.
    pub name: String,
    /// Document field used as the primary key. Must hold a string.
    pub key_field: String,
    /// Secondary indices.
    pub indices: Vec<IndexSpec>,
}

impl CollectionSpec {
    /// Declares a collection keyed by `key_field`.
    #[must_use]
    pub fn new(name: impl Into<String>, key_field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_field: key_field.into(),
            indices: Vec::new(),
        }
    }

    /// Adds a secondary index on `field`.
    #[must_use]
    pub fn index(mut self, field: impl Into<String>) -> Self {
        self.indices.push(IndexSpec::new(field));
        self
    }
}

/// A versioned database schema.
///
/// Opening a database with a schema whose version is higher than the stored
/// one upgrades the store in place: missing collections and indices are
/// created, existing documents are kept. Opening with a *lower* version
/// fails — downgrades are not supported.
#[derive(Debug, Clone)]
pub struct Schema {
    /// Schema version. Monotonically increasing across releases.
    pub version: u32,
    /// Collection declarations.
    pub collections: Vec<CollectionSpec>,
}

impl Schema {
    /// Creates an empty schema at the given version.
    #[must_use]
    pub fn new(version: u32) -> Self {
        Self {
            version,
            collections: Vec::new(),
        }
    }

    /// Adds a collection declaration.
    #[must_use]
    pub fn collection(mut self, spec: CollectionSpec) -> Self {
        self.collections.push(spec);
        self
    }

    /// Looks up a collection declaration by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&CollectionSpec> {
        self.collections.iter().find(|c| c.name == name)
    }
}
