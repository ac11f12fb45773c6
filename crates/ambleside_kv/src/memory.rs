//! In-memory key-value store for testing.

use crate::error::KvResult;
use crate::store::KvStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;

/// An in-memory key-value store.
///
/// This store keeps all entries in memory and is suitable for:
/// - Unit tests
/// - Integration tests
/// - Ephemeral sessions that don't need persistence
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```rust
/// use ambleside_kv::{KvStore, MemoryKv};
///
/// let kv = MemoryKv::new();
/// kv.set("a", "1").unwrap();
/// assert_eq!(kv.len().unwrap(), 1);
/// kv.remove("a").unwrap();
/// assert!(kv.is_empty().unwrap());
/// ```
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryKv {
    /// Creates a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    ///
    /// Useful for seeding legacy-data scenarios in tests.
    #[must_use]
    pub fn with_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Self {
            entries: RwLock::new(entries.into_iter().collect()),
        }
    }

    /// Returns a copy of all entries.
    ///
    /// Useful for asserting that a store was left untouched.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.entries.read().clone()
    }
}

impl KvStore for MemoryKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.entries
            .write()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn len(&self) -> KvResult<usize> {
        Ok(self.entries.read().len())
    }
}
