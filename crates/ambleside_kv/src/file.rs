//! File-backed key-value store for persistent storage.

use crate::error::KvResult;
use crate::store::KvStore;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// A file-backed key-value store.
///
/// All entries live in one JSON object file (`string -> string`). The file
/// is read once on open; every mutation rewrites it through a temporary
/// file followed by an atomic rename, so a torn write can never corrupt
/// previously saved entries.
///
/// A missing or unparseable file opens as an empty store rather than
/// failing: the legacy data this store carries degrades gracefully, it
/// does not brick the application.
///
/// # Thread Safety
///
/// This store is thread-safe and can be shared across threads.
///
/// # Example
///
/// ```no_run
/// use ambleside_kv::{KvStore, FileKv};
/// use std::path::Path;
///
/// let kv = FileKv::open(Path::new("data/legacy.json")).unwrap();
/// kv.set("ambleside_tabs_v1", "[]").unwrap();
/// ```
#[derive(Debug)]
pub struct FileKv {
    path: PathBuf,
    entries: RwLock<BTreeMap<String, String>>,
}

impl FileKv {
    /// Opens or creates a file-backed store at the given path.
    ///
    /// Parent directories are created if needed. An existing file that
    /// does not parse as a JSON string map is treated as empty.
    ///
    /// # Errors
    ///
    /// Returns an error if parent directories cannot be created.
    pub fn open(path: &Path) -> KvResult<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let entries = match fs::read_to_string(path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_default(),
            Err(_) => BTreeMap::new(),
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries: RwLock::new(entries),
        })
    }

    /// Returns the path to the backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes the current entries and swaps them into place.
    fn persist(&self, entries: &BTreeMap<String, String>) -> KvResult<()> {
        let raw = serde_json::to_string_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, raw)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl KvStore for FileKv {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        let mut entries = self.entries.write();
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        let mut entries = self.entries.write();
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }

    fn keys(&self) -> KvResult<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }

    fn len(&self) -> KvResult<usize> {
        Ok(self.entries.read().len())
    }
}
