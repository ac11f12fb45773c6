//! Database facade: open, read, and transact.

use crate::dir::DatabaseDir;
use crate::error::{DocDbError, DocDbResult};
use crate::schema::Schema;
use crate::txn::{Op, Txn};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::debug;

/// A stored document: one JSON object.
pub type Document = serde_json::Map<String, Value>;

/// An index key derived from one document field.
///
/// Keys order `Missing < Bool < Int < Str`; numeric fields are indexed as
/// integers, which covers everything the schedule schema stores
/// (`displayOrder`, `year`, `week`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum IndexKey {
    Missing,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl IndexKey {
    fn from_field(doc: &Document, field: &str) -> Self {
        match doc.get(field) {
            Some(Value::Bool(b)) => Self::Bool(*b),
            Some(Value::Number(n)) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Int(n.as_f64().map_or(0, |f| f as i64)),
            },
            Some(Value::String(s)) => Self::Str(s.clone()),
            _ => Self::Missing,
        }
    }
}

/// One collection's committed documents plus its derived indices.
#[derive(Debug, Clone, Default)]
struct CollectionData {
    docs: BTreeMap<String, Document>,
    /// field -> index key -> primary keys (sorted, so ties are stable).
    indices: BTreeMap<String, BTreeMap<IndexKey, BTreeSet<String>>>,
}

impl CollectionData {
    fn rebuild_indices(&mut self, fields: &[String]) {
        self.indices.clear();
        for field in fields {
            let mut index: BTreeMap<IndexKey, BTreeSet<String>> = BTreeMap::new();
            for (key, doc) in &self.docs {
                index
                    .entry(IndexKey::from_field(doc, field))
                    .or_default()
                    .insert(key.clone());
            }
            self.indices.insert(field.clone(), index);
        }
    }
}

/// Committed database state.
#[derive(Debug, Clone)]
pub(crate) struct DbState {
    version: u32,
    collections: BTreeMap<String, CollectionData>,
}

impl DbState {
    pub(crate) fn document(&self, collection: &str, key: &str) -> Option<Document> {
        self.collections
            .get(collection)
            .and_then(|c| c.docs.get(key))
            .cloned()
    }
}

/// On-disk snapshot shape.
#[derive(Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    collections: BTreeMap<String, BTreeMap<String, Document>>,
}

/// The main database handle.
///
/// `Database` is the entry point for the document store. It provides:
/// - Versioned open with upgrade-on-open
/// - Committed reads (`get`, `get_all`, `count`, `get_sorted_by`)
/// - Multi-collection transactions via [`Database::transaction`]
///
/// # Opening a Database
///
/// ```rust,ignore
/// let db = Database::open(Path::new("data/ambleside_weekly"), schema)?;
/// db.transaction(|txn| {
///     txn.put("students", student_json)?;
///     txn.delete("schedules", "old-key")?;
///     Ok(())
/// })?;
/// ```
///
/// # In-Memory Databases
///
/// For testing, use `Database::open_in_memory()`.
#[derive(Debug)]
pub struct Database {
    schema: Schema,
    /// Database directory (holds the lock). None for in-memory databases.
    dir: Option<DatabaseDir>,
    state: RwLock<DbState>,
    /// Write lock - only one transaction at a time.
    write_lock: Mutex<()>,
}

impl Database {
    /// Opens a database from a directory path.
    ///
    /// Creates the directory and an empty snapshot on first use. If a
    /// snapshot exists with a lower schema version, the store is upgraded
    /// in place: missing collections are created and documents are kept.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Another process has the database locked (`Locked`)
    /// - The snapshot does not parse (`InvalidFormat`)
    /// - The stored version is newer than `schema.version`
    ///   (`VersionMismatch`)
    pub fn open(path: &Path, schema: Schema) -> DocDbResult<Self> {
        let dir = DatabaseDir::open(path)?;

        let stored = match dir.read_snapshot()? {
            Some(raw) => {
                Some(
                    serde_json::from_str::<Snapshot>(&raw).map_err(|e| {
                        DocDbError::InvalidFormat {
                            message: format!("snapshot does not parse: {e}"),
                        }
                    })?,
                )
            }
            None => None,
        };

        let db = Self::assemble(schema, Some(dir), stored)?;

        // First open and upgrades both leave a current-version snapshot
        // behind, so a later open never re-runs the upgrade.
        db.persist(&db.state.read())?;
        Ok(db)
    }

    /// Opens an ephemeral database that persists nothing.
    ///
    /// # Errors
    ///
    /// Currently infallible; kept fallible to match [`Database::open`].
    pub fn open_in_memory(schema: Schema) -> DocDbResult<Self> {
        Self::assemble(schema, None, None)
    }

    fn assemble(
        schema: Schema,
        dir: Option<DatabaseDir>,
        stored: Option<Snapshot>,
    ) -> DocDbResult<Self> {
        let (version, mut collections) = match stored {
            Some(snapshot) => {
                if snapshot.version > schema.version {
                    return Err(DocDbError::VersionMismatch {
                        stored: snapshot.version,
                        requested: schema.version,
                    });
                }
                if snapshot.version < schema.version {
                    debug!(
                        stored = snapshot.version,
                        requested = schema.version,
                        "upgrading document store"
                    );
                }
                let collections = snapshot
                    .collections
                    .into_iter()
                    .map(|(name, docs)| {
                        (
                            name,
                            CollectionData {
                                docs,
                                indices: BTreeMap::new(),
                            },
                        )
                    })
                    .collect::<BTreeMap<_, _>>();
                (schema.version, collections)
            }
            None => (schema.version, BTreeMap::new()),
        };

        for spec in &schema.collections {
            let data = collections.entry(spec.name.clone()).or_default();
            let fields: Vec<String> = spec.indices.iter().map(|i| i.field.clone()).collect();
            data.rebuild_indices(&fields);
        }

        Ok(Self {
            schema,
            dir,
            state: RwLock::new(DbState {
                version,
                collections,
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// Returns the schema this database was opened with.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Returns the committed schema version.
    #[must_use]
    pub fn version(&self) -> u32 {
        self.state.read().version
    }

    /// Reads one document by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn get(&self, collection: &str, key: &str) -> DocDbResult<Option<Document>> {
        self.require_collection(collection)?;
        Ok(self.state.read().document(collection, key))
    }

    /// Reads every document in a collection, in primary-key order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn get_all(&self, collection: &str) -> DocDbResult<Vec<Document>> {
        self.require_collection(collection)?;
        let state = self.state.read();
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.docs.values().cloned().collect())
            .unwrap_or_default())
    }

    /// Counts the documents in a collection.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn count(&self, collection: &str) -> DocDbResult<usize> {
        self.require_collection(collection)?;
        let state = self.state.read();
        Ok(state
            .collections
            .get(collection)
            .map(|c| c.docs.len())
            .unwrap_or_default())
    }

    /// Reads every document in a collection ordered by a secondary index,
    /// ties broken by primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection or index is not in the schema.
    pub fn get_sorted_by(&self, collection: &str, field: &str) -> DocDbResult<Vec<Document>> {
        let spec = self
            .schema
            .get(collection)
            .ok_or_else(|| DocDbError::CollectionNotFound {
                name: collection.to_string(),
            })?;
        if !spec.indices.iter().any(|i| i.field == field) {
            return Err(DocDbError::IndexNotFound {
                collection: collection.to_string(),
                index: field.to_string(),
            });
        }

        let state = self.state.read();
        let Some(data) = state.collections.get(collection) else {
            return Ok(Vec::new());
        };
        let Some(index) = data.indices.get(field) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(data.docs.len());
        for keys in index.values() {
            for key in keys {
                if let Some(doc) = data.docs.get(key) {
                    out.push(doc.clone());
                }
            }
        }
        Ok(out)
    }

    /// Runs a write transaction.
    ///
    /// The closure buffers writes on the [`Txn`]; when it returns `Ok`, the
    /// buffered operations are applied and the snapshot is persisted
    /// atomically. If the closure returns `Err`, or persisting fails,
    /// nothing is applied — the commit is all-or-nothing across every
    /// collection touched.
    ///
    /// Only one transaction runs at a time; readers continue to see the
    /// previous committed state until the commit completes.
    ///
    /// # Errors
    ///
    /// Propagates the closure's error, or any persistence error.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Txn<'_>) -> DocDbResult<T>,
    ) -> DocDbResult<T> {
        let _guard = self.write_lock.lock();

        let (ops, out) = {
            let state = self.state.read();
            let mut txn = Txn::new(&self.schema, &state);
            let out = f(&mut txn)?;
            (txn.into_ops(), out)
        };

        if ops.is_empty() {
            return Ok(out);
        }

        let mut next = self.state.read().clone();
        let mut touched = BTreeSet::new();
        for op in ops {
            match op {
                Op::Put {
                    collection,
                    key,
                    doc,
                } => {
                    next.collections
                        .entry(collection.clone())
                        .or_default()
                        .docs
                        .insert(key, doc);
                    touched.insert(collection);
                }
                Op::Delete { collection, key } => {
                    if let Some(data) = next.collections.get_mut(&collection) {
                        data.docs.remove(&key);
                    }
                    touched.insert(collection);
                }
                Op::Clear { collection } => {
                    if let Some(data) = next.collections.get_mut(&collection) {
                        data.docs.clear();
                    }
                    touched.insert(collection);
                }
            }
        }

        for name in &touched {
            if let Some(spec) = self.schema.get(name) {
                let fields: Vec<String> =
                    spec.indices.iter().map(|i| i.field.clone()).collect();
                if let Some(data) = next.collections.get_mut(name) {
                    data.rebuild_indices(&fields);
                }
            }
        }

        self.persist(&next)?;
        *self.state.write() = next;
        Ok(out)
    }

    fn require_collection(&self, collection: &str) -> DocDbResult<()> {
        if self.schema.get(collection).is_none() {
            return Err(DocDbError::CollectionNotFound {
                name: collection.to_string(),
            });
        }
        Ok(())
    }

    fn persist(&self, state: &DbState) -> DocDbResult<()> {
        let Some(dir) = &self.dir else {
            return Ok(());
        };
        let snapshot = Snapshot {
            version: state.version,
            collections: state
                .collections
                .iter()
                .map(|(name, data)| (name.clone(), data.docs.clone()))
                .collect(),
        };
        let raw = serde_json::to_string_pretty(&snapshot)?;
        dir.write_snapshot(&raw)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::CollectionSpec;
    use serde_json::json;

    fn two_collection_schema() -> Schema {
        Schema::new(1)
            .collection(CollectionSpec::new("students", "storageKey").index("displayOrder"))
            .collection(
                CollectionSpec::new("schedules", "storageKey")
                    .index("year")
                    .index("week"),
            )
    }

    #[test]
    fn txn_commit_spans_collections() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();

        db.transaction(|txn| {
            txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
            txn.put("schedules", json!({"storageKey": "ada", "year": 3, "week": 7}))?;
            Ok(())
        })
        .unwrap();

        assert_eq!(db.count("students").unwrap(), 1);
        assert_eq!(db.count("schedules").unwrap(), 1);
    }

    #[test]
    fn txn_error_rolls_back_everything() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();

        let result: DocDbResult<()> = db.transaction(|txn| {
            txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
            Err(DocDbError::InvalidFormat {
                message: "forced failure".into(),
            })
        });

        assert!(result.is_err());
        assert_eq!(db.count("students").unwrap(), 0);
    }

    #[test]
    fn txn_reads_its_own_writes() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();

        db.transaction(|txn| {
            txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
            let pending = txn.get("students", "ada")?.unwrap();
            assert_eq!(pending["displayOrder"], json!(0));
            txn.delete("students", "ada")?;
            assert!(txn.get("students", "ada")?.is_none());
            Ok(())
        })
        .unwrap();

        assert_eq!(db.count("students").unwrap(), 0);
    }

    #[test]
    fn txn_put_requires_string_key_field() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();

        let err = db
            .transaction(|txn| {
                txn.put("students", json!({"displayOrder": 3}))?;
                Ok(())
            })
            .unwrap_err();

        assert!(matches!(err, DocDbError::MissingKeyField { .. }));
    }

    #[test]
    fn unknown_collection_is_rejected() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();
        let err = db.get("teachers", "x").unwrap_err();
        assert!(matches!(err, DocDbError::CollectionNotFound { .. }));
    }

    #[test]
    fn sorted_by_index_orders_and_breaks_ties_by_key() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();

        db.transaction(|txn| {
            txn.put("students", json!({"storageKey": "zoe", "displayOrder": 0}))?;
            txn.put("students", json!({"storageKey": "ada", "displayOrder": 1}))?;
            txn.put("students", json!({"storageKey": "ben", "displayOrder": 0}))?;
            Ok(())
        })
        .unwrap();

        let keys: Vec<String> = db
            .get_sorted_by("students", "displayOrder")
            .unwrap()
            .iter()
            .map(|d| d["storageKey"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(keys, vec!["ben", "zoe", "ada"]);
    }

    #[test]
    fn sorted_by_undeclared_index_fails() {
        let db = Database::open_in_memory(two_collection_schema()).unwrap();
        let err = db.get_sorted_by("students", "name").unwrap_err();
        assert!(matches!(err, DocDbError::IndexNotFound { .. }));
    }

    #[test]
    fn reopen_keeps_committed_documents() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db");

        {
            let db = Database::open(&path, two_collection_schema()).unwrap();
            db.transaction(|txn| {
                txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
                Ok(())
            })
            .unwrap();
        }

        let db = Database::open(&path, two_collection_schema()).unwrap();
        assert_eq!(db.count("students").unwrap(), 1);
        assert!(db.get("students", "ada").unwrap().is_some());
    }

    #[test]
    fn upgrade_keeps_documents_and_adds_collections() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db");

        {
            let v1 = Schema::new(1)
                .collection(CollectionSpec::new("students", "storageKey").index("displayOrder"));
            let db = Database::open(&path, v1).unwrap();
            db.transaction(|txn| {
                txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
                Ok(())
            })
            .unwrap();
        }

        let v2 = two_collection_schema();
        let db = Database::open(&path, Schema { version: 2, ..v2 }).unwrap();
        assert_eq!(db.version(), 2);
        assert_eq!(db.count("students").unwrap(), 1);
        assert_eq!(db.count("schedules").unwrap(), 0);
    }

    #[test]
    fn downgrade_is_refused() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db");

        {
            let schema = Schema {
                version: 2,
                ..two_collection_schema()
            };
            Database::open(&path, schema).unwrap();
        }

        let err = Database::open(&path, two_collection_schema()).unwrap_err();
        assert!(matches!(
            err,
            DocDbError::VersionMismatch {
                stored: 2,
                requested: 1
            }
        ));
    }

    #[test]
    fn corrupt_snapshot_is_invalid_format() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("db");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("data.json"), "{broken").unwrap();

        let err = Database::open(&path, two_collection_schema()).unwrap_err();
        assert!(matches!(err, DocDbError::InvalidFormat { .. }));
    }
}
