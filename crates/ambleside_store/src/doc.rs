//! Document backend: transactional persistence.

use crate::backend::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{now_ms, ExportBundle, Schedule, Student, TabData};
use ambleside_docdb::{CollectionSpec, Database, Schema};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Database directory name, under the chosen data directory.
pub const DB_NAME: &str = "ambleside_weekly";
/// Current schema version.
pub const DB_VERSION: u32 = 1;
/// Students collection name.
pub const STUDENTS_COLLECTION: &str = "students";
/// Schedules collection name.
pub const SCHEDULES_COLLECTION: &str = "schedules";

/// Probe directory name for availability checks.
const PROBE_DB: &str = "__probe_db__";

fn schema() -> Schema {
    Schema::new(DB_VERSION)
        .collection(
            CollectionSpec::new(STUDENTS_COLLECTION, "storageKey").index("displayOrder"),
        )
        .collection(
            CollectionSpec::new(SCHEDULES_COLLECTION, "storageKey")
                .index("year")
                .index("week"),
        )
}

/// Transactional document persistence backend.
///
/// Two collections, both keyed by `storageKey`: `students` with a
/// `displayOrder` ordering index, and `schedules` with `year`/`week`
/// indices (present for future querying; current reads don't use them).
///
/// Writes that touch both collections — `save_tab_data`'s title patch,
/// `delete_student`, `rename_student`, `import_all` — run in one
/// transaction and either fully commit or fully roll back.
///
/// Initialization is lazy and idempotent: any operation that needs the
/// connection opens it first; `init` just does so eagerly.
pub struct DocBackend {
    data_dir: PathBuf,
    in_memory: bool,
    db: RwLock<Option<Arc<Database>>>,
}

impl DocBackend {
    /// Creates a backend whose database lives under
    /// `data_dir/ambleside_weekly`.
    #[must_use]
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            in_memory: false,
            db: RwLock::new(None),
        }
    }

    /// Creates a backend that persists nothing. For tests.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            data_dir: PathBuf::new(),
            in_memory: true,
            db: RwLock::new(None),
        }
    }

    fn ensure_db(&self) -> StoreResult<Arc<Database>> {
        if let Some(db) = self.db.read().clone() {
            return Ok(db);
        }

        let mut guard = self.db.write();
        if let Some(db) = guard.clone() {
            return Ok(db);
        }

        let db = if self.in_memory {
            Database::open_in_memory(schema())?
        } else {
            Database::open(&self.data_dir.join(DB_NAME), schema())?
        };
        let db = Arc::new(db);
        *guard = Some(Arc::clone(&db));
        Ok(db)
    }

    fn student_doc(student: &Student) -> StoreResult<Value> {
        Ok(serde_json::to_value(student.normalized())?)
    }

    fn parse_student(doc: serde_json::Map<String, Value>) -> Option<Student> {
        serde_json::from_value(Value::Object(doc)).ok()
    }

    /// Serializes a blob for storage: `storageKey` injected, optionally a
    /// fresh `updated_at` stamp.
    fn blob_doc(storage_key: &str, data: &TabData, stamp: bool) -> StoreResult<Value> {
        let mut data = data.clone();
        if stamp {
            data.updated_at = Some(now_ms());
        }
        let mut value = serde_json::to_value(&data)?;
        if let Value::Object(map) = &mut value {
            map.insert(
                "storageKey".to_string(),
                Value::String(storage_key.to_string()),
            );
        }
        Ok(value)
    }
}

#[async_trait]
impl RecordStore for DocBackend {
    async fn init(&self) -> StoreResult<()> {
        self.ensure_db()?;
        Ok(())
    }

    async fn is_available(&self) -> bool {
        if self.in_memory {
            return true;
        }

        // Open a throwaway database next to the real one, then remove it.
        let probe = self.data_dir.join(PROBE_DB);
        let usable = Database::open(&probe, schema()).is_ok();
        let _ = std::fs::remove_dir_all(&probe);
        usable
    }

    async fn get_students(&self) -> StoreResult<Vec<Student>> {
        let db = self.ensure_db()?;
        let docs = db.get_sorted_by(STUDENTS_COLLECTION, "displayOrder")?;
        Ok(docs.into_iter().filter_map(Self::parse_student).collect())
    }

    async fn get_student_by_key(&self, storage_key: &str) -> StoreResult<Option<Student>> {
        let db = self.ensure_db()?;
        Ok(db
            .get(STUDENTS_COLLECTION, storage_key)?
            .and_then(Self::parse_student))
    }

    async fn save_student(&self, student: &Student) -> StoreResult<()> {
        let db = self.ensure_db()?;
        let doc = Self::student_doc(student)?;
        db.transaction(|txn| {
            txn.put(STUDENTS_COLLECTION, doc)?;
            Ok(())
        })?;
        Ok(())
    }

    async fn delete_student(&self, storage_key: &str) -> StoreResult<()> {
        let db = self.ensure_db()?;
        db.transaction(|txn| {
            txn.delete(STUDENTS_COLLECTION, storage_key)?;
            txn.delete(SCHEDULES_COLLECTION, storage_key)?;
            Ok(())
        })?;
        Ok(())
    }

    async fn get_schedule(
        &self,
        storage_key: &str,
        year: u32,
        week: u32,
    ) -> StoreResult<Option<Schedule>> {
        let Some(data) = self.get_tab_data(storage_key).await? else {
            return Ok(None);
        };
        Ok(data.schedule_for(storage_key, year, week))
    }

    async fn get_tab_data(&self, storage_key: &str) -> StoreResult<Option<TabData>> {
        let db = self.ensure_db()?;
        let Some(doc) = db.get(SCHEDULES_COLLECTION, storage_key)? else {
            return Ok(None);
        };
        Ok(serde_json::from_value(Value::Object(doc)).ok())
    }

    async fn save_tab_data(&self, storage_key: &str, data: &TabData) -> StoreResult<()> {
        if storage_key.is_empty() {
            return Err(StoreError::MissingStorageKey);
        }

        let db = self.ensure_db()?;
        let blob = Self::blob_doc(storage_key, data, true)?;
        let title = data.title.clone();

        // Blob write and student-name patch commit together or not at all.
        db.transaction(|txn| {
            txn.put(SCHEDULES_COLLECTION, blob)?;
            if let Some(title) = &title {
                if let Some(mut student) = txn.get(STUDENTS_COLLECTION, storage_key)? {
                    student.insert("name".to_string(), Value::String(title.clone()));
                    txn.put(STUDENTS_COLLECTION, Value::Object(student))?;
                }
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn rename_student(
        &self,
        old_key: &str,
        new_key: &str,
        new_name: &str,
    ) -> StoreResult<()> {
        if new_key.is_empty() {
            return Err(StoreError::MissingStorageKey);
        }

        let db = self.ensure_db()?;

        if old_key == new_key {
            return match self.get_student_by_key(old_key).await? {
                Some(mut student) => {
                    student.name = new_name.to_string();
                    self.save_student(&student).await
                }
                None => self.save_student(&Student::new(new_name, new_key, 0)).await,
            };
        }

        if db.get(STUDENTS_COLLECTION, new_key)?.is_some() {
            return Err(StoreError::RenameTargetExists(new_key.to_string()));
        }

        let moved = match db.get(STUDENTS_COLLECTION, old_key)?.and_then(Self::parse_student) {
            Some(mut student) => {
                student.id = new_key.to_string();
                student.storage_key = new_key.to_string();
                student.name = new_name.to_string();
                student
            }
            None => Student::new(new_name, new_key, 0),
        };
        let student_doc = Self::student_doc(&moved)?;

        let blob = db.get(SCHEDULES_COLLECTION, old_key)?;
        let moved_blob = match blob {
            Some(mut doc) => {
                doc.insert(
                    "storageKey".to_string(),
                    Value::String(new_key.to_string()),
                );
                Some(Value::Object(doc))
            }
            None => None,
        };

        db.transaction(|txn| {
            txn.put(STUDENTS_COLLECTION, student_doc)?;
            txn.delete(STUDENTS_COLLECTION, old_key)?;
            if let Some(blob) = moved_blob {
                txn.put(SCHEDULES_COLLECTION, blob)?;
                txn.delete(SCHEDULES_COLLECTION, old_key)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn export_all(&self) -> StoreResult<ExportBundle> {
        let students = self.get_students().await?;
        let mut tabs = BTreeMap::new();
        for student in &students {
            if let Some(data) = self.get_tab_data(&student.storage_key).await? {
                tabs.insert(student.storage_key.clone(), data);
            }
        }
        Ok(ExportBundle::new(students, tabs))
    }

    async fn import_all(&self, bundle: &ExportBundle) -> StoreResult<()> {
        let db = self.ensure_db()?;

        let mut student_docs = Vec::with_capacity(bundle.students.len());
        let mut blob_docs = Vec::new();
        for (index, student) in bundle.students.iter().enumerate() {
            let mut student = student.normalized();
            student.display_order = index as u32;
            student_docs.push(serde_json::to_value(&student)?);

            if let Some(data) = bundle.tabs.get(&student.storage_key) {
                // Imported blobs keep their original updated_at stamp.
                blob_docs.push(Self::blob_doc(&student.storage_key, data, false)?);
            }
        }

        db.transaction(|txn| {
            txn.clear(STUDENTS_COLLECTION)?;
            txn.clear(SCHEDULES_COLLECTION)?;
            for doc in student_docs {
                txn.put(STUDENTS_COLLECTION, doc)?;
            }
            for doc in blob_docs {
                txn.put(SCHEDULES_COLLECTION, doc)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    async fn has_data(&self) -> StoreResult<bool> {
        let db = self.ensure_db()?;
        Ok(db.count(STUDENTS_COLLECTION)? > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn doc_operations_initialize_lazily() {
        let store = DocBackend::in_memory();
        // No explicit init.
        assert!(!store.has_data().await.unwrap());
    }

    #[tokio::test]
    async fn doc_init_is_idempotent() {
        let store = DocBackend::in_memory();
        store.init().await.unwrap();
        store.init().await.unwrap();
        store
            .save_student(&Student::new("Ada", "ada", 0))
            .await
            .unwrap();
        assert!(store.has_data().await.unwrap());
    }

    #[tokio::test]
    async fn doc_students_sorted_by_display_order() {
        let store = DocBackend::in_memory();
        store.save_student(&Student::new("Zoe", "zoe", 2)).await.unwrap();
        store.save_student(&Student::new("Ada", "ada", 0)).await.unwrap();
        store.save_student(&Student::new("Ben", "ben", 1)).await.unwrap();

        let keys: Vec<String> = store
            .get_students()
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.storage_key)
            .collect();
        assert_eq!(keys, vec!["ada", "ben", "zoe"]);
    }

    #[tokio::test]
    async fn doc_save_tab_data_patches_student_name_in_same_commit() {
        let store = DocBackend::in_memory();
        store.save_student(&Student::new("Form 1", "form-1", 0)).await.unwrap();

        let data = TabData {
            title: Some("Ada".into()),
            ..TabData::default()
        };
        store.save_tab_data("form-1", &data).await.unwrap();

        let student = store.get_student_by_key("form-1").await.unwrap().unwrap();
        assert_eq!(student.name, "Ada");
        let blob = store.get_tab_data("form-1").await.unwrap().unwrap();
        assert!(blob.updated_at.is_some());
    }

    #[tokio::test]
    async fn doc_save_tab_data_title_does_not_create_student() {
        let store = DocBackend::in_memory();

        let data = TabData {
            title: Some("Ghost".into()),
            ..TabData::default()
        };
        store.save_tab_data("ghost", &data).await.unwrap();

        assert!(store.get_student_by_key("ghost").await.unwrap().is_none());
        assert!(store.get_tab_data("ghost").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn doc_delete_removes_student_and_blob_together() {
        let store = DocBackend::in_memory();
        store.save_student(&Student::new("Ada", "ada", 0)).await.unwrap();
        store
            .save_tab_data(
                "ada",
                &TabData {
                    notes: "n".into(),
                    ..TabData::default()
                },
            )
            .await
            .unwrap();

        store.delete_student("ada").await.unwrap();

        assert!(store.get_student_by_key("ada").await.unwrap().is_none());
        assert!(store.get_tab_data("ada").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn doc_rename_moves_both_rows_atomically() {
        let store = DocBackend::in_memory();
        store.save_student(&Student::new("Ada", "ada", 3)).await.unwrap();
        store
            .save_tab_data(
                "ada",
                &TabData {
                    notes: "keep me".into(),
                    ..TabData::default()
                },
            )
            .await
            .unwrap();

        store.rename_student("ada", "ada-l", "Ada L").await.unwrap();

        assert!(store.get_student_by_key("ada").await.unwrap().is_none());
        assert!(store.get_tab_data("ada").await.unwrap().is_none());
        let student = store.get_student_by_key("ada-l").await.unwrap().unwrap();
        assert_eq!(student.name, "Ada L");
        assert_eq!(student.display_order, 3);
        let blob = store.get_tab_data("ada-l").await.unwrap().unwrap();
        assert_eq!(blob.notes, "keep me");
    }

    #[tokio::test]
    async fn doc_rename_refuses_existing_target() {
        let store = DocBackend::in_memory();
        store.save_student(&Student::new("Ada", "ada", 0)).await.unwrap();
        store.save_student(&Student::new("Ben", "ben", 1)).await.unwrap();

        let err = store.rename_student("ada", "ben", "Ada").await.unwrap_err();
        assert!(matches!(err, StoreError::RenameTargetExists(_)));
    }

    #[tokio::test]
    async fn doc_import_reassigns_display_order_from_bundle_position() {
        let store = DocBackend::in_memory();
        let bundle = ExportBundle::new(
            vec![
                Student::new("Zoe", "zoe", 40),
                Student::new("Ada", "ada", 7),
            ],
            BTreeMap::new(),
        );
        store.import_all(&bundle).await.unwrap();

        let students = store.get_students().await.unwrap();
        assert_eq!(students[0].storage_key, "zoe");
        assert_eq!(students[0].display_order, 0);
        assert_eq!(students[1].storage_key, "ada");
        assert_eq!(students[1].display_order, 1);
    }

    #[tokio::test]
    async fn doc_persists_across_reopen() {
        let tmp = tempfile::tempdir().unwrap();

        {
            let store = DocBackend::new(tmp.path());
            store.save_student(&Student::new("Ada", "ada", 0)).await.unwrap();
        }

        let store = DocBackend::new(tmp.path());
        assert!(store.has_data().await.unwrap());
        assert_eq!(
            store.get_student_by_key("ada").await.unwrap().unwrap().name,
            "Ada"
        );
    }

    #[tokio::test]
    async fn doc_is_available_cleans_up_probe() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DocBackend::new(tmp.path());

        assert!(store.is_available().await);
        assert!(!tmp.path().join(PROBE_DB).exists());
    }
}
