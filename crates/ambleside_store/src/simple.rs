//! Simple backend: flat key-value persistence.

use crate::backend::RecordStore;
use crate::error::{StoreError, StoreResult};
use crate::model::{now_ms, ExportBundle, Schedule, Student, TabData};
use ambleside_kv::KvStore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Key under which the student directory list is stored.
pub const TAB_LIST_KEY: &str = "ambleside_tabs_v1";
/// Prefix for per-student schedule blob keys.
pub const TAB_DATA_PREFIX: &str = "ambleside_tab_v1:";

/// Probe key for availability checks.
const PROBE_KEY: &str = "__storage_test__";

/// One directory entry: the legacy on-disk shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TabEntry {
    title: String,
    storage_key: String,
}

/// Key-value persistence backend.
///
/// Stores the student directory as one serialized list under
/// [`TAB_LIST_KEY`] and each schedule blob under
/// [`TAB_DATA_PREFIX`]` + storageKey`. These slots are the legacy format:
/// they must keep reading data previously saved by older releases.
///
/// All operations are synchronous under the hood but exposed through the
/// same asynchronous contract as the document backend, so callers never
/// branch on backend type.
///
/// Multi-step operations here are best-effort, not transactional: a
/// failure between the blob write and the directory patch in
/// `save_tab_data` leaves the directory unpatched. Callers needing strict
/// atomicity use [`crate::DocBackend`].
#[derive(Clone)]
pub struct SimpleBackend {
    kv: Arc<dyn KvStore>,
}

impl SimpleBackend {
    /// Creates a backend over the given key-value store.
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Reads the directory list; malformed or missing contents degrade to
    /// an empty list.
    fn tab_list(&self) -> StoreResult<Vec<TabEntry>> {
        let Some(raw) = self.kv.get(TAB_LIST_KEY)? else {
            return Ok(Vec::new());
        };
        Ok(serde_json::from_str(&raw).unwrap_or_default())
    }

    fn set_tab_list(&self, entries: &[TabEntry]) -> StoreResult<()> {
        let raw = serde_json::to_string(entries)?;
        self.kv.set(TAB_LIST_KEY, &raw)?;
        Ok(())
    }

    fn blob_key(storage_key: &str) -> String {
        format!("{TAB_DATA_PREFIX}{storage_key}")
    }

    fn read_blob(&self, storage_key: &str) -> StoreResult<Option<TabData>> {
        let Some(raw) = self.kv.get(&Self::blob_key(storage_key))? else {
            return Ok(None);
        };
        Ok(serde_json::from_str(&raw).ok())
    }

    /// Upserts the directory entry for `storage_key`.
    fn patch_directory_title(&self, storage_key: &str, title: &str) -> StoreResult<()> {
        let mut list = self.tab_list()?;
        match list.iter_mut().find(|t| t.storage_key == storage_key) {
            Some(entry) => entry.title = title.to_string(),
            None => list.push(TabEntry {
                title: title.to_string(),
                storage_key: storage_key.to_string(),
            }),
        }
        self.set_tab_list(&list)
    }
}

#[async_trait]
impl RecordStore for SimpleBackend {
    async fn init(&self) -> StoreResult<()> {
        // The key-value store needs no initialization.
        Ok(())
    }

    async fn is_available(&self) -> bool {
        let probe = self.kv.set(PROBE_KEY, PROBE_KEY);
        if probe.is_err() {
            return false;
        }
        self.kv.remove(PROBE_KEY).is_ok()
    }

    async fn get_students(&self) -> StoreResult<Vec<Student>> {
        let list = self.tab_list()?;
        Ok(list
            .into_iter()
            .enumerate()
            .map(|(index, entry)| Student {
                id: entry.storage_key.clone(),
                name: entry.title,
                storage_key: entry.storage_key,
                display_order: index as u32,
                created_at: now_ms(),
            })
            .collect())
    }

    async fn get_student_by_key(&self, storage_key: &str) -> StoreResult<Option<Student>> {
        let students = self.get_students().await?;
        Ok(students.into_iter().find(|s| s.storage_key == storage_key))
    }

    async fn save_student(&self, student: &Student) -> StoreResult<()> {
        let mut list = self.tab_list()?;
        let entry = TabEntry {
            title: student.name.clone(),
            storage_key: student.storage_key.clone(),
        };
        match list
            .iter_mut()
            .find(|t| t.storage_key == student.storage_key)
        {
            Some(existing) => *existing = entry,
            None => list.push(entry),
        }
        self.set_tab_list(&list)
    }

    async fn delete_student(&self, storage_key: &str) -> StoreResult<()> {
        let list = self.tab_list()?;
        let filtered: Vec<TabEntry> = list
            .into_iter()
            .filter(|t| t.storage_key != storage_key)
            .collect();
        self.set_tab_list(&filtered)?;
        self.kv.remove(&Self::blob_key(storage_key))?;
        Ok(())
    }

    async fn get_schedule(
        &self,
        storage_key: &str,
        year: u32,
        week: u32,
    ) -> StoreResult<Option<Schedule>> {
        let Some(data) = self.read_blob(storage_key)? else {
            return Ok(None);
        };
        Ok(data.schedule_for(storage_key, year, week))
    }

    async fn get_tab_data(&self, storage_key: &str) -> StoreResult<Option<TabData>> {
        self.read_blob(storage_key)
    }

    async fn save_tab_data(&self, storage_key: &str, data: &TabData) -> StoreResult<()> {
        if storage_key.is_empty() {
            return Err(StoreError::MissingStorageKey);
        }

        let mut stamped = data.clone();
        stamped.updated_at = Some(now_ms());
        let raw = serde_json::to_string(&stamped)?;
        self.kv.set(&Self::blob_key(storage_key), &raw)?;

        // Keep the directory title consistent with the blob title.
        if let Some(title) = &stamped.title {
            self.patch_directory_title(storage_key, title)?;
        }
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
        if old_key != new_key {
            let list = self.tab_list()?;
            if list.iter().any(|t| t.storage_key == new_key) {
                return Err(StoreError::RenameTargetExists(new_key.to_string()));
            }

            // Copy the blob, verify the destination read, only then drop
            // the source. A failed destination write leaves the source
            // untouched.
            if let Some(raw) = self.kv.get(&Self::blob_key(old_key))? {
                self.kv.set(&Self::blob_key(new_key), &raw)?;
                let copied = self.kv.get(&Self::blob_key(new_key))?;
                if copied.as_deref() != Some(raw.as_str()) {
                    return Err(StoreError::RenameVerify(new_key.to_string()));
                }
                self.kv.remove(&Self::blob_key(old_key))?;
            }
        }

        let mut list = self.tab_list()?;
        match list.iter_mut().find(|t| t.storage_key == old_key) {
            Some(entry) => {
                entry.storage_key = new_key.to_string();
                entry.title = new_name.to_string();
            }
            None => list.push(TabEntry {
                title: new_name.to_string(),
                storage_key: new_key.to_string(),
            }),
        }
        self.set_tab_list(&list)
    }

    async fn export_all(&self) -> StoreResult<ExportBundle> {
        let students = self.get_students().await?;
        let mut tabs = BTreeMap::new();
        for student in &students {
            if let Some(data) = self.read_blob(&student.storage_key)? {
                tabs.insert(student.storage_key.clone(), data);
            }
        }
        Ok(ExportBundle::new(students, tabs))
    }

    async fn import_all(&self, bundle: &ExportBundle) -> StoreResult<()> {
        for student in self.get_students().await? {
            self.delete_student(&student.storage_key).await?;
        }

        for student in &bundle.students {
            self.save_student(student).await?;
            if let Some(data) = bundle.tabs.get(&student.storage_key) {
                // Blobs import verbatim; re-stamping updated_at here would
                // make an export/import cycle lossy.
                let raw = serde_json::to_string(data)?;
                self.kv.set(&Self::blob_key(&student.storage_key), &raw)?;
            }
        }
        Ok(())
    }

    async fn has_data(&self) -> StoreResult<bool> {
        Ok(!self.tab_list()?.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ambleside_kv::MemoryKv;
    use serde_json::json;

    fn backend() -> SimpleBackend {
        SimpleBackend::new(Arc::new(MemoryKv::new()))
    }

    #[tokio::test]
    async fn simple_is_available_on_working_store() {
        assert!(backend().is_available().await);
    }

    #[tokio::test]
    async fn simple_malformed_directory_degrades_to_empty() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(TAB_LIST_KEY, "{definitely not a list").unwrap();

        let store = SimpleBackend::new(kv);
        assert!(store.get_students().await.unwrap().is_empty());
        assert!(!store.has_data().await.unwrap());
    }

    #[tokio::test]
    async fn simple_malformed_blob_reads_as_absent() {
        let kv = Arc::new(MemoryKv::new());
        kv.set(&SimpleBackend::blob_key("ada"), "not json").unwrap();

        let store = SimpleBackend::new(kv);
        assert!(store.get_tab_data("ada").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn simple_save_tab_data_patches_directory_title() {
        let store = backend();
        store
            .save_student(&Student::new("Form 1", "form-1", 0))
            .await
            .unwrap();

        let data = TabData {
            title: Some("Ada".into()),
            ..TabData::default()
        };
        store.save_tab_data("form-1", &data).await.unwrap();

        let students = store.get_students().await.unwrap();
        assert_eq!(students[0].name, "Ada");
    }

    #[tokio::test]
    async fn simple_save_tab_data_without_title_leaves_directory_alone() {
        let store = backend();
        store
            .save_student(&Student::new("Ada", "ada", 0))
            .await
            .unwrap();

        store
            .save_tab_data("ada", &TabData::default())
            .await
            .unwrap();
        assert_eq!(store.get_students().await.unwrap()[0].name, "Ada");
    }

    #[tokio::test]
    async fn simple_save_tab_data_rejects_empty_key() {
        let err = backend()
            .save_tab_data("", &TabData::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::MissingStorageKey));
    }

    #[tokio::test]
    async fn simple_directory_order_defines_display_order() {
        let store = backend();
        store
            .save_student(&Student::new("Ada", "ada", 99))
            .await
            .unwrap();
        store
            .save_student(&Student::new("Ben", "ben", 0))
            .await
            .unwrap();

        let students = store.get_students().await.unwrap();
        assert_eq!(students[0].storage_key, "ada");
        assert_eq!(students[0].display_order, 0);
        assert_eq!(students[1].storage_key, "ben");
        assert_eq!(students[1].display_order, 1);
    }

    #[tokio::test]
    async fn simple_rename_moves_blob_and_directory_entry() {
        let store = backend();
        store
            .save_student(&Student::new("Ada", "ada", 0))
            .await
            .unwrap();
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

        store.rename_student("ada", "ada-lovelace", "Ada L").await.unwrap();

        assert!(store.get_tab_data("ada").await.unwrap().is_none());
        let moved = store.get_tab_data("ada-lovelace").await.unwrap().unwrap();
        assert_eq!(moved.notes, "keep me");

        let students = store.get_students().await.unwrap();
        assert_eq!(students.len(), 1);
        assert_eq!(students[0].storage_key, "ada-lovelace");
        assert_eq!(students[0].name, "Ada L");
    }

    #[tokio::test]
    async fn simple_rename_refuses_existing_target() {
        let store = backend();
        store
            .save_student(&Student::new("Ada", "ada", 0))
            .await
            .unwrap();
        store
            .save_student(&Student::new("Ben", "ben", 1))
            .await
            .unwrap();

        let err = store.rename_student("ada", "ben", "Ada").await.unwrap_err();
        assert!(matches!(err, StoreError::RenameTargetExists(_)));
    }

    #[tokio::test]
    async fn simple_blob_round_trips_unknown_fields() {
        let store = backend();
        store
            .save_student(&Student::new("Ada", "ada", 0))
            .await
            .unwrap();

        let data: TabData = serde_json::from_value(json!({
            "notes": "n",
            "uiOnlyField": [1, 2, 3]
        }))
        .unwrap();
        store.save_tab_data("ada", &data).await.unwrap();

        let back = store.get_tab_data("ada").await.unwrap().unwrap();
        assert_eq!(back.extra["uiOnlyField"], json!([1, 2, 3]));
        assert!(back.updated_at.is_some());
    }
}
