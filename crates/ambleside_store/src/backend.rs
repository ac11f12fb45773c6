//! Record store trait definition.

use crate::error::StoreResult;
use crate::model::{ExportBundle, Schedule, Student, TabData};
use async_trait::async_trait;

/// The capability contract every persistence backend implements.
///
/// All operations are asynchronous so callers never branch on backend
/// type: the simple backend completes synchronously under the hood, the
/// document backend may suspend on file I/O, and both sit behind
/// `Arc<dyn RecordStore>`.
///
/// # Invariants
///
/// - `storage_key` is unique across all students at all times
/// - A deleted student takes its schedule blob with it; no orphan blobs
///   survive `delete_student`
/// - `get_students` orders by `display_order` ascending, ties stable
///   across calls
///
/// # Implementors
///
/// - [`crate::SimpleBackend`] - flat key-value persistence
/// - [`crate::DocBackend`] - transactional document persistence
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Prepares the backend for use (opens connections, creates schemas).
    ///
    /// Idempotent — safe to call multiple times.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be brought up.
    async fn init(&self) -> StoreResult<()>;

    /// Probes, without failing, whether this backend can be used in the
    /// current environment.
    async fn is_available(&self) -> bool;

    /// Returns all students ordered by `display_order` ascending.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn get_students(&self) -> StoreResult<Vec<Student>>;

    /// Returns the student with the given storage key, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn get_student_by_key(&self, storage_key: &str) -> StoreResult<Option<Student>>;

    /// Creates or updates a student, keyed by `storage_key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the write cannot be persisted.
    async fn save_student(&self, student: &Student) -> StoreResult<()>;

    /// Removes a student and its schedule blob.
    ///
    /// From the caller's perspective the removal is atomic: no state where
    /// one exists without the other is observable afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    async fn delete_student(&self, storage_key: &str) -> StoreResult<()>;

    /// Returns the stored schedule only if its stored `(year, week)`
    /// exactly equals the requested pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn get_schedule(
        &self,
        storage_key: &str,
        year: u32,
        week: u32,
    ) -> StoreResult<Option<Schedule>>;

    /// Returns a student's raw schedule blob, independent of year/week.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn get_tab_data(&self, storage_key: &str) -> StoreResult<Option<TabData>>;

    /// Saves a student's schedule blob, stamping `updated_at`.
    ///
    /// If the blob carries a `title`, the owning student's name is patched
    /// to match, keeping directory and blob titles consistent.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::MissingStorageKey`] for an empty key,
    /// or an error if the write cannot be persisted.
    async fn save_tab_data(&self, storage_key: &str, data: &TabData) -> StoreResult<()>;

    /// Moves a student (and its blob) to a new storage key and name.
    ///
    /// The destination is verified before the source is deleted; a failure
    /// partway leaves the source intact.
    ///
    /// # Errors
    ///
    /// Returns [`crate::StoreError::RenameTargetExists`] if `new_key`
    /// already belongs to another student, or
    /// [`crate::StoreError::RenameVerify`] if the destination readback
    /// does not match.
    async fn rename_student(
        &self,
        old_key: &str,
        new_key: &str,
        new_name: &str,
    ) -> StoreResult<()>;

    /// Exports every student and its blob (if any) as one bundle.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn export_all(&self) -> StoreResult<ExportBundle>;

    /// Replaces all existing students and blobs with the bundle's
    /// contents, preserving each student's relative order as given.
    ///
    /// # Errors
    ///
    /// Returns an error if the replacement cannot be persisted.
    async fn import_all(&self, bundle: &ExportBundle) -> StoreResult<()>;

    /// Returns true iff at least one student exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying store cannot be read.
    async fn has_data(&self) -> StoreResult<bool>;
}
