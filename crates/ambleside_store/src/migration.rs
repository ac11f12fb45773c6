//! One-time migration from the simple backend to the document backend.

use crate::backend::RecordStore;
use crate::error::{StoreError, StoreResult};
use ambleside_kv::KvStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Key under which the migration-complete flag is stored.
///
/// The flag lives in the legacy keyspace and, once set, is permanent: all
/// future migration checks short-circuit on it without touching either
/// backend.
pub const MIGRATION_FLAG_KEY: &str = "ambleside_migrated_to_idb";

/// Outcome of a completed migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    /// Number of students moved. Zero when the migration short-circuited.
    pub migrated: usize,
}

/// Coordinates the legacy-to-transactional move.
///
/// Legacy data is never deleted automatically; [`Migrator::clear_legacy_data`]
/// is a separate operator action, callable only once the flag is set.
pub struct Migrator {
    flags: Arc<dyn KvStore>,
    legacy: Arc<dyn RecordStore>,
    target: Arc<dyn RecordStore>,
}

impl Migrator {
    /// Creates a coordinator between `legacy` and `target`, with the
    /// completion flag persisted in `flags`.
    #[must_use]
    pub fn new(
        flags: Arc<dyn KvStore>,
        legacy: Arc<dyn RecordStore>,
        target: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            flags,
            legacy,
            target,
        }
    }

    /// Returns true once migration has completed, ever.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        matches!(self.flags.get(MIGRATION_FLAG_KEY), Ok(Some(v)) if v == "true")
    }

    /// Returns true if there is legacy data to move and the target holds
    /// nothing that would be clobbered.
    ///
    /// # Errors
    ///
    /// Returns an error if either backend cannot be read.
    pub async fn needs_migration(&self) -> StoreResult<bool> {
        if self.is_complete() {
            return Ok(false);
        }

        let has_legacy = self.legacy.has_data().await?;
        let has_target = self.target.has_data().await?;
        Ok(has_legacy && !has_target)
    }

    /// Runs the migration.
    ///
    /// Short-circuits to success (zero moved) when the flag is already
    /// set, when the target already has data, or when there is nothing to
    /// move. Otherwise exports everything from the legacy backend, imports
    /// it into the target, and verifies by comparing student counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::VerificationFailed`] on a count mismatch —
    /// the flag stays unset and legacy data is left intact so a future
    /// attempt can retry. Backend errors propagate likewise without
    /// setting the flag.
    pub async fn migrate(&self) -> StoreResult<MigrationReport> {
        if self.is_complete() {
            return Ok(MigrationReport { migrated: 0 });
        }

        self.target.init().await?;

        if self.target.has_data().await? {
            // The target already has independent data; never clobber it.
            self.mark_complete()?;
            return Ok(MigrationReport { migrated: 0 });
        }

        if !self.legacy.has_data().await? {
            self.mark_complete()?;
            return Ok(MigrationReport { migrated: 0 });
        }

        let bundle = self.legacy.export_all().await?;
        self.target.import_all(&bundle).await?;

        let migrated = self.target.get_students().await?.len();
        let expected = self.legacy.get_students().await?.len();
        if migrated != expected {
            warn!(expected, migrated, "migration verification failed");
            return Err(StoreError::VerificationFailed {
                expected,
                actual: migrated,
            });
        }

        self.mark_complete()?;
        info!(migrated, "migrated students to the document backend");
        Ok(MigrationReport { migrated })
    }

    /// Removes legacy data after a confirmed migration.
    ///
    /// This is an explicit operator action, not part of the automatic
    /// path.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::MigrationIncomplete`] if the flag is not yet
    /// set.
    pub async fn clear_legacy_data(&self) -> StoreResult<()> {
        if !self.is_complete() {
            return Err(StoreError::MigrationIncomplete);
        }

        for student in self.legacy.get_students().await? {
            self.legacy.delete_student(&student.storage_key).await?;
        }
        info!("legacy data cleared");
        Ok(())
    }

    fn mark_complete(&self) -> StoreResult<()> {
        self.flags.set(MIGRATION_FLAG_KEY, "true")?;
        Ok(())
    }
}
