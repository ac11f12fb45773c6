//! Error types for the persistence subsystem.

use ambleside_docdb::DocDbError;
use ambleside_kv::KvError;
use thiserror::Error;

/// Result type for persistence operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in persistence operations.
///
/// Malformed stored JSON is deliberately absent here: unparseable
/// directory lists and blobs degrade to absent/empty results instead of
/// failing the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend cannot be used in this environment.
    #[error("storage backend unavailable")]
    Unavailable,

    /// An import bundle is missing its required shape.
    #[error("invalid import bundle: {0}")]
    InvalidBundle(String),

    /// A save was attempted without a resolvable storage key.
    #[error("no storage key resolved for this operation")]
    MissingStorageKey,

    /// The underlying key-value store reported an error mid-operation.
    #[error("key-value store error: {0}")]
    Kv(#[from] KvError),

    /// The underlying document store reported an error mid-operation.
    #[error("document store error: {0}")]
    Db(#[from] DocDbError),

    /// Post-import record counts disagree; legacy data was left intact.
    #[error("migration verification failed: moved {actual} of {expected} students")]
    VerificationFailed {
        /// Student count in the legacy store.
        expected: usize,
        /// Student count found in the target store after import.
        actual: usize,
    },

    /// Legacy cleanup was requested before migration completed.
    #[error("cannot clear legacy data before migration is complete")]
    MigrationIncomplete,

    /// A rename would overwrite an unrelated student.
    #[error("rename target already exists: {0}")]
    RenameTargetExists(String),

    /// A renamed blob did not read back from its destination.
    #[error("rename verification failed for {0}: destination does not match source")]
    RenameVerify(String),

    /// A value could not be encoded for storage.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
