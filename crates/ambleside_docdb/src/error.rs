//! Error types for document store operations.

use std::io;
use thiserror::Error;

/// Result type for document store operations.
pub type DocDbResult<T> = Result<T, DocDbError>;

/// Errors that can occur in document store operations.
#[derive(Debug, Error)]
pub enum DocDbError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds the database lock.
    #[error("database locked: another process has exclusive access")]
    Locked,

    /// A document could not be encoded or decoded.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// The data file exists but is not a valid database snapshot.
    #[error("invalid database format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },

    /// The stored schema version is newer than the requested one.
    #[error("schema version mismatch: stored {stored}, requested {requested}")]
    VersionMismatch {
        /// Version recorded in the data file.
        stored: u32,
        /// Version the caller asked to open.
        requested: u32,
    },

    /// The named collection is not part of the schema.
    #[error("collection not found: {name}")]
    CollectionNotFound {
        /// Name of the collection.
        name: String,
    },

    /// The named index is not declared on the collection.
    #[error("index not found: {index} on collection {collection}")]
    IndexNotFound {
        /// Collection the index was looked up on.
        collection: String,
        /// Name of the index.
        index: String,
    },

    /// A document is missing its primary key field, or the field is not a
    /// string.
    #[error("document missing key field {field:?} in collection {collection}")]
    MissingKeyField {
        /// Collection the document was written to.
        collection: String,
        /// The declared key field.
        field: String,
    },

    /// A document is not a JSON object.
    #[error("document in collection {collection} is not a JSON object")]
    NotAnObject {
        /// Collection the document was written to.
        collection: String,
    },
}
