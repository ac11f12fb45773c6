//! Error types for key-value operations.

use std::io;
use thiserror::Error;

/// Result type for key-value operations.
pub type KvResult<T> = Result<T, KvError>;

/// Errors that can occur during key-value operations.
#[derive(Debug, Error)]
pub enum KvError {
    /// An I/O error occurred while reading or writing the backing file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The store contents could not be serialized for persistence.
    #[error("serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}
