//! Database directory management.
//!
//! This module handles the file system layout for a document database:
//!
//! ```text
//! <db_path>/
//! ├─ LOCK          # Advisory lock for single-writer
//! ├─ data.json     # Full snapshot (schema version + collections)
//! └─ data.tmp      # Transient, only during a commit
//! ```
//!
//! The LOCK file ensures only one process can open the database at a time.
//! Snapshots are swapped into place by renaming `data.tmp` over
//! `data.json`, so readers of the file never see a half-written commit.

use crate::error::{DocDbError, DocDbResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// File names within the database directory.
const DATA_FILE: &str = "data.json";
const LOCK_FILE: &str = "LOCK";
/// Temporary file for atomic snapshot writes.
const DATA_TEMP: &str = "data.tmp";

/// Manages the database directory structure and file locking.
///
/// # Thread Safety
///
/// The `DatabaseDir` holds an exclusive lock on the database directory.
/// Only one `DatabaseDir` instance can exist per directory at a time.
#[derive(Debug)]
pub struct DatabaseDir {
    /// Root directory path.
    path: PathBuf,
    /// Lock file handle (held for exclusive access).
    _lock_file: File,
}

impl DatabaseDir {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The path exists but is not a directory (`InvalidFormat`)
    /// - Another process holds the lock (`Locked`)
    /// - I/O errors occur
    pub fn open(path: &Path) -> DocDbResult<Self> {
        if !path.exists() {
            fs::create_dir_all(path)?;
        }

        if !path.is_dir() {
            return Err(DocDbError::InvalidFormat {
                message: format!("path is not a directory: {}", path.display()),
            });
        }

        let lock_path = path.join(LOCK_FILE);
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(DocDbError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the current snapshot, if one exists.
    pub fn read_snapshot(&self) -> DocDbResult<Option<String>> {
        let data_path = self.path.join(DATA_FILE);
        if !data_path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(data_path)?))
    }

    /// Writes a snapshot atomically: temp file first, then rename.
    pub fn write_snapshot(&self, raw: &str) -> DocDbResult<()> {
        let tmp_path = self.path.join(DATA_TEMP);
        fs::write(&tmp_path, raw)?;
        fs::rename(&tmp_path, self.path.join(DATA_FILE))?;
        Ok(())
    }
}
