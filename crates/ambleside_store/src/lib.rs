//! # Ambleside Store
//!
//! Persistence subsystem for the Ambleside Weekly schedule editor.
//!
//! Students (one per tab) and their current-week schedule blobs live behind
//! one asynchronous [`RecordStore`] contract with two interchangeable
//! backends:
//!
//! - [`SimpleBackend`] - flat key-value persistence, backward compatible
//!   with the legacy on-disk format
//! - [`DocBackend`] - transactional document persistence with atomic
//!   multi-collection writes
//!
//! plus a one-time, idempotent, verified migration between them
//! ([`Migrator`]) and a session-entry selector ([`select_backend`]) that
//! picks the backend the rest of the application should use.
//!
//! After startup the application talks only to `dyn RecordStore`, never to
//! a concrete backend.
//!
//! ```rust
//! use ambleside_store::{RecordStore, SimpleBackend, Student};
//! use ambleside_kv::MemoryKv;
//! use std::sync::Arc;
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let store = SimpleBackend::new(Arc::new(MemoryKv::new()));
//! store.save_student(&Student::new("Ada", "ada", 0)).await.unwrap();
//! assert!(store.has_data().await.unwrap());
//! # });
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod debounce;
mod doc;
mod error;
mod migration;
mod model;
mod select;
mod simple;
mod slug;

pub use backend::RecordStore;
pub use debounce::DebounceManager;
pub use doc::{DocBackend, DB_NAME, DB_VERSION, SCHEDULES_COLLECTION, STUDENTS_COLLECTION};
pub use error::{StoreError, StoreResult};
pub use migration::{MigrationReport, Migrator, MIGRATION_FLAG_KEY};
pub use model::{ExportBundle, Schedule, Student, Subject, TabData, EXPORT_VERSION};
pub use select::{legacy_kv_path, select_backend};
pub use simple::{SimpleBackend, TAB_DATA_PREFIX, TAB_LIST_KEY};
pub use slug::{slugify, unique_storage_key};
