//! # Ambleside DocDB
//!
//! Embedded transactional document store for Ambleside Weekly.
//!
//! This crate provides the persistence engine the transactional backend is
//! built on:
//! - Named collections of JSON documents, keyed by a declared document field
//! - Versioned schema with upgrade-on-open
//! - Secondary indices for ordered reads
//! - Multi-collection transactions with all-or-nothing commit
//! - Single-writer file persistence behind an advisory lock
//!
//! ## Opening a Database
//!
//! ```rust
//! use ambleside_docdb::{Database, Schema, CollectionSpec};
//! use serde_json::json;
//!
//! let schema = Schema::new(1).collection(
//!     CollectionSpec::new("students", "storageKey").index("displayOrder"),
//! );
//!
//! let db = Database::open_in_memory(schema).unwrap();
//! db.transaction(|txn| {
//!     txn.put("students", json!({"storageKey": "ada", "displayOrder": 0}))?;
//!     Ok(())
//! })
//! .unwrap();
//!
//! assert_eq!(db.count("students").unwrap(), 1);
//! ```
//!
//! ## Durability Model
//!
//! Commits serialize the full dataset and swap it into place with a
//! temporary-file rename. The dataset is a handful of schedule blobs, so a
//! whole-snapshot rewrite is cheaper than maintaining a log, and the rename
//! gives the same all-or-nothing guarantee.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod database;
mod dir;
mod error;
mod schema;
mod txn;

pub use database::{Database, Document};
pub use error::{DocDbError, DocDbResult};
pub use schema::{CollectionSpec, IndexSpec, Schema};
pub use txn::Txn;
