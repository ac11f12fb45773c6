//! # Ambleside KV
//!
//! Synchronous key-value capability for Ambleside Weekly.
//!
//! This crate provides the lowest-level storage primitive the legacy
//! (simple) persistence backend is built on: a flat, string-keyed,
//! string-valued store with synchronous semantics. It is deliberately
//! dumb — it does not understand tab lists, schedule blobs, or the
//! migration flag. Interpretation of the stored values belongs to
//! `ambleside_store`.
//!
//! ## Available Stores
//!
//! - [`MemoryKv`] - For testing and ephemeral sessions
//! - [`FileKv`] - Persistent, one JSON object file on disk
//!
//! ## Example
//!
//! ```rust
//! use ambleside_kv::{KvStore, MemoryKv};
//!
//! let kv = MemoryKv::new();
//! kv.set("greeting", "hello").unwrap();
//! assert_eq!(kv.get("greeting").unwrap().as_deref(), Some("hello"));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;

pub use error::{KvError, KvResult};
pub use file::FileKv;
pub use memory::MemoryKv;
pub use store::KvStore;
