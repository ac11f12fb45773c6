//! Transaction state: buffered writes with read-your-writes.

use crate::database::{DbState, Document};
use crate::error::{DocDbError, DocDbResult};
use crate::schema::Schema;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// A buffered write operation.
#[derive(Debug, Clone)]
pub(crate) enum Op {
    /// Insert or replace one document.
    Put {
        /// Target collection.
        collection: String,
        /// Primary key extracted from the document.
        key: String,
        /// The document body.
        doc: Document,
    },
    /// Delete one document.
    Delete {
        /// Target collection.
        collection: String,
        /// Primary key.
        key: String,
    },
    /// Delete every document in a collection.
    Clear {
        /// Target collection.
        collection: String,
    },
}

/// A write transaction.
///
/// Operations are buffered until the transaction closure returns `Ok`;
/// nothing is visible to other readers (or durable) before commit, and
/// nothing at all is applied if the closure returns `Err`. Reads through
/// the transaction observe its own buffered writes.
///
/// Transactions may span any number of collections; the commit is
/// all-or-nothing across all of them.
pub struct Txn<'a> {
    schema: &'a Schema,
    base: &'a DbState,
    ops: Vec<Op>,
    /// Buffered view: key -> pending document (None = pending delete).
    overlay: HashMap<(String, String), Option<Document>>,
    /// Collections wiped earlier in this transaction.
    cleared: HashSet<String>,
}

impl<'a> Txn<'a> {
    pub(crate) fn new(schema: &'a Schema, base: &'a DbState) -> Self {
        Self {
            schema,
            base,
            ops: Vec::new(),
            overlay: HashMap::new(),
            cleared: HashSet::new(),
        }
    }

    /// Buffers an insert-or-replace of `doc` into `collection`.
    ///
    /// Returns the primary key extracted from the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema, the
    /// document is not a JSON object, or its key field is missing or not a
    /// string.
    pub fn put(&mut self, collection: &str, doc: Value) -> DocDbResult<String> {
        let spec = self
            .schema
            .get(collection)
            .ok_or_else(|| DocDbError::CollectionNotFound {
                name: collection.to_string(),
            })?;

        let Value::Object(doc) = doc else {
            return Err(DocDbError::NotAnObject {
                collection: collection.to_string(),
            });
        };

        let key = doc
            .get(&spec.key_field)
            .and_then(Value::as_str)
            .ok_or_else(|| DocDbError::MissingKeyField {
                collection: collection.to_string(),
                field: spec.key_field.clone(),
            })?
            .to_string();

        self.overlay
            .insert((collection.to_string(), key.clone()), Some(doc.clone()));
        self.ops.push(Op::Put {
            collection: collection.to_string(),
            key: key.clone(),
            doc,
        });
        Ok(key)
    }

    /// Buffers a delete of `key` from `collection`.
    ///
    /// Deleting a missing key is a no-op at commit time.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn delete(&mut self, collection: &str, key: &str) -> DocDbResult<()> {
        self.require_collection(collection)?;
        self.overlay
            .insert((collection.to_string(), key.to_string()), None);
        self.ops.push(Op::Delete {
            collection: collection.to_string(),
            key: key.to_string(),
        });
        Ok(())
    }

    /// Buffers a wipe of every document in `collection`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn clear(&mut self, collection: &str) -> DocDbResult<()> {
        self.require_collection(collection)?;
        self.overlay
            .retain(|(coll, _), _| coll != collection);
        self.cleared.insert(collection.to_string());
        self.ops.push(Op::Clear {
            collection: collection.to_string(),
        });
        Ok(())
    }

    /// Reads a document, observing this transaction's buffered writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the schema.
    pub fn get(&self, collection: &str, key: &str) -> DocDbResult<Option<Document>> {
        self.require_collection(collection)?;

        if let Some(pending) = self
            .overlay
            .get(&(collection.to_string(), key.to_string()))
        {
            return Ok(pending.clone());
        }
        if self.cleared.contains(collection) {
            return Ok(None);
        }
        Ok(self.base.document(collection, key))
    }

    pub(crate) fn into_ops(self) -> Vec<Op> {
        self.ops
    }

    fn require_collection(&self, collection: &str) -> DocDbResult<()> {
        if self.schema.get(collection).is_none() {
            return Err(DocDbError::CollectionNotFound {
                name: collection.to_string(),
            });
        }
        Ok(())
    }
}
