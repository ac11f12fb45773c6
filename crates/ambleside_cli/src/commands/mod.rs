//! CLI command implementations.

pub mod backup;
pub mod inspect;
pub mod migrate;

use ambleside_kv::{FileKv, KvStore};
use ambleside_store::{legacy_kv_path, DocBackend, Migrator, RecordStore, SimpleBackend};
use std::path::Path;
use std::sync::Arc;

/// Builds the migration coordinator and its two concrete backends.
pub(crate) fn migration_parts(
    data_dir: &Path,
) -> Result<(Arc<SimpleBackend>, Arc<DocBackend>, Migrator), Box<dyn std::error::Error>> {
    let kv: Arc<dyn KvStore> = Arc::new(FileKv::open(&legacy_kv_path(data_dir))?);
    let simple = Arc::new(SimpleBackend::new(Arc::clone(&kv)));
    let doc = Arc::new(DocBackend::new(data_dir));
    let migrator = Migrator::new(
        kv,
        Arc::clone(&simple) as Arc<dyn RecordStore>,
        Arc::clone(&doc) as Arc<dyn RecordStore>,
    );
    Ok((simple, doc, migrator))
}
