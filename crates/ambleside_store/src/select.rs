//! Backend selection at session start.

use crate::backend::RecordStore;
use crate::doc::DocBackend;
use crate::migration::Migrator;
use crate::simple::SimpleBackend;
use ambleside_kv::{FileKv, KvStore, MemoryKv};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// File name of the legacy key-value slots, under the data directory.
const LEGACY_KV_FILE: &str = "legacy_kv.json";

/// Returns the path of the legacy key-value file under `data_dir`.
///
/// The simple backend's three slots (directory list, per-student blobs,
/// migration flag) all live in this one file.
#[must_use]
pub fn legacy_kv_path(data_dir: &Path) -> std::path::PathBuf {
    data_dir.join(LEGACY_KV_FILE)
}

/// Picks the backend the rest of the session should use.
///
/// Runs once per session start:
/// 1. If the document backend is unavailable, returns the simple backend
///    (no migration attempted).
/// 2. Initializes the document backend; an initialization failure also
///    falls back.
/// 3. Runs the migration if needed; a migration failure is logged and the
///    simple backend is returned — persistence degrades, it never crashes
///    the application.
/// 4. Otherwise returns the document backend.
///
/// This function never fails; the caller always gets a usable store.
pub async fn select_backend(data_dir: &Path) -> Arc<dyn RecordStore> {
    let kv: Arc<dyn KvStore> = match FileKv::open(&legacy_kv_path(data_dir)) {
        Ok(kv) => Arc::new(kv),
        Err(e) => {
            warn!(error = %e, "legacy key-value file unusable, using in-memory store");
            Arc::new(MemoryKv::new())
        }
    };

    let simple: Arc<SimpleBackend> = Arc::new(SimpleBackend::new(Arc::clone(&kv)));
    let doc: Arc<DocBackend> = Arc::new(DocBackend::new(data_dir));

    if !doc.is_available().await {
        info!("document backend not available, using simple backend");
        return simple;
    }

    if let Err(e) = doc.init().await {
        warn!(error = %e, "document backend failed to initialize, using simple backend");
        return simple;
    }

    let migrator = Migrator::new(
        kv,
        Arc::clone(&simple) as Arc<dyn RecordStore>,
        Arc::clone(&doc) as Arc<dyn RecordStore>,
    );

    match migrator.needs_migration().await {
        Ok(true) => {
            info!("migrating data to the document backend");
            if let Err(e) = migrator.migrate().await {
                warn!(error = %e, "migration failed, falling back to simple backend");
                return simple;
            }
        }
        Ok(false) => {}
        Err(e) => {
            warn!(error = %e, "migration check failed, falling back to simple backend");
            return simple;
        }
    }

    doc
}
