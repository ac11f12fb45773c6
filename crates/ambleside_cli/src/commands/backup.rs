//! Backup commands: export and import.

use ambleside_store::{select_backend, ExportBundle, RecordStore};
use std::fs;
use std::path::Path;
use tracing::info;

/// Export every student and schedule as one bundle.
pub async fn export(
    data_dir: &Path,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = select_backend(data_dir).await;
    let bundle = store.export_all().await?;
    let raw = serde_json::to_string_pretty(&bundle)?;

    match output {
        Some(path) => {
            fs::write(path, raw)?;
            info!("Exported {} students to {:?}", bundle.students.len(), path);
            println!("Exported {} students to {}", bundle.students.len(), path.display());
        }
        None => println!("{raw}"),
    }

    Ok(())
}

/// Import a bundle, replacing all existing data.
pub async fn import(data_dir: &Path, input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let raw = fs::read_to_string(input)?;
    let bundle = ExportBundle::parse_str(&raw)?;

    let store = select_backend(data_dir).await;
    store.import_all(&bundle).await?;

    println!("Imported {} students", bundle.students.len());
    Ok(())
}
