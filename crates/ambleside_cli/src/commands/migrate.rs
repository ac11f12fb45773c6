//! Migration commands.

use std::path::Path;
use tracing::info;

/// Run the legacy-to-document migration.
pub async fn run(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Running migration for {:?}", data_dir);

    let (_simple, _doc, migrator) = super::migration_parts(data_dir)?;

    let already_complete = migrator.is_complete();
    let report = migrator.migrate().await?;

    if already_complete {
        println!("Migration already complete.");
    } else {
        println!("Migration complete: {} students moved.", report.migrated);
    }
    Ok(())
}

/// Remove legacy data after a confirmed migration.
pub async fn cleanup(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let (_simple, _doc, migrator) = super::migration_parts(data_dir)?;

    migrator.clear_legacy_data().await?;
    println!("Legacy data cleared.");
    Ok(())
}
