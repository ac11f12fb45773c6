//! Inspection commands: status, list, show.

use ambleside_store::{select_backend, RecordStore};
use std::path::Path;
use tracing::info;

/// Show backend availability, migration state, and record counts.
pub async fn status(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    info!("Checking status for {:?}", data_dir);

    let (simple, doc, migrator) = super::migration_parts(data_dir)?;

    println!("Backend Status");
    println!("==============");
    println!("  Simple backend available:   {}", simple.is_available().await);
    println!("  Document backend available: {}", doc.is_available().await);
    println!("  Migration complete:         {}", migrator.is_complete());

    let legacy_count = simple.get_students().await?.len();
    println!("  Legacy students:            {legacy_count}");

    match doc.init().await {
        Ok(()) => {
            let doc_count = doc.get_students().await?.len();
            println!("  Document students:          {doc_count}");
        }
        Err(e) => println!("  Document students:          unavailable ({e})"),
    }

    Ok(())
}

/// List students from the active backend.
pub async fn list(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let store = select_backend(data_dir).await;
    let students = store.get_students().await?;

    println!("Students");
    println!("========");
    if students.is_empty() {
        println!("  No students stored.");
    } else {
        for student in &students {
            println!(
                "  {}: {} [{}]",
                student.display_order, student.name, student.storage_key
            );
        }
    }

    Ok(())
}

/// Print one student's schedule blob as JSON.
pub async fn show(data_dir: &Path, storage_key: &str) -> Result<(), Box<dyn std::error::Error>> {
    let store = select_backend(data_dir).await;

    match store.get_tab_data(storage_key).await? {
        Some(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        None => println!("No schedule stored for {storage_key}"),
    }

    Ok(())
}
