//! Ambleside Weekly CLI
//!
//! Command-line tools for managing schedule data.
//!
//! # Commands
//!
//! - `status` - Show backend availability, migration state, and counts
//! - `list` - List students from the active backend
//! - `show` - Print one student's schedule blob
//! - `export` - Write a full backup bundle
//! - `import` - Restore from a backup bundle
//! - `migrate` - Run the legacy-to-document migration
//! - `cleanup-legacy` - Remove legacy data after a confirmed migration

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Ambleside Weekly data management tools.
#[derive(Parser)]
#[command(name = "ambleside")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the data directory
    #[arg(global = true, short, long)]
    data_dir: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show backend availability, migration state, and record counts
    Status,

    /// List students from the active backend
    List,

    /// Print one student's schedule blob
    Show {
        /// The student's storage key
        storage_key: String,
    },

    /// Export every student and schedule as one bundle
    Export {
        /// Write the bundle here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import a bundle, replacing all existing data
    Import {
        /// Path to the bundle file
        input: PathBuf,
    },

    /// Run the legacy-to-document migration
    Migrate,

    /// Remove legacy data after a confirmed migration
    CleanupLegacy,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let data_dir = cli.data_dir.ok_or("Data directory required (--data-dir)")?;

    match cli.command {
        Commands::Status => commands::inspect::status(&data_dir).await?,
        Commands::List => commands::inspect::list(&data_dir).await?,
        Commands::Show { storage_key } => {
            commands::inspect::show(&data_dir, &storage_key).await?;
        }
        Commands::Export { output } => {
            commands::backup::export(&data_dir, output.as_deref()).await?;
        }
        Commands::Import { input } => commands::backup::import(&data_dir, &input).await?,
        Commands::Migrate => commands::migrate::run(&data_dir).await?,
        Commands::CleanupLegacy => commands::migrate::cleanup(&data_dir).await?,
    }

    Ok(())
}
