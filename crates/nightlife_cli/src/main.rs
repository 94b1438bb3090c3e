//! Nightlife CLI
//!
//! Command-line tools for persisted catalogue snapshots.
//!
//! # Commands
//!
//! - `inspect` - Display record counts by kind and status
//! - `verify` - Check uniqueness, field validity and references
//! - `export` - Print the snapshot as JSON

mod commands;

use clap::{Parser, Subcommand};
use commands::KindArg;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Nightlife directory snapshot tools.
#[derive(Parser)]
#[command(name = "nightlife")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the snapshot file
    #[arg(global = true, short, long)]
    path: Option<PathBuf>,

    /// Enable verbose output
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display record counts by kind and status
    Inspect {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Check uniqueness, field validity and references
    Verify,

    /// Print the snapshot as JSON
    Export {
        /// Only export this kind
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,
    },

    /// Show version information
    Version,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Inspect { format } => {
            let path = cli.path.ok_or("Snapshot path required for inspect")?;
            commands::inspect::run(&path, &format)?;
        }
        Commands::Verify => {
            let path = cli.path.ok_or("Snapshot path required for verify")?;
            commands::verify::run(&path)?;
        }
        Commands::Export { kind } => {
            let path = cli.path.ok_or("Snapshot path required for export")?;
            commands::export::run(&path, kind.map(Into::into))?;
        }
        Commands::Version => {
            println!("Nightlife CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("Nightlife Core v{}", nightlife_core::VERSION);
            println!("Nightlife Sync v{}", nightlife_sync::VERSION);
        }
    }

    Ok(())
}
