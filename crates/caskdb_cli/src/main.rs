//! CaskDB CLI
//!
//! Command-line maintenance tools for CaskDB stores.
//!
//! # Commands
//!
//! - `recover` - Truncate the newest segment after a crash
//! - `verify` - Scan every segment without modifying anything
//! - `meta show` / `meta reset` - Inspect or reset consistency metadata

mod commands;

use caskdb_core::{DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// CaskDB command-line store tools.
#[derive(Parser)]
#[command(name = "caskdb")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the store directory
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
    /// Recover the newest segment and invalidate the index if needed
    Recover {
        /// Maximum key size in bytes (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_KEY_SIZE)]
        max_key_size: u32,

        /// Maximum value size in bytes (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_VALUE_SIZE)]
        max_value_size: u64,
    },

    /// Verify every segment without modifying the store
    Verify {
        /// Maximum key size in bytes (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_KEY_SIZE)]
        max_key_size: u32,

        /// Maximum value size in bytes (0 = unlimited)
        #[arg(long, default_value_t = DEFAULT_MAX_VALUE_SIZE)]
        max_value_size: u64,
    },

    /// Inspect or reset consistency metadata
    Meta {
        #[command(subcommand)]
        action: MetaAction,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum MetaAction {
    /// Print the stored metadata (or the default if none exists)
    Show {
        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Overwrite the metadata with the default
    Reset,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Recover {
            max_key_size,
            max_value_size,
        } => {
            let path = cli.path.ok_or("Store path required for recover")?;
            commands::recover::run(&path, max_key_size, max_value_size)?;
        }
        Commands::Verify {
            max_key_size,
            max_value_size,
        } => {
            let path = cli.path.ok_or("Store path required for verify")?;
            commands::verify::run(&path, max_key_size, max_value_size)?;
        }
        Commands::Meta { action } => {
            let path = cli.path.ok_or("Store path required for meta")?;
            match action {
                MetaAction::Show { format } => commands::meta::show(&path, &format)?,
                MetaAction::Reset => commands::meta::reset(&path)?,
            }
        }
        Commands::Version => {
            println!("CaskDB CLI v{}", env!("CARGO_PKG_VERSION"));
            println!("CaskDB Core v{}", caskdb_core::VERSION);
        }
    }

    Ok(())
}
