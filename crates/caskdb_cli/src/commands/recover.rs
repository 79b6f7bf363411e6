//! Recover command implementation.

use caskdb_core::{Config, RecoveryReport, StoreDir};
use std::path::Path;
use tracing::debug;

/// Runs the recover command.
pub fn run(
    path: &Path,
    max_key_size: u32,
    max_value_size: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default()
        .max_key_size(max_key_size)
        .max_value_size(max_value_size)
        .create_if_missing(false);

    let report = recover(path, &config)?;
    print_report(path, &report);
    Ok(())
}

/// Locks the store and runs crash recovery on it.
pub fn recover(path: &Path, config: &Config) -> caskdb_core::CoreResult<RecoveryReport> {
    let store = StoreDir::open(path, config)?;
    debug!(store = %path.display(), "acquired store lock");
    store.recover(config)
}

fn print_report(path: &Path, report: &RecoveryReport) {
    println!("Recovering store at {:?}", path);
    println!();

    if report.stale_files_removed > 0 {
        println!(
            "Removed {} leftover recovery file(s)",
            report.stale_files_removed
        );
    }

    let Some(segment) = &report.segment else {
        println!("No segments found, nothing to recover");
        return;
    };

    println!("Newest segment: {}", segment.display());
    println!("  Records kept:    {}", report.records_kept);

    if report.recovered() {
        println!("  Bytes discarded: {}", report.bytes_discarded);
        if report.index_removed {
            println!("  Index removed, rebuild required");
        } else {
            println!("  No index present, rebuild required");
        }
        println!();
        println!("✓ Segment truncated to its last valid record");
    } else {
        println!();
        println!("✓ Segment is intact");
    }
}
