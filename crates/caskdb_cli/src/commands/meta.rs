//! Metadata commands.

use caskdb_core::{Config, Metadata, StoreDir, METADATA_VERSION};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Serialize)]
struct MetaView {
    path: String,
    exists: bool,
    version: u32,
    index_up_to_date: bool,
    reclaimable_space: u64,
}

/// Prints the stored metadata.
pub fn show(path: &Path, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default().create_if_missing(false);
    let store = StoreDir::open(path, &config)?;
    let exists = store.metadata_path().exists();
    let meta = store.load_metadata_or_default()?;

    let view = MetaView {
        path: store.metadata_path().display().to_string(),
        exists,
        version: METADATA_VERSION,
        index_up_to_date: meta.index_up_to_date,
        reclaimable_space: meta.reclaimable_space,
    };

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&view)?),
        "text" => {
            println!("Metadata: {}", view.path);
            if !view.exists {
                println!("  (not present, showing defaults)");
            }
            println!("  Version:           {}", view.version);
            println!("  Index up to date:  {}", view.index_up_to_date);
            println!("  Reclaimable space: {} bytes", view.reclaimable_space);
        }
        other => return Err(format!("Unknown format: {other}").into()),
    }

    Ok(())
}

/// Overwrites the metadata with the default.
pub fn reset(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default().create_if_missing(false);
    let store = StoreDir::open(path, &config)?;
    store.save_metadata(&Metadata::default(), &config)?;
    println!("✓ Metadata reset, index will be rebuilt on next open");
    Ok(())
}
