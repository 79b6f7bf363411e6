//! Segment discovery.
//!
//! Segment files live directly under the store directory and are named
//! `<id>.data`, with `id` a zero-padded decimal that increases with creation
//! order. Anything else in the directory is ignored.

use crate::error::CoreResult;
use std::fs;
use std::path::{Path, PathBuf};

/// File extension of segment files.
pub const SEGMENT_EXTENSION: &str = "data";

/// Returns the file name for segment `id` (e.g. `000000042.data`).
#[must_use]
pub fn segment_file_name(id: u64) -> String {
    format!("{id:09}.{SEGMENT_EXTENSION}")
}

/// Parses the segment id from a segment path.
///
/// Returns `None` for anything that is not `<digits>.data`.
#[must_use]
pub fn parse_segment_id(path: &Path) -> Option<u64> {
    if path.extension()? != SEGMENT_EXTENSION {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.is_empty() || !stem.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    stem.parse().ok()
}

/// Lists the segment files in `dir`, oldest first.
///
/// Ordering is by numeric id, so it matches creation order even if ids
/// outgrow their zero padding.
pub fn list_segments(dir: &Path) -> CoreResult<Vec<PathBuf>> {
    let mut segments = Vec::new();

    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(id) = parse_segment_id(&path) else {
            continue;
        };
        if !entry.file_type()?.is_file() {
            continue;
        }
        segments.push((id, path));
    }

    segments.sort_by_key(|&(id, _)| id);
    Ok(segments.into_iter().map(|(_, path)| path).collect())
}
