//! Consistency metadata.
//!
//! A small JSON document kept next to the segments:
//!
//! ```json
//! { "version": 1, "index_up_to_date": true, "reclaimable_space": 1024 }
//! ```
//!
//! The on-disk schema is defined by [`MetadataFile`] and is independent of
//! the in-memory [`Metadata`] type. Files written before the schema carried a
//! `version` field are read as version 1.

use crate::dir::sync_directory;
use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Current metadata schema version.
pub const METADATA_VERSION: u32 = 1;

/// Durability-relevant state of a store.
///
/// The owning engine decides when to mutate and persist it; this type only
/// knows how to store and load itself. When no file exists the caller
/// supplies its own default, normally [`Metadata::default`] (index not up to
/// date, nothing reclaimable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Metadata {
    /// `true` only right after a full index persist with no mutation since.
    pub index_up_to_date: bool,
    /// Bytes made obsolete by overwrites and deletes.
    pub reclaimable_space: u64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct MetadataFile {
    #[serde(default = "legacy_version")]
    version: u32,
    index_up_to_date: bool,
    reclaimable_space: u64,
}

fn legacy_version() -> u32 {
    1
}

impl Metadata {
    /// Creates metadata with the given fields.
    #[must_use]
    pub const fn new(index_up_to_date: bool, reclaimable_space: u64) -> Self {
        Self {
            index_up_to_date,
            reclaimable_space,
        }
    }

    /// Records that the index no longer reflects the segments.
    pub fn mark_index_stale(&mut self) {
        self.index_up_to_date = false;
    }

    /// Records that the index was just persisted in full.
    pub fn mark_index_fresh(&mut self) {
        self.index_up_to_date = true;
    }

    /// Adds obsolete bytes to the reclaimable counter.
    pub fn add_reclaimable(&mut self, bytes: u64) {
        self.reclaimable_space = self.reclaimable_space.saturating_add(bytes);
    }

    /// Resets the reclaimable counter after compaction.
    pub fn reset_reclaimable(&mut self) {
        self.reclaimable_space = 0;
    }

    /// Writes the metadata to `path` with permission bits `mode`.
    ///
    /// The document is written to a sibling temporary file, synced, and
    /// renamed over `path`, so an interrupted save leaves any previous file
    /// intact. `mode` is ignored on non-Unix platforms.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or renamed.
    pub fn save(&self, path: &Path, mode: u32) -> CoreResult<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let file = MetadataFile {
            version: METADATA_VERSION,
            index_up_to_date: self.index_up_to_date,
            reclaimable_space: self.reclaimable_space,
        };
        let data = serde_json::to_vec_pretty(&file).map_err(io::Error::from)?;

        let mut temp = tempfile::Builder::new()
            .prefix(".meta.")
            .suffix(".tmp")
            .tempfile_in(dir)?;
        temp.write_all(&data)?;
        set_mode(temp.path(), mode)?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(io::Error::from)?;
        sync_directory(dir)?;

        Ok(())
    }

    /// Reads metadata from `path`.
    ///
    /// # Errors
    ///
    /// - [`CoreError::MetadataNotFound`] if `path` does not exist
    /// - [`CoreError::MetadataMalformed`] if the content is not a valid record
    /// - [`CoreError::Io`] for any other read failure
    pub fn load(path: &Path) -> CoreResult<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(CoreError::MetadataNotFound {
                    path: path.to_path_buf(),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let file: MetadataFile = serde_json::from_slice(&data)
            .map_err(|err| CoreError::metadata_malformed(path, err.to_string()))?;

        if file.version != METADATA_VERSION {
            return Err(CoreError::metadata_malformed(
                path,
                format!("unsupported metadata version: {}", file.version),
            ));
        }

        Ok(Self {
            index_up_to_date: file.index_up_to_date,
            reclaimable_space: file.reclaimable_space,
        })
    }
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
    Ok(())
}
