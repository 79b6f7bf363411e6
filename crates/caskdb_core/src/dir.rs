//! Store directory management.
//!
//! This module handles the file system layout of a store:
//!
//! ```text
//! <store>/
//! ├─ 000000000.data    # Segments, numbered in creation order
//! ├─ 000000001.data
//! ├─ index             # Persisted index (absent = rebuild from segments)
//! ├─ meta.json         # Consistency metadata
//! └─ LOCK              # Advisory lock for single-process access
//! ```
//!
//! Recovery itself never locks. [`StoreDir`] is how a caller obtains the
//! exclusive access recovery assumes.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::locator::{list_segments, segment_file_name};
use crate::metadata::Metadata;
use crate::recovery::{check_and_recover, RecoveryReport};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

/// Name of the persisted index file.
pub const INDEX_FILE: &str = "index";

/// Name of the consistency metadata file.
pub const METADATA_FILE: &str = "meta.json";

/// Name of the advisory lock file.
pub const LOCK_FILE: &str = "LOCK";

/// An exclusively locked store directory.
///
/// The lock is released when the handle is dropped.
///
/// # Example
///
/// ```rust,ignore
/// use caskdb_core::{Config, StoreDir};
///
/// let config = Config::default();
/// let store = StoreDir::open(Path::new("my_store"), &config)?;
/// let report = store.recover(&config)?;
/// let meta = store.load_metadata_or_default()?;
/// if report.recovered() || !meta.index_up_to_date {
///     // rebuild the index from segments
/// }
/// ```
#[derive(Debug)]
pub struct StoreDir {
    path: PathBuf,
    _lock_file: File,
}

impl StoreDir {
    /// Opens or creates a store directory and takes its lock.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the store directory
    /// * `config` - Supplies `create_if_missing` and the directory mode
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory doesn't exist and `config.create_if_missing` is false
    /// - The path is not a directory
    /// - Another process holds the lock ([`CoreError::DatabaseLocked`])
    /// - I/O errors occur
    pub fn open(path: &Path, config: &Config) -> CoreResult<Self> {
        // Create directory if needed
        if !path.exists() {
            if config.create_if_missing {
                create_dir_all(path, config.dir_mode)?;
            } else {
                return Err(CoreError::invalid_format(format!(
                    "store directory does not exist: {}",
                    path.display()
                )));
            }
        }

        // Verify it's a directory
        if !path.is_dir() {
            return Err(CoreError::invalid_format(format!(
                "path is not a directory: {}",
                path.display()
            )));
        }

        // Acquire exclusive lock (non-blocking)
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;

        if lock_file.try_lock_exclusive().is_err() {
            return Err(CoreError::DatabaseLocked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock_file: lock_file,
        })
    }

    /// Returns the path to the store directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the path to the index file.
    #[must_use]
    pub fn index_path(&self) -> PathBuf {
        self.path.join(INDEX_FILE)
    }

    /// Returns the path to the metadata file.
    #[must_use]
    pub fn metadata_path(&self) -> PathBuf {
        self.path.join(METADATA_FILE)
    }

    /// Returns the path of segment `id`.
    #[must_use]
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.path.join(segment_file_name(id))
    }

    /// Lists segment files, oldest first.
    pub fn segments(&self) -> CoreResult<Vec<PathBuf>> {
        list_segments(&self.path)
    }

    /// Returns whether a persisted index exists.
    #[must_use]
    pub fn has_index(&self) -> bool {
        self.index_path().exists()
    }

    /// Runs crash recovery on the newest segment.
    pub fn recover(&self, config: &Config) -> CoreResult<RecoveryReport> {
        check_and_recover(&self.path, &config.decode_limits())
    }

    /// Loads metadata, falling back to [`Metadata::default`] if none exists.
    ///
    /// Malformed metadata is still an error.
    pub fn load_metadata_or_default(&self) -> CoreResult<Metadata> {
        match Metadata::load(&self.metadata_path()) {
            Err(CoreError::MetadataNotFound { .. }) => Ok(Metadata::default()),
            other => other,
        }
    }

    /// Persists metadata using the configured file mode.
    pub fn save_metadata(&self, metadata: &Metadata, config: &Config) -> CoreResult<()> {
        metadata.save(&self.metadata_path(), config.file_mode)
    }
}

#[cfg(unix)]
fn create_dir_all(path: &Path, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(mode).create(path)
}

#[cfg(not(unix))]
fn create_dir_all(path: &Path, _mode: u32) -> io::Result<()> {
    fs::create_dir_all(path)
}

/// Syncs a directory so that creates, renames and deletes in it are durable.
///
/// Windows NTFS journals metadata operations and does not support directory
/// fsync, so this is a no-op there.
#[cfg(unix)]
pub(crate) fn sync_directory(path: &Path) -> io::Result<()> {
    File::open(path)?.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_directory(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn open_creates_directory() {
        let temp = tempdir().unwrap();
        let store_path = temp.path().join("new_store");

        let store = StoreDir::open(&store_path, &Config::default()).unwrap();
        assert!(store_path.is_dir());
        assert!(store_path.join(LOCK_FILE).exists());
        assert!(store.segments().unwrap().is_empty());
    }

    #[test]
    fn open_fails_if_not_exists_and_no_create() {
        let temp = tempdir().unwrap();
        let config = Config::default().create_if_missing(false);

        let result = StoreDir::open(&temp.path().join("nonexistent"), &config);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn open_rejects_file_path() {
        let temp = tempdir().unwrap();
        let file = temp.path().join("plain");
        fs::write(&file, b"").unwrap();

        let result = StoreDir::open(&file, &Config::default());
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn lock_prevents_second_open() {
        let temp = tempdir().unwrap();
        let _store = StoreDir::open(temp.path(), &Config::default()).unwrap();

        let result = StoreDir::open(temp.path(), &Config::default());
        assert!(matches!(result, Err(CoreError::DatabaseLocked)));
    }

    #[test]
    fn lock_released_on_drop() {
        let temp = tempdir().unwrap();
        {
            let _store = StoreDir::open(temp.path(), &Config::default()).unwrap();
        }
        let _again = StoreDir::open(temp.path(), &Config::default()).unwrap();
    }

    #[test]
    fn paths_are_correct() {
        let temp = tempdir().unwrap();
        let store = StoreDir::open(temp.path(), &Config::default()).unwrap();

        assert_eq!(store.index_path(), temp.path().join("index"));
        assert_eq!(store.metadata_path(), temp.path().join("meta.json"));
        assert_eq!(store.segment_path(3), temp.path().join("000000003.data"));
    }

    #[test]
    fn metadata_default_when_absent() {
        let temp = tempdir().unwrap();
        let config = Config::default();
        let store = StoreDir::open(temp.path(), &config).unwrap();

        assert_eq!(store.load_metadata_or_default().unwrap(), Metadata::default());

        let meta = Metadata::new(true, 512);
        store.save_metadata(&meta, &config).unwrap();
        assert_eq!(store.load_metadata_or_default().unwrap(), meta);
    }

    #[test]
    fn malformed_metadata_is_not_defaulted() {
        let temp = tempdir().unwrap();
        let store = StoreDir::open(temp.path(), &Config::default()).unwrap();
        fs::write(store.metadata_path(), b"{").unwrap();

        assert!(matches!(
            store.load_metadata_or_default(),
            Err(CoreError::MetadataMalformed { .. })
        ));
    }

    #[test]
    fn recover_through_handle() {
        let temp = tempdir().unwrap();
        let config = Config::default();
        let store = StoreDir::open(temp.path(), &config).unwrap();

        let mut bytes = caskdb_codec::Entry::new("k", "v").to_bytes();
        bytes.extend_from_slice(&[1, 2, 3]);
        fs::write(store.segment_path(0), &bytes).unwrap();
        fs::write(store.index_path(), b"stale").unwrap();

        let report = store.recover(&config).unwrap();
        assert!(report.recovered());
        assert!(!store.has_index());
    }
}
