//! Test fixtures and store helpers.

use caskdb_codec::{DecodeLimits, Decoder, Entry};
use caskdb_core::{segment_file_name, INDEX_FILE, METADATA_FILE};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A store directory that is removed when dropped.
pub struct TestStore {
    temp_dir: TempDir,
}

impl TestStore {
    /// Creates an empty store in a fresh temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the store directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Returns the path of segment `id`.
    pub fn segment_path(&self, id: u64) -> PathBuf {
        self.path().join(segment_file_name(id))
    }

    /// Returns the path of the index file.
    pub fn index_path(&self) -> PathBuf {
        self.path().join(INDEX_FILE)
    }

    /// Returns the path of the metadata file.
    pub fn metadata_path(&self) -> PathBuf {
        self.path().join(METADATA_FILE)
    }

    /// Writes segment `id` containing `entries` and returns its path.
    pub fn write_segment(&self, id: u64, entries: &[Entry]) -> PathBuf {
        let path = self.segment_path(id);
        fs::write(&path, encode_entries(entries)).expect("Failed to write segment");
        path
    }

    /// Writes a placeholder index file.
    pub fn write_index(&self) {
        fs::write(self.index_path(), b"persisted index").expect("Failed to write index");
    }

    /// Returns whether the index file exists.
    pub fn has_index(&self) -> bool {
        self.index_path().exists()
    }

    /// Names of all files in the store, sorted.
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(self.path())
            .expect("Failed to list store")
            .map(|e| {
                e.expect("Failed to read entry")
                    .file_name()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }
}

impl Default for TestStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Builds raw segment contents record by record.
///
/// ```rust,ignore
/// let bytes = SegmentBuilder::new()
///     .entry(Entry::new("a", "1"))
///     .raw(&[0xFF; 5])
///     .build();
/// ```
#[derive(Debug, Default, Clone)]
pub struct SegmentBuilder {
    bytes: Vec<u8>,
    boundaries: Vec<u64>,
}

impl SegmentBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an encoded record.
    pub fn entry(mut self, entry: Entry) -> Self {
        self.bytes.extend_from_slice(&entry.to_bytes());
        self.boundaries.push(self.bytes.len() as u64);
        self
    }

    /// Appends encoded records.
    pub fn entries(self, entries: &[Entry]) -> Self {
        entries.iter().cloned().fold(self, Self::entry)
    }

    /// Appends bytes that are not a record.
    pub fn raw(mut self, bytes: &[u8]) -> Self {
        self.bytes.extend_from_slice(bytes);
        self
    }

    /// Offsets at which each appended record ends.
    pub fn boundaries(&self) -> &[u64] {
        &self.boundaries
    }

    /// Returns the segment bytes.
    pub fn build(self) -> Vec<u8> {
        self.bytes
    }

    /// Writes the segment to `path`.
    pub fn write_to(self, path: &Path) {
        fs::write(path, self.bytes).expect("Failed to write segment");
    }
}

/// Encodes entries back to back, exactly as a segment stores them.
pub fn encode_entries(entries: &[Entry]) -> Vec<u8> {
    entries.iter().flat_map(Entry::to_bytes).collect()
}

/// Decodes every record of the segment at `path`, panicking on any error.
pub fn read_segment(path: &Path) -> Vec<Entry> {
    let data = fs::read(path).expect("Failed to read segment");
    Decoder::new(data.as_slice(), DecodeLimits::unlimited())
        .collect::<Result<_, _>>()
        .expect("Segment does not decode cleanly")
}

/// Deterministic entries `key-0000`..`key-NNNN` with distinct values.
pub fn sample_entries(count: usize) -> Vec<Entry> {
    (0..count)
        .map(|i| {
            let key = format!("key-{i:04}");
            let value = format!("value-{i}-{}", "x".repeat(i % 17));
            if i % 5 == 4 {
                Entry::with_expiry(key, value, 1_900_000_000 + i as u64)
            } else {
                Entry::new(key, value)
            }
        })
        .collect()
}
