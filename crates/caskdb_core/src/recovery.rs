//! Crash recovery for the newest segment.
//!
//! ## Contract with the write path
//!
//! Only the newest segment (the last one in creation order) can be mid-write
//! when the process dies. Every older segment was sealed before its
//! successor was created and is never written again. Recovery relies on this
//! and inspects the newest segment only.
//!
//! ## Recovery Policy
//!
//! The newest segment is decoded record by record and every decodable record
//! is re-encoded into a temporary file beside it. The scan stops at:
//!
//! - **Clean end of stream**: nothing to do, the temporary copy is removed.
//! - **Corrupted data** (torn frame, checksum mismatch, incoherent lengths):
//!   the temporary copy holds the longest valid prefix. The persisted index
//!   is deleted first, so the engine rebuilds it from segments, and then the
//!   copy atomically replaces the segment.
//! - **Anything else** (I/O failure, decode limit violation): fatal. The
//!   segment is left untouched and the temporary copy is removed.
//!
//! No partial record is ever reconstructed. Bytes after the first fault are
//! discarded for good.
//!
//! The caller must hold exclusive access to the store directory for the
//! whole call; this module takes no locks.

use crate::dir::{sync_directory, INDEX_FILE};
use crate::error::{CoreError, CoreResult};
use crate::guard::Guarded;
use crate::locator::{list_segments, parse_segment_id};
use caskdb_codec::{CodecError, DecodeLimits, Decoder, Encoder, Entry};
use std::fs::{self, File, Permissions};
use std::io::{self, BufReader, BufWriter, Read};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

/// Suffix of temporary files written while recovering a segment.
pub const RECOVERY_SUFFIX: &str = ".recovered";

/// Outcome of scanning a single segment.
#[derive(Debug)]
pub struct SegmentScan {
    /// Segment that was scanned.
    pub path: PathBuf,
    /// Number of valid records before the first fault (or end of file).
    pub records: u64,
    /// Length of the valid prefix in bytes.
    pub valid_bytes: u64,
    /// Size of the segment when the scan started.
    pub total_bytes: u64,
    /// The corrupted-data error that stopped the scan, if any.
    pub fault: Option<CodecError>,
}

impl SegmentScan {
    /// Returns whether the segment decoded cleanly to the end.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.fault.is_none()
    }

    /// Bytes following the valid prefix.
    #[must_use]
    pub fn discarded_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.valid_bytes)
    }
}

/// Outcome of [`recover_segment`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentRecovery {
    /// Whether the segment was replaced by its valid prefix.
    pub truncated: bool,
    /// Records kept in the segment.
    pub records_kept: u64,
    /// Bytes removed from the end of the segment.
    pub bytes_discarded: u64,
}

/// Outcome of [`check_and_recover`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryReport {
    /// The segment that was inspected, `None` for a store without segments.
    pub segment: Option<PathBuf>,
    /// Whether the segment was truncated.
    pub truncated: bool,
    /// Records kept in the inspected segment.
    pub records_kept: u64,
    /// Bytes removed from the inspected segment.
    pub bytes_discarded: u64,
    /// Whether an index file was deleted.
    pub index_removed: bool,
    /// Stale temporary files removed before the scan.
    pub stale_files_removed: usize,
}

impl RecoveryReport {
    /// Returns `true` if data was discarded and the index must be rebuilt.
    #[must_use]
    pub fn recovered(&self) -> bool {
        self.truncated
    }
}

/// Checks the newest segment in `dir` and recovers it if corrupted.
///
/// A store without segments is a no-op. If the newest segment has to be
/// truncated, the `index` file is deleted before the segment is replaced, so
/// a failure or crash at any later point leaves no index behind. Failing to
/// delete it returns [`CoreError::IndexInvalidation`]; the segment is still
/// truncated.
///
/// # Errors
///
/// Returns an error if the directory cannot be listed, the segment cannot be
/// scanned or replaced, or the index cannot be invalidated.
pub fn check_and_recover(dir: &Path, limits: &DecodeLimits) -> CoreResult<RecoveryReport> {
    let mut report = RecoveryReport {
        stale_files_removed: remove_stale_recovery_files(dir)?,
        ..RecoveryReport::default()
    };

    let segments = list_segments(dir)?;
    let Some(newest) = segments.last() else {
        debug!(dir = %dir.display(), "no segments, nothing to recover");
        return Ok(report);
    };

    debug!(
        dir = %dir.display(),
        segment = %newest.display(),
        sealed = segments.len() - 1,
        "checking newest segment"
    );

    let mut index_removed = false;
    let outcome = recover_segment_with(newest, limits, || {
        index_removed = invalidate_index(dir, newest)?;
        Ok(())
    })?;

    report.segment = Some(newest.clone());
    report.truncated = outcome.truncated;
    report.records_kept = outcome.records_kept;
    report.bytes_discarded = outcome.bytes_discarded;
    report.index_removed = index_removed;

    if outcome.truncated {
        info!(
            segment = %newest.display(),
            records_kept = outcome.records_kept,
            bytes_discarded = outcome.bytes_discarded,
            index_removed,
            "recovered segment, index must be rebuilt"
        );
    }

    Ok(report)
}

/// Truncates the segment at `path` to its longest valid prefix.
///
/// The segment is either left untouched or atomically replaced; there is no
/// point at which a partially written segment is visible at `path`.
///
/// # Errors
///
/// Returns an error on any I/O failure or fatal codec error. In that case the
/// segment is unchanged and no temporary file is left behind.
pub fn recover_segment(path: &Path, limits: &DecodeLimits) -> CoreResult<SegmentRecovery> {
    recover_segment_with(path, limits, || Ok(()))
}

/// Like [`recover_segment`], running `before_replace` once corruption is
/// confirmed and before the segment is touched.
///
/// A `before_replace` failure does not stop the replacement; it is returned
/// after the segment has been replaced.
fn recover_segment_with<F>(
    path: &Path,
    limits: &DecodeLimits,
    before_replace: F,
) -> CoreResult<SegmentRecovery>
where
    F: FnOnce() -> CoreResult<()>,
{
    let dir = parent_dir(path);
    let source = File::open(path)?;
    let source_meta = source.metadata()?;

    let mut decoder = Guarded::new(
        Decoder::new(BufReader::new(source), *limits),
        "segment reader",
    );

    let temp = tempfile::Builder::new()
        .prefix(&format!(".{}.", file_name(path)))
        .suffix(RECOVERY_SUFFIX)
        .tempfile_in(dir)?;
    let mut encoder = Guarded::new(Encoder::new(BufWriter::new(temp)), "recovery output");

    let scan = {
        let sink = encoder.get_mut();
        scan_records(path, source_meta.len(), decoder.get_mut(), |entry| {
            sink.encode(entry).map(|_| ())
        })
    };

    let ((scan, temp), ()) = decoder.finish(encoder.finish(scan))?;

    let outcome = SegmentRecovery {
        truncated: !scan.is_clean(),
        records_kept: scan.records,
        bytes_discarded: scan.discarded_bytes(),
    };

    let Some(fault) = scan.fault else {
        temp.close()?;
        debug!(segment = %path.display(), records = scan.records, "segment is clean");
        return Ok(outcome);
    };

    warn!(
        segment = %path.display(),
        offset = scan.valid_bytes,
        error = %fault,
        "corrupted record, truncating segment"
    );

    let prepared = before_replace();
    let replaced = replace_segment(temp, path, source_meta.permissions());

    if let (Err(_), Err(err)) = (&prepared, &replaced) {
        warn!(
            segment = %path.display(),
            error = %err,
            "segment replacement failed after an earlier error"
        );
    }
    prepared?;
    replaced?;
    Ok(outcome)
}

/// Atomically renames the recovered copy over the segment.
fn replace_segment(temp: NamedTempFile, path: &Path, permissions: Permissions) -> io::Result<()> {
    fs::set_permissions(temp.path(), permissions)?;
    temp.as_file().sync_all()?;
    temp.persist(path)?;
    sync_directory(parent_dir(path))
}

/// Scans the segment at `path` without modifying anything.
///
/// # Errors
///
/// Returns an error on I/O failure or a fatal codec error. Corrupted records
/// are reported in [`SegmentScan::fault`].
pub fn scan_segment(path: &Path, limits: &DecodeLimits) -> CoreResult<SegmentScan> {
    let source = File::open(path)?;
    let total_bytes = source.metadata()?.len();

    let mut decoder = Guarded::new(
        Decoder::new(BufReader::new(source), *limits),
        "segment reader",
    );
    let scan = scan_records(path, total_bytes, decoder.get_mut(), |_| Ok(()));
    let (scan, ()) = decoder.finish(scan)?;
    Ok(scan)
}

fn scan_records<R, F>(
    path: &Path,
    total_bytes: u64,
    decoder: &mut Decoder<R>,
    mut sink: F,
) -> CoreResult<SegmentScan>
where
    R: Read,
    F: FnMut(&Entry) -> Result<(), CodecError>,
{
    let mut records = 0;
    let fault = loop {
        match decoder.decode() {
            Ok(Some(entry)) => {
                sink(&entry)?;
                records += 1;
            }
            Ok(None) => break None,
            Err(err) if err.is_corrupted() => break Some(err),
            Err(err) => return Err(err.into()),
        }
    };

    Ok(SegmentScan {
        path: path.to_path_buf(),
        records,
        valid_bytes: decoder.offset(),
        total_bytes,
        fault,
    })
}

/// Deletes the persisted index. An index that is already absent is fine.
fn invalidate_index(dir: &Path, segment: &Path) -> CoreResult<bool> {
    let index = dir.join(INDEX_FILE);
    let fail = |source: io::Error| CoreError::IndexInvalidation {
        index: index.clone(),
        segment: segment.to_path_buf(),
        source,
    };

    match fs::remove_file(&index) {
        Ok(()) => {
            sync_directory(dir).map_err(fail)?;
            warn!(index = %index.display(), "removed stale index");
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            debug!(index = %index.display(), "no index to remove");
            Ok(false)
        }
        Err(err) => Err(fail(err)),
    }
}

/// Removes temporary files left by a recovery that was itself interrupted.
fn remove_stale_recovery_files(dir: &Path) -> CoreResult<usize> {
    let mut removed = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_stale = entry.file_name().to_str().is_some_and(is_recovery_file);
        if is_stale && entry.file_type()?.is_file() {
            fs::remove_file(entry.path())?;
            info!(file = %entry.path().display(), "removed stale recovery file");
            removed += 1;
        }
    }
    Ok(removed)
}

/// Matches `.<segment file name>.<random>.recovered`, the names
/// [`recover_segment`] gives its temporary copies.
fn is_recovery_file(name: &str) -> bool {
    let Some(inner) = name
        .strip_prefix('.')
        .and_then(|name| name.strip_suffix(RECOVERY_SUFFIX))
    else {
        return false;
    };
    inner
        .rsplit_once('.')
        .is_some_and(|(segment, random)| {
            !random.is_empty() && parse_segment_id(Path::new(segment)).is_some()
        })
}

fn parent_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::segment_file_name;
    use tempfile::{tempdir, TempDir};

    fn entries(n: usize) -> Vec<Entry> {
        (0..n)
            .map(|i| Entry::new(format!("key-{i}"), format!("value-{i}")))
            .collect()
    }

    fn encode(entries: &[Entry]) -> Vec<u8> {
        entries.iter().flat_map(Entry::to_bytes).collect()
    }

    fn decode_file(path: &Path) -> Vec<Entry> {
        let data = fs::read(path).unwrap();
        Decoder::new(data.as_slice(), DecodeLimits::default())
            .collect::<Result<_, _>>()
            .unwrap()
    }

    fn store_with(segments: &[Vec<u8>]) -> (TempDir, Vec<PathBuf>) {
        let dir = tempdir().unwrap();
        let paths = segments
            .iter()
            .enumerate()
            .map(|(id, bytes)| {
                let path = dir.path().join(segment_file_name(id as u64));
                fs::write(&path, bytes).unwrap();
                path
            })
            .collect();
        (dir, paths)
    }

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter(|e| {
                e.as_ref()
                    .unwrap()
                    .file_name()
                    .to_string_lossy()
                    .ends_with(RECOVERY_SUFFIX)
            })
            .count()
    }

    #[test]
    fn empty_store_is_noop() {
        let dir = tempdir().unwrap();
        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();
        assert_eq!(report, RecoveryReport::default());
        assert!(!report.recovered());
    }

    #[test]
    fn clean_segment_is_untouched() {
        let bytes = encode(&entries(5));
        let (dir, paths) = store_with(&[bytes.clone()]);
        fs::write(dir.path().join(INDEX_FILE), b"index").unwrap();

        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();

        assert!(!report.recovered());
        assert_eq!(report.records_kept, 5);
        assert_eq!(report.bytes_discarded, 0);
        assert!(!report.index_removed);
        assert_eq!(fs::read(&paths[0]).unwrap(), bytes);
        assert!(dir.path().join(INDEX_FILE).exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn empty_segment_is_clean() {
        let (dir, paths) = store_with(&[Vec::new()]);
        let outcome = recover_segment(&paths[0], &DecodeLimits::default()).unwrap();
        assert!(!outcome.truncated);
        assert_eq!(outcome.records_kept, 0);
        assert_eq!(fs::metadata(&paths[0]).unwrap().len(), 0);
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn torn_tail_is_truncated() {
        let kept = entries(3);
        let mut bytes = encode(&kept);
        let valid_len = bytes.len() as u64;
        let partial = Entry::new("key-3", "value-3").to_bytes();
        bytes.extend_from_slice(&partial[..partial.len() / 2]);

        let (dir, paths) = store_with(&[bytes]);
        fs::write(dir.path().join(INDEX_FILE), b"index").unwrap();

        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();

        assert!(report.recovered());
        assert!(report.index_removed);
        assert_eq!(report.records_kept, 3);
        assert_eq!(report.bytes_discarded, (partial.len() / 2) as u64);
        assert_eq!(fs::metadata(&paths[0]).unwrap().len(), valid_len);
        assert_eq!(decode_file(&paths[0]), kept);
        assert!(!dir.path().join(INDEX_FILE).exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn checksum_failure_drops_record_and_everything_after() {
        let all = entries(6);
        let mut bytes = encode(&all);
        // Flip a value byte of record 4 (index 3).
        let offset: u64 = all[..3].iter().map(Entry::encoded_size).sum();
        bytes[offset as usize + 12 + 5] ^= 0x55;

        let (_dir, paths) = store_with(&[bytes]);
        let outcome = recover_segment(&paths[0], &DecodeLimits::default()).unwrap();

        assert!(outcome.truncated);
        assert_eq!(outcome.records_kept, 3);
        assert_eq!(decode_file(&paths[0]), all[..3].to_vec());
    }

    #[test]
    fn only_newest_segment_is_inspected() {
        let mut sealed = encode(&entries(2));
        sealed.extend_from_slice(b"garbage in an old segment");
        let newest = encode(&entries(2));

        let (dir, paths) = store_with(&[sealed.clone(), newest.clone()]);
        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();

        assert_eq!(report.segment.as_deref(), Some(paths[1].as_path()));
        assert!(!report.recovered());
        assert_eq!(fs::read(&paths[0]).unwrap(), sealed);
        assert_eq!(fs::read(&paths[1]).unwrap(), newest);
    }

    #[test]
    fn missing_index_after_truncation_is_fine() {
        let mut bytes = encode(&entries(1));
        bytes.extend_from_slice(&[0, 0]);
        let (dir, _paths) = store_with(&[bytes]);

        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();
        assert!(report.recovered());
        assert!(!report.index_removed);
    }

    #[test]
    fn index_removal_failure_is_reported() {
        let kept = entries(2);
        let mut bytes = encode(&kept);
        bytes.extend_from_slice(&[0, 0, 1]);
        let (dir, paths) = store_with(&[bytes]);

        // A non-empty directory named `index` cannot be removed as a file.
        let index = dir.path().join(INDEX_FILE);
        fs::create_dir(&index).unwrap();
        fs::write(index.join("part"), b"x").unwrap();

        let err = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap_err();
        assert!(matches!(err, CoreError::IndexInvalidation { .. }));

        // The segment stays truncated.
        assert_eq!(decode_file(&paths[0]), kept);
    }

    #[test]
    fn limit_violation_is_fatal_and_leaves_segment_untouched() {
        let mut bytes = encode(&entries(2));
        bytes.extend_from_slice(&Entry::new(vec![b'k'; 100], "v").to_bytes());
        bytes.extend_from_slice(&[0xAB; 7]);

        let (dir, paths) = store_with(&[bytes.clone()]);
        fs::write(dir.path().join(INDEX_FILE), b"index").unwrap();

        let err = check_and_recover(dir.path(), &DecodeLimits::new(64, 0)).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Codec(CodecError::LimitExceeded { .. })
        ));
        assert_eq!(fs::read(&paths[0]).unwrap(), bytes);
        assert!(dir.path().join(INDEX_FILE).exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn stale_recovery_files_are_removed() {
        let (dir, _paths) = store_with(&[encode(&entries(1))]);
        let stale = dir.path().join(format!(".000000000.data.abc123{RECOVERY_SUFFIX}"));
        fs::write(&stale, b"half-written copy").unwrap();

        let foreign = dir.path().join(format!("notes{RECOVERY_SUFFIX}"));
        fs::write(&foreign, b"not ours").unwrap();

        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();
        assert_eq!(report.stale_files_removed, 1);
        assert!(!stale.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn recovery_file_names() {
        assert!(is_recovery_file(".000000007.data.Xy12ab.recovered"));
        assert!(!is_recovery_file("notes.recovered"));
        assert!(!is_recovery_file(".notes.Xy12ab.recovered"));
        assert!(!is_recovery_file(".000000007.data.recovered"));
        assert!(!is_recovery_file(".000000007.data.Xy12ab"));
        assert!(!is_recovery_file("000000007.data"));
    }

    #[test]
    fn index_is_removed_before_segment_is_replaced() {
        let kept = entries(2);
        let mut bytes = encode(&kept);
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        let (dir, paths) = store_with(&[bytes.clone()]);
        let index = dir.path().join(INDEX_FILE);
        fs::write(&index, b"index").unwrap();

        let mut segment_at_invalidation = Vec::new();
        let outcome = recover_segment_with(&paths[0], &DecodeLimits::default(), || {
            segment_at_invalidation = fs::read(&paths[0])?;
            invalidate_index(dir.path(), &paths[0]).map(|_| ())
        })
        .unwrap();

        assert!(outcome.truncated);
        assert_eq!(segment_at_invalidation, bytes);
        assert!(!index.exists());
        assert_eq!(decode_file(&paths[0]), kept);
    }

    #[test]
    fn failed_replacement_leaves_no_index() {
        let mut bytes = encode(&entries(2));
        bytes.extend_from_slice(&[0, 0, 0, 1]);
        let (dir, paths) = store_with(&[bytes]);
        let index = dir.path().join(INDEX_FILE);
        fs::write(&index, b"index").unwrap();

        // After the index is gone, make the rename onto the segment fail.
        let err = recover_segment_with(&paths[0], &DecodeLimits::default(), || {
            invalidate_index(dir.path(), &paths[0])?;
            fs::remove_file(&paths[0])?;
            fs::create_dir(&paths[0])?;
            fs::write(paths[0].join("occupied"), b"x")?;
            Ok(())
        })
        .unwrap_err();

        assert!(matches!(err, CoreError::Io(_)));
        assert!(!index.exists());
        assert_eq!(leftover_temp_files(dir.path()), 0);
    }

    #[test]
    fn sink_write_failure_is_io_error() {
        let bytes = encode(&entries(3));
        let mut decoder = Decoder::new(bytes.as_slice(), DecodeLimits::default());

        let err = scan_records(Path::new("segment"), 0, &mut decoder, |_| {
            Err(CodecError::Io(io::Error::new(
                io::ErrorKind::Other,
                "no space left",
            )))
        })
        .unwrap_err();
        assert!(matches!(err, CoreError::Io(ref e) if e.to_string() == "no space left"));
    }

    #[test]
    fn oversized_garbage_tail_is_truncated() {
        let kept = entries(3);
        let mut bytes = encode(&kept);
        bytes.extend_from_slice(&[0xFF; 20]);
        let (dir, paths) = store_with(&[bytes]);
        fs::write(dir.path().join(INDEX_FILE), b"index").unwrap();

        let report = check_and_recover(dir.path(), &DecodeLimits::default()).unwrap();

        assert!(report.recovered());
        assert_eq!(report.bytes_discarded, 20);
        assert_eq!(decode_file(&paths[0]), kept);
        assert!(!dir.path().join(INDEX_FILE).exists());
    }

    #[test]
    fn missing_segment_is_io_error() {
        let dir = tempdir().unwrap();
        let err = recover_segment(
            &dir.path().join(segment_file_name(1)),
            &DecodeLimits::default(),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn scan_reports_fault_without_modifying() {
        let mut bytes = encode(&entries(4));
        let valid_len = bytes.len() as u64;
        bytes.extend_from_slice(&[9; 5]);
        let (_dir, paths) = store_with(&[bytes.clone()]);

        let scan = scan_segment(&paths[0], &DecodeLimits::default()).unwrap();
        assert!(!scan.is_clean());
        assert_eq!(scan.records, 4);
        assert_eq!(scan.valid_bytes, valid_len);
        assert_eq!(scan.discarded_bytes(), 5);
        assert_eq!(fs::read(&paths[0]).unwrap(), bytes);
    }

    #[cfg(unix)]
    #[test]
    fn truncation_keeps_segment_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let mut bytes = encode(&entries(1));
        bytes.push(0);
        let (_dir, paths) = store_with(&[bytes]);
        fs::set_permissions(&paths[0], fs::Permissions::from_mode(0o640)).unwrap();

        assert!(recover_segment(&paths[0], &DecodeLimits::default())
            .unwrap()
            .truncated);
        let mode = fs::metadata(&paths[0]).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
