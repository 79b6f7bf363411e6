//! Verify command implementation.

use caskdb_codec::DecodeLimits;
use caskdb_core::{list_segments, scan_segment, SegmentScan};
use std::path::Path;

/// Verification result for a whole store.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of segments checked.
    pub segments_checked: usize,
    /// Number of valid records across all segments.
    pub valid_records: u64,
    /// Segments with a fault, with the fault description.
    pub faults: Vec<(String, String)>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Runs the verify command.
pub fn run(
    path: &Path,
    max_key_size: u32,
    max_value_size: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("Verifying store at {:?}", path);
    println!();

    let result = verify(path, &DecodeLimits::new(max_key_size, max_value_size))?;

    println!();
    println!(
        "{} segment(s), {} valid record(s)",
        result.segments_checked, result.valid_records
    );
    if result.is_ok() {
        println!("✓ Store verification passed");
        Ok(())
    } else {
        println!("✗ Store verification failed");
        Err("Verification failed".into())
    }
}

/// Scans every segment in `path` and collects faults.
///
/// Fatal errors (such as a record over the size limits) are reported as
/// faults of the segment they occur in rather than aborting the run.
pub fn verify(path: &Path, limits: &DecodeLimits) -> caskdb_core::CoreResult<VerifyResult> {
    let mut result = VerifyResult::default();

    for segment in list_segments(path)? {
        let name = segment.display().to_string();
        result.segments_checked += 1;

        match scan_segment(&segment, limits) {
            Ok(scan) => {
                print_scan(&scan);
                result.valid_records += scan.records;
                if let Some(fault) = scan.fault {
                    result.faults.push((name, fault.to_string()));
                }
            }
            Err(err) => {
                println!("{name}: error: {err}");
                result.faults.push((name, err.to_string()));
            }
        }
    }

    Ok(result)
}

fn print_scan(scan: &SegmentScan) {
    match &scan.fault {
        None => println!(
            "{}: {} record(s), {} bytes, ok",
            scan.path.display(),
            scan.records,
            scan.total_bytes
        ),
        Some(fault) => println!(
            "{}: {} record(s), fault at offset {} ({} bytes unreadable): {}",
            scan.path.display(),
            scan.records,
            scan.valid_bytes,
            scan.discarded_bytes(),
            fault
        ),
    }
}
