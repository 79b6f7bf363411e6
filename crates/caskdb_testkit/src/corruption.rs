//! Segment damage helpers.
//!
//! Each helper rewrites a file in place to simulate what a crash or a bad
//! disk leaves behind.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Removes the last `bytes` bytes of the file (a torn final write).
pub fn truncate_tail(path: &Path, bytes: u64) {
    let file = OpenOptions::new()
        .write(true)
        .open(path)
        .expect("Failed to open file");
    let len = file.metadata().expect("Failed to stat file").len();
    file.set_len(len.saturating_sub(bytes))
        .expect("Failed to truncate file");
}

/// XORs the byte at `offset` with `0xFF`.
pub fn flip_byte(path: &Path, offset: u64) {
    let mut data = fs::read(path).expect("Failed to read file");
    data[offset as usize] ^= 0xFF;
    fs::write(path, data).expect("Failed to write file");
}

/// Appends arbitrary bytes to the file.
pub fn append_garbage(path: &Path, garbage: &[u8]) {
    let mut file = OpenOptions::new()
        .append(true)
        .open(path)
        .expect("Failed to open file");
    file.write_all(garbage).expect("Failed to append");
}

/// Returns the file size in bytes.
pub fn file_len(path: &Path) -> u64 {
    fs::metadata(path).expect("Failed to stat file").len()
}
