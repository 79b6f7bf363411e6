//! # CaskDB Core
//!
//! Crash recovery and consistency metadata for CaskDB stores.
//!
//! This crate provides:
//! - Segment discovery in a store directory
//! - Crash recovery that truncates the newest segment to its valid prefix
//!   and invalidates the persisted index
//! - Durable storage for the index-freshness flag and reclaimable-space
//!   counter
//! - A locked store directory handle for callers
//!
//! Recovery must run once at startup, before the index is loaded and before
//! any read or write:
//!
//! ```rust,ignore
//! use caskdb_core::{check_and_recover, Config};
//!
//! let report = check_and_recover(store_path, &Config::default().decode_limits())?;
//! if report.recovered() {
//!     // the index file is gone; rebuild it from all segments
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod dir;
mod error;
pub mod guard;
pub mod locator;
mod metadata;
pub mod recovery;

pub use caskdb_codec::DecodeLimits;
pub use config::{Config, DEFAULT_MAX_KEY_SIZE, DEFAULT_MAX_VALUE_SIZE};
pub use dir::{StoreDir, INDEX_FILE, LOCK_FILE, METADATA_FILE};
pub use error::{CoreError, CoreResult};
pub use locator::{list_segments, parse_segment_id, segment_file_name};
pub use metadata::{Metadata, METADATA_VERSION};
pub use recovery::{
    check_and_recover, recover_segment, scan_segment, RecoveryReport, SegmentRecovery,
    SegmentScan,
};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
