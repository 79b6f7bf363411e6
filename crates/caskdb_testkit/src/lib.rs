//! # CaskDB Testkit
//!
//! Test utilities for CaskDB.
//!
//! This crate provides:
//! - Temporary stores populated with segment files
//! - Helpers that damage segments the way a crash or bad disk would
//! - Property-based generators for entries
//!
//! ## Usage
//!
//! ```rust,ignore
//! use caskdb_testkit::prelude::*;
//!
//! let store = TestStore::new();
//! let path = store.write_segment(1, &sample_entries(10));
//! truncate_tail(&path, 5);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod corruption;
pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::corruption::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use corruption::*;
pub use fixtures::*;
pub use generators::*;
