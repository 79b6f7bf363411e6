//! # CaskDB Codec
//!
//! Segment record encoding/decoding for CaskDB.
//!
//! Every segment is a plain concatenation of length-framed records:
//!
//! ```text
//! | key_size (4) | value_size (8) | key | value | checksum (4) | expiry (8) |
//! ```
//!
//! All integers are big-endian. The checksum is CRC-32 (IEEE) over the key,
//! the value and the expiry field. An expiry of `0` means the record never
//! expires.
//!
//! The decoder classifies failures so callers can tell a torn or damaged
//! record ([`CodecError::is_corrupted`]) from a fatal one.
//!
//! ## Usage
//!
//! ```
//! use caskdb_codec::{DecodeLimits, Decoder, Encoder, Entry};
//!
//! let mut segment = Vec::new();
//! let mut encoder = Encoder::new(&mut segment);
//! encoder.encode(&Entry::new("user:1", "alice")).unwrap();
//! encoder.encode(&Entry::with_expiry("session", "token", 1_900_000_000)).unwrap();
//!
//! let entries: Vec<Entry> = Decoder::new(segment.as_slice(), DecodeLimits::default())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(entries.len(), 2);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod decoder;
mod encoder;
mod entry;
mod error;

pub use decoder::{DecodeLimits, Decoder};
pub use encoder::Encoder;
pub use entry::{compute_checksum, Entry, HEADER_SIZE, TRAILER_SIZE};
pub use error::{CodecError, CodecResult};
