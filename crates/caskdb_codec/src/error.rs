//! Error types for the codec crate.

use std::io;
use thiserror::Error;

/// Result type for codec operations.
pub type CodecResult<T> = Result<T, CodecError>;

/// Errors that can occur while encoding or decoding segment records.
///
/// Decode failures fall into two classes. Corrupted-data errors
/// ([`CodecError::is_corrupted`]) describe a record that cannot be trusted:
/// a torn write, a bad checksum, or a frame whose lengths make no sense.
/// Everything else is fatal and must be surfaced to the caller unchanged.
#[derive(Debug, Error)]
pub enum CodecError {
    /// An I/O error occurred on the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The stream ended in the middle of a record.
    #[error("truncated record: needed {needed} bytes, found {available}")]
    Truncated {
        /// Bytes required to complete the frame section being read.
        needed: u64,
        /// Bytes actually available before end of stream.
        available: u64,
    },

    /// The stored checksum does not match the record contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the record contents.
        actual: u32,
    },

    /// The length framing is incoherent.
    #[error("invalid record frame: {message}")]
    InvalidFrame {
        /// Description of the framing problem.
        message: String,
    },

    /// A length field exceeds the configured decode limit.
    #[error("{field} size {size} exceeds limit {limit}")]
    LimitExceeded {
        /// Which length field was out of bounds.
        field: &'static str,
        /// The size found in the record header.
        size: u64,
        /// The configured limit.
        limit: u64,
    },
}

impl CodecError {
    /// Creates an invalid frame error.
    pub fn invalid_frame(message: impl Into<String>) -> Self {
        Self::InvalidFrame {
            message: message.into(),
        }
    }

    /// Returns `true` if this error means the record bytes are corrupt.
    ///
    /// Recovery truncates a segment at the first corrupted record. I/O
    /// failures and limit violations are not corruption: the bytes on disk
    /// may be perfectly valid, so they must never trigger truncation.
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        matches!(
            self,
            Self::Truncated { .. } | Self::ChecksumMismatch { .. } | Self::InvalidFrame { .. }
        )
    }
}
