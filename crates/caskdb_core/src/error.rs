//! Error types for CaskDB core.

use caskdb_codec::CodecError;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in CaskDB core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Fatal record codec error (never a corrupted-data error).
    ///
    /// Codec I/O failures convert to [`CoreError::Io`] instead.
    #[error("codec error: {0}")]
    Codec(CodecError),

    /// The index could not be removed after a segment was truncated.
    ///
    /// The segment has already been replaced by its valid prefix, so the
    /// index may reference offsets past the new end of file. The store must
    /// not be opened in this state.
    #[error(
        "failed to invalidate index {} after truncating {}: {source}",
        index.display(),
        segment.display()
    )]
    IndexInvalidation {
        /// Path of the index file.
        index: PathBuf,
        /// Segment that was truncated.
        segment: PathBuf,
        /// Underlying failure.
        #[source]
        source: io::Error,
    },

    /// The metadata file does not exist.
    #[error("metadata not found: {}", path.display())]
    MetadataNotFound {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The metadata file exists but is not a well-formed record.
    #[error("malformed metadata in {}: {message}", path.display())]
    MetadataMalformed {
        /// Path of the metadata file.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// Store directory is locked by another process.
    #[error("store locked: another process has exclusive access")]
    DatabaseLocked,

    /// Invalid store layout.
    #[error("invalid store format: {message}")]
    InvalidFormat {
        /// Description of the format issue.
        message: String,
    },
}

impl From<CodecError> for CoreError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(err) => Self::Io(err),
            other => Self::Codec(other),
        }
    }
}

impl CoreError {
    /// Creates a malformed metadata error.
    pub fn metadata_malformed(path: &Path, message: impl Into<String>) -> Self {
        Self::MetadataMalformed {
            path: path.to_path_buf(),
            message: message.into(),
        }
    }

    /// Creates an invalid format error.
    pub fn invalid_format(message: impl Into<String>) -> Self {
        Self::InvalidFormat {
            message: message.into(),
        }
    }
}
