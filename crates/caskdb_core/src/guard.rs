//! Scoped release of file handles.
//!
//! Closing a handle can fail (a buffered writer flushes on release). The
//! failure must not hide an error that is already in flight, and must not be
//! lost when nothing else failed. [`Guarded::finish`] releases the resource
//! and merges both outcomes, first error wins.

use crate::error::{CoreError, CoreResult};
use caskdb_codec::{Decoder, Encoder};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use tempfile::NamedTempFile;
use tracing::warn;

/// A resource that is released explicitly rather than on drop.
pub trait Release {
    /// What remains after release (for example the file behind a writer).
    type Output;

    /// Releases the resource, reporting any failure.
    fn release(self) -> io::Result<Self::Output>;
}

impl Release for BufReader<File> {
    type Output = ();

    fn release(self) -> io::Result<()> {
        drop(self);
        Ok(())
    }
}

impl Release for BufWriter<NamedTempFile> {
    type Output = NamedTempFile;

    fn release(self) -> io::Result<NamedTempFile> {
        self.into_inner().map_err(io::IntoInnerError::into_error)
    }
}

impl<R: Read + Release> Release for Decoder<R> {
    type Output = R::Output;

    fn release(self) -> io::Result<R::Output> {
        self.into_inner().release()
    }
}

impl<W: Write + Release> Release for Encoder<W> {
    type Output = W::Output;

    fn release(self) -> io::Result<W::Output> {
        self.into_inner().release()
    }
}

/// Owns a resource until the operation using it has produced a result.
#[derive(Debug)]
pub struct Guarded<R> {
    resource: R,
    name: &'static str,
}

impl<R: Release> Guarded<R> {
    /// Wraps `resource`; `name` identifies it in logs.
    pub fn new(resource: R, name: &'static str) -> Self {
        Self { resource, name }
    }

    /// Mutable access to the guarded resource.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    /// Releases the resource and merges the outcome into `result`.
    ///
    /// - `result` failed: the release outcome is logged and discarded
    /// - `result` succeeded, release failed: the release error is returned
    /// - both succeeded: the value is returned with the release output
    pub fn finish<T>(self, result: CoreResult<T>) -> CoreResult<(T, R::Output)> {
        let released = self.resource.release();
        match (result, released) {
            (Ok(value), Ok(output)) => Ok((value, output)),
            (Ok(_), Err(err)) => Err(CoreError::Io(err)),
            (Err(err), Ok(_)) => Err(err),
            (Err(err), Err(release_err)) => {
                warn!(
                    resource = self.name,
                    error = %release_err,
                    "release failed after an earlier error"
                );
                Err(err)
            }
        }
    }
}
