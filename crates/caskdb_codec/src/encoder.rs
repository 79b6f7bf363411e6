//! Streaming record encoder.

use crate::entry::Entry;
use crate::error::CodecResult;
use std::io::Write;

/// Encodes records one at a time into a byte stream.
///
/// The encoder writes each record with a single `write_all` call and does
/// no buffering of its own; wrap the writer in a `BufWriter` for file output.
#[derive(Debug)]
pub struct Encoder<W> {
    writer: W,
    bytes_written: u64,
}

impl<W: Write> Encoder<W> {
    /// Creates an encoder over `writer`.
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            bytes_written: 0,
        }
    }

    /// Encodes `entry`, returning the number of bytes written.
    pub fn encode(&mut self, entry: &Entry) -> CodecResult<u64> {
        let bytes = entry.to_bytes();
        self.writer.write_all(&bytes)?;
        self.bytes_written += bytes.len() as u64;
        Ok(bytes.len() as u64)
    }

    /// Total bytes written by this encoder.
    #[must_use]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Returns a reference to the underlying writer.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Consumes the encoder, returning the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CodecError;
    use std::io;

    #[test]
    fn counts_bytes() {
        let first = Entry::new(b"a".to_vec(), b"1".to_vec());
        let second = Entry::new(b"bb".to_vec(), b"22".to_vec());

        let mut encoder = Encoder::new(Vec::new());
        assert_eq!(encoder.encode(&first).unwrap(), first.encoded_size());
        assert_eq!(encoder.encode(&second).unwrap(), second.encoded_size());
        assert_eq!(
            encoder.bytes_written(),
            first.encoded_size() + second.encoded_size()
        );
        assert_eq!(encoder.get_ref().len() as u64, encoder.bytes_written());
    }

    #[test]
    fn write_failure_is_io_error() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Other, "no space left"))
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }

        let mut encoder = Encoder::new(Full);
        let err = encoder
            .encode(&Entry::new(b"k".to_vec(), b"v".to_vec()))
            .unwrap_err();
        assert!(matches!(err, CodecError::Io(_)));
        assert_eq!(encoder.bytes_written(), 0);
    }
}
