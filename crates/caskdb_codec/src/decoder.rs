//! Streaming record decoder.

use crate::entry::{compute_checksum, Entry, HEADER_SIZE, TRAILER_SIZE};
use crate::error::{CodecError, CodecResult};
use std::io::{self, Read};

/// Upper bounds applied to length fields while decoding.
///
/// A corrupt header can claim an arbitrarily large key or value. The limits
/// bound what the decoder is willing to read for a single record. A limit of
/// `0` disables the corresponding check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodeLimits {
    /// Maximum key size in bytes.
    pub max_key_size: u32,
    /// Maximum value size in bytes.
    pub max_value_size: u64,
}

impl DecodeLimits {
    /// Creates limits from explicit key and value maxima.
    #[must_use]
    pub const fn new(max_key_size: u32, max_value_size: u64) -> Self {
        Self {
            max_key_size,
            max_value_size,
        }
    }

    /// Limits that accept any record size.
    #[must_use]
    pub const fn unlimited() -> Self {
        Self::new(0, 0)
    }

    fn check(&self, key_size: u32, value_size: u64) -> CodecResult<()> {
        if self.max_key_size > 0 && key_size > self.max_key_size {
            return Err(CodecError::LimitExceeded {
                field: "key",
                size: u64::from(key_size),
                limit: u64::from(self.max_key_size),
            });
        }
        if self.max_value_size > 0 && value_size > self.max_value_size {
            return Err(CodecError::LimitExceeded {
                field: "value",
                size: value_size,
                limit: self.max_value_size,
            });
        }
        Ok(())
    }
}

impl Default for DecodeLimits {
    fn default() -> Self {
        Self::new(64, 64 * 1024)
    }
}

/// Decodes records one at a time from a byte stream.
///
/// # Error Handling
///
/// - `Ok(None)`: clean end of stream on a record boundary
/// - `Err(e)` with [`CodecError::is_corrupted`]: torn or damaged record
/// - any other `Err`: fatal (I/O failure, or a limit violation by a record
///   that is present in full)
///
/// A header that claims more bytes than the stream still holds is reported
/// as [`CodecError::Truncated`] even when the claim also exceeds the limits.
/// Only a complete oversized record is a [`CodecError::LimitExceeded`].
///
/// After an error the offset is left at the start of the failed record, so
/// [`Decoder::offset`] is the length of the valid prefix.
///
/// # Example
///
/// ```
/// use caskdb_codec::{DecodeLimits, Decoder, Encoder, Entry};
///
/// let mut buf = Vec::new();
/// Encoder::new(&mut buf).encode(&Entry::new("k", "v")).unwrap();
///
/// let mut decoder = Decoder::new(buf.as_slice(), DecodeLimits::default());
/// let entry = decoder.decode().unwrap().unwrap();
/// assert_eq!(entry.key, b"k");
/// assert!(decoder.decode().unwrap().is_none());
/// ```
#[derive(Debug)]
pub struct Decoder<R> {
    reader: R,
    limits: DecodeLimits,
    offset: u64,
}

impl<R: Read> Decoder<R> {
    /// Creates a decoder over `reader`.
    pub fn new(reader: R, limits: DecodeLimits) -> Self {
        Self {
            reader,
            limits,
            offset: 0,
        }
    }

    /// Number of bytes consumed by successfully decoded records.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Consumes the decoder, returning the underlying reader.
    pub fn into_inner(self) -> R {
        self.reader
    }

    /// Decodes the next record.
    pub fn decode(&mut self) -> CodecResult<Option<Entry>> {
        let mut header = [0u8; HEADER_SIZE];
        let read = read_full(&mut self.reader, &mut header)?;
        if read == 0 {
            return Ok(None);
        }
        if read < HEADER_SIZE {
            return Err(CodecError::Truncated {
                needed: HEADER_SIZE as u64,
                available: read as u64,
            });
        }

        let key_size = u32::from_be_bytes([header[0], header[1], header[2], header[3]]);
        let value_size = u64::from_be_bytes([
            header[4], header[5], header[6], header[7], header[8], header[9], header[10],
            header[11],
        ]);

        if key_size == 0 {
            return Err(CodecError::invalid_frame("zero-length key"));
        }
        let body_len = u64::from(key_size)
            .checked_add(value_size)
            .and_then(|n| n.checked_add(TRAILER_SIZE as u64))
            .ok_or_else(|| CodecError::invalid_frame("record length overflows"))?;

        if let Err(err) = self.limits.check(key_size, value_size) {
            // Skip over the claimed body without buffering it.
            let mut rest = (&mut self.reader).take(body_len);
            let available = io::copy(&mut rest, &mut io::sink())?;
            if available < body_len {
                return Err(CodecError::Truncated {
                    needed: body_len,
                    available,
                });
            }
            return Err(err);
        }

        // Grow the buffer as bytes arrive instead of trusting the header.
        let mut body = Vec::new();
        let available = (&mut self.reader).take(body_len).read_to_end(&mut body)? as u64;
        if available < body_len {
            return Err(CodecError::Truncated {
                needed: body_len,
                available,
            });
        }

        let key_end = key_size as usize;
        let value_end = key_end + value_size as usize;
        let trailer = &body[value_end..];

        let stored = u32::from_be_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
        let expiry = u64::from_be_bytes([
            trailer[4], trailer[5], trailer[6], trailer[7], trailer[8], trailer[9], trailer[10],
            trailer[11],
        ]);

        let computed = compute_checksum(&body[..key_end], &body[key_end..value_end], expiry);
        if stored != computed {
            return Err(CodecError::ChecksumMismatch {
                expected: stored,
                actual: computed,
            });
        }

        body.truncate(value_end);
        let value = body.split_off(key_end);
        let key = body;

        self.offset += HEADER_SIZE as u64 + body_len;

        Ok(Some(Entry {
            key,
            value,
            checksum: stored,
            expiry: (expiry != 0).then_some(expiry),
        }))
    }
}

impl<R: Read> Iterator for Decoder<R> {
    type Item = CodecResult<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.decode().transpose()
    }
}

/// Fills `buf` as far as the stream allows, returning the number of bytes read.
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
