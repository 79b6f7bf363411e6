//! In-memory segment entries.

/// Size of the record header: key_size (4) + value_size (8).
pub const HEADER_SIZE: usize = 12;

/// Size of the record trailer: checksum (4) + expiry (8).
pub const TRAILER_SIZE: usize = 12;

/// A single key/value record as held in memory after decoding.
///
/// `checksum` always covers the key, the value and the encoded expiry. It is
/// computed by the constructors and verified by the decoder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Record key. Never empty.
    pub key: Vec<u8>,
    /// Record value. May be empty.
    pub value: Vec<u8>,
    /// CRC-32 (IEEE) over key, value and expiry.
    pub checksum: u32,
    /// Expiry as Unix seconds. `Some(0)` is stored as "no expiry".
    pub expiry: Option<u64>,
}

impl Entry {
    /// Creates an entry without expiry.
    #[must_use]
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self::build(key.into(), value.into(), None)
    }

    /// Creates an entry that expires at `expiry` (Unix seconds).
    #[must_use]
    pub fn with_expiry(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>, expiry: u64) -> Self {
        Self::build(key.into(), value.into(), Some(expiry).filter(|&e| e != 0))
    }

    fn build(key: Vec<u8>, value: Vec<u8>, expiry: Option<u64>) -> Self {
        let checksum = compute_checksum(&key, &value, expiry.unwrap_or(0));
        Self {
            key,
            value,
            checksum,
            expiry,
        }
    }

    /// Returns the number of bytes this entry occupies on disk.
    #[must_use]
    pub fn encoded_size(&self) -> u64 {
        (HEADER_SIZE + self.key.len() + self.value.len() + TRAILER_SIZE) as u64
    }

    /// Encodes the entry to its on-disk representation.
    ///
    /// ```text
    /// | key_size (4) | value_size (8) | key | value | checksum (4) | expiry (8) |
    /// ```
    ///
    /// All integers are big-endian.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_size() as usize);

        buf.extend_from_slice(&(self.key.len() as u32).to_be_bytes());
        buf.extend_from_slice(&(self.value.len() as u64).to_be_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        buf.extend_from_slice(&self.checksum.to_be_bytes());
        buf.extend_from_slice(&self.expiry.unwrap_or(0).to_be_bytes());

        buf
    }
}

/// Computes the record checksum over key, value and raw expiry.
#[must_use]
pub fn compute_checksum(key: &[u8], value: &[u8], expiry: u64) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(key);
    hasher.update(value);
    hasher.update(&expiry.to_be_bytes());
    hasher.finalize()
}
