//! Store configuration.

use caskdb_codec::DecodeLimits;
use serde::{Deserialize, Serialize};

/// Default maximum key size in bytes.
pub const DEFAULT_MAX_KEY_SIZE: u32 = 64;

/// Default maximum value size in bytes.
pub const DEFAULT_MAX_VALUE_SIZE: u64 = 64 * 1024;

/// Configuration consumed by recovery and the store directory handle.
///
/// The owning engine may embed this in its own configuration file; every
/// field falls back to its default when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Maximum key size in bytes (0 = unlimited).
    pub max_key_size: u32,

    /// Maximum value size in bytes (0 = unlimited).
    pub max_value_size: u64,

    /// Permission bits for files written by this layer.
    pub file_mode: u32,

    /// Permission bits for a newly created store directory.
    pub dir_mode: u32,

    /// Whether to create the store directory if it doesn't exist.
    pub create_if_missing: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_key_size: DEFAULT_MAX_KEY_SIZE,
            max_value_size: DEFAULT_MAX_VALUE_SIZE,
            file_mode: 0o600,
            dir_mode: 0o700,
            create_if_missing: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum key size.
    #[must_use]
    pub const fn max_key_size(mut self, size: u32) -> Self {
        self.max_key_size = size;
        self
    }

    /// Sets the maximum value size.
    #[must_use]
    pub const fn max_value_size(mut self, size: u64) -> Self {
        self.max_value_size = size;
        self
    }

    /// Sets the file permission bits.
    #[must_use]
    pub const fn file_mode(mut self, mode: u32) -> Self {
        self.file_mode = mode;
        self
    }

    /// Sets the directory permission bits.
    #[must_use]
    pub const fn dir_mode(mut self, mode: u32) -> Self {
        self.dir_mode = mode;
        self
    }

    /// Sets whether to create the store directory if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Returns the decode limits forwarded to the record codec.
    #[must_use]
    pub const fn decode_limits(&self) -> DecodeLimits {
        DecodeLimits::new(self.max_key_size, self.max_value_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.max_key_size, 64);
        assert_eq!(config.max_value_size, 65536);
        assert_eq!(config.file_mode, 0o600);
        assert!(config.create_if_missing);
        assert_eq!(config.decode_limits(), DecodeLimits::default());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .max_key_size(128)
            .max_value_size(0)
            .create_if_missing(false);

        assert_eq!(config.decode_limits(), DecodeLimits::new(128, 0));
        assert!(!config.create_if_missing);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config: Config = serde_json::from_str(r#"{ "max_key_size": 255 }"#).unwrap();
        assert_eq!(config.max_key_size, 255);
        assert_eq!(config.max_value_size, DEFAULT_MAX_VALUE_SIZE);
        assert_eq!(config.dir_mode, 0o700);
    }
}
