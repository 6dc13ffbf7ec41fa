//! Configuration management for scan readers

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// How 8-digit numeric records are classified
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EightDigitSymbology {
    /// Read as EAN-8
    Ean8,
    /// Read as UPC-E and expanded to UPC-A before checking
    Upce,
}

impl Default for EightDigitSymbology {
    fn default() -> Self {
        Self::Ean8
    }
}

/// Scan reader configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReaderConfig {
    /// Inactivity delay before an unterminated tail is flushed (0 = never)
    #[serde(default = "default_flush_timeout_ms")]
    pub flush_timeout_ms: u64,

    /// Assembly buffer ceiling in bytes
    #[serde(default = "default_max_buffer_bytes")]
    pub max_buffer_bytes: usize,

    /// Symbology assumed for 8-digit numeric records
    #[serde(default)]
    pub eight_digit_symbology: EightDigitSymbology,

    /// Drop one prefix and one suffix character added by the scanner
    #[serde(default)]
    pub strip_envelope: bool,

    /// Pending chunk capacity between transport and reader task
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            flush_timeout_ms: default_flush_timeout_ms(),
            max_buffer_bytes: default_max_buffer_bytes(),
            eight_digit_symbology: EightDigitSymbology::default(),
            strip_envelope: false,
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl ReaderConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let config: Self = envy::prefixed("SCAN_")
            .from_env()
            .map_err(|e| Error::Config(format!("Failed to parse environment variables: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_buffer_bytes == 0 || self.max_buffer_bytes > crate::MAX_BUFFER_LIMIT {
            return Err(Error::Config(format!(
                "max_buffer_bytes must be between 1 and {}",
                crate::MAX_BUFFER_LIMIT
            )));
        }

        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be > 0".to_string()));
        }

        if self.flush_timeout_ms > MAX_FLUSH_TIMEOUT_MS {
            return Err(Error::Config(format!(
                "flush_timeout_ms must be <= {}",
                MAX_FLUSH_TIMEOUT_MS
            )));
        }

        Ok(())
    }

    /// Flush delay, `None` when timeout flushing is disabled
    pub fn flush_timeout(&self) -> Option<Duration> {
        if self.flush_timeout_ms > 0 {
            Some(Duration::from_millis(self.flush_timeout_ms))
        } else {
            None
        }
    }
}

const MAX_FLUSH_TIMEOUT_MS: u64 = 10_000;

// Default value functions
fn default_flush_timeout_ms() -> u64 {
    crate::DEFAULT_FLUSH_TIMEOUT_MS
}

fn default_max_buffer_bytes() -> usize {
    crate::DEFAULT_MAX_BUFFER_BYTES
}

fn default_channel_capacity() -> usize {
    256
}
