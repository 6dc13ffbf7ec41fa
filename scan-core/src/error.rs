// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Error types for the scan pipeline
//!
//! Provides a unified error taxonomy using `thiserror` for ergonomic error handling.

use crate::symbology::Symbology;

pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for scan operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Record violates a structural precondition of its symbology
    #[error("Malformed {symbology} record: {reason}")]
    MalformedRecord {
        symbology: Symbology,
        reason: String,
    },

    /// No validator exists for the detected symbology
    #[error("Unsupported symbology for validation: {0}")]
    UnsupportedSymbology(Symbology),

    /// Configuration validation failed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Reader task is no longer accepting chunks
    #[error("Reader closed")]
    ReaderClosed,

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    pub(crate) fn malformed(symbology: Symbology, reason: impl Into<String>) -> Self {
        Error::MalformedRecord {
            symbology,
            reason: reason.into(),
        }
    }

    /// Check if error concerns a single record and is recovered by the pipeline
    pub fn is_record_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedRecord { .. } | Error::UnsupportedSymbology(_)
        )
    }
}

// Conversions for common error types
impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
