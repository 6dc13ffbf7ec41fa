// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Scan Core Library
//!
//! This crate turns the raw byte stream of a barcode scanner into validated,
//! typed scan events. Scanners deliver bytes in arbitrary bursts, so records
//! are first reconstructed by a framer and then classified and checksummed.
//!
//! # Architecture
//!
//! ```text
//! bytes ──> FrameAssembler ──> CandidateRecord ──> detect() ──> verify() ──> ValidationResult
//!           (reader task)                          (pipeline)                (ResultSink)
//! ```
//!
//! The library is organized into modules representing core concerns:
//! - `framer`: Byte stream to candidate record assembly with flush deadlines
//! - `reader`: Per-device task driving a framer from a chunk channel
//! - `symbology`: Structural symbology detection
//! - `checksum`: Modulo-10, UPC-E expansion and Code128 check values
//! - `pipeline`: Detection + validation + publication, never fails
//! - `config`: Configuration management with validation
//! - `metrics`: Validation counters
//! - `error`: Unified error types

pub mod checksum;
pub mod config;
pub mod error;
pub mod framer;
pub mod metrics;
pub mod pipeline;
pub mod reader;
pub mod symbology;

pub use error::{Error, Result};
pub use framer::{CandidateRecord, FrameAssembler};
pub use pipeline::{ResultBus, ResultSink, ValidationPipeline, ValidationResult};
pub use reader::ScanReader;
pub use symbology::Symbology;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Byte that ends one scanned record (carriage return)
pub const TERMINATOR: u8 = 0x0D;

/// Default inactivity delay before an unterminated tail is flushed
pub const DEFAULT_FLUSH_TIMEOUT_MS: u64 = 100;

/// Default assembly buffer ceiling (16 KiB)
pub const DEFAULT_MAX_BUFFER_BYTES: usize = 16 * 1024;

/// Upper bound accepted for a configured buffer ceiling (1 MiB)
pub const MAX_BUFFER_LIMIT: usize = 1024 * 1024;
