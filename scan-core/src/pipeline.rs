// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Validation pipeline and result publication
//!
//! [`ValidationPipeline::validate`] is total: detection and checksum failures
//! are logged, counted and folded into `valid: false`, and exactly one
//! [`ValidationResult`] is published per candidate record.

use crate::checksum;
use crate::config::{EightDigitSymbology, ReaderConfig};
use crate::framer::CandidateRecord;
use crate::metrics::Metrics;
use crate::symbology::{detect_with, Symbology};
use crate::Error;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, warn};

/// Outcome of validating one candidate record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Publication order within the pipeline, starting at 0
    pub sequence: u64,

    /// Record text as validated
    pub record: String,

    /// Detected symbology
    pub symbology: Symbology,

    /// Whether the embedded check value matched
    pub valid: bool,

    /// UTC timestamp of validation
    pub scanned_at: DateTime<Utc>,
}

impl ValidationResult {
    /// Serialize to a single JSON line
    pub fn to_json(&self) -> crate::Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }
}

/// Receiver of validation results
pub trait ResultSink: Send + Sync {
    fn publish(&self, result: &ValidationResult);
}

/// Fan-out of results to any number of in-order subscribers
///
/// Each subscriber gets its own unbounded queue so a slow consumer never
/// drops or reorders results. Closed subscribers are pruned on publish.
#[derive(Default)]
pub struct ResultBus {
    subscribers: Mutex<Vec<mpsc::UnboundedSender<ValidationResult>>>,
}

impl ResultBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber that receives every result published from now on
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ValidationResult> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().len()
    }
}

impl ResultSink for ResultBus {
    fn publish(&self, result: &ValidationResult) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(result.clone()).is_ok());
    }
}

/// Detects, validates and publishes candidate records
pub struct ValidationPipeline {
    sink: Arc<dyn ResultSink>,
    eight_digit: EightDigitSymbology,
    strip_envelope: bool,
    // Next sequence number; held across publish so order matches numbering
    next_sequence: Mutex<u64>,
    metrics: Metrics,
}

impl ValidationPipeline {
    /// Create a pipeline with default detection settings
    pub fn new(sink: Arc<dyn ResultSink>) -> Self {
        Self::from_config(&ReaderConfig::default(), sink)
    }

    pub fn from_config(config: &ReaderConfig, sink: Arc<dyn ResultSink>) -> Self {
        Self {
            sink,
            eight_digit: config.eight_digit_symbology,
            strip_envelope: config.strip_envelope,
            next_sequence: Mutex::new(0),
            metrics: Metrics::new(),
        }
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Validate one record and publish the result
    pub fn validate(&self, record: CandidateRecord) -> ValidationResult {
        let text = if self.strip_envelope {
            strip_envelope(record.as_str())
        } else {
            record.as_str()
        };

        let symbology = detect_with(text, self.eight_digit);
        let valid = match checksum::verify(text, symbology) {
            Ok(valid) => valid,
            Err(e) if e.is_record_error() => {
                if matches!(e, Error::UnsupportedSymbology(_)) {
                    self.metrics.record_unsupported();
                } else {
                    self.metrics.record_malformed();
                }
                warn!(record = text, symbology = %symbology, error = %e, "Validation error");
                false
            }
            Err(e) => {
                error!(record = text, symbology = %symbology, error = %e, "Unexpected validation failure");
                false
            }
        };
        self.metrics.record_result(symbology, valid);

        let mut next_sequence = self.next_sequence.lock();
        let result = ValidationResult {
            sequence: *next_sequence,
            record: text.to_string(),
            symbology,
            valid,
            scanned_at: Utc::now(),
        };
        *next_sequence += 1;

        debug!(
            sequence = result.sequence,
            record = %result.record,
            symbology = %symbology,
            valid,
            "Publishing validation result"
        );
        self.sink.publish(&result);
        result
    }
}

/// Drop the scanner's prefix and suffix characters
///
/// Records shorter than three characters have no payload to unwrap and are
/// returned unchanged.
fn strip_envelope(text: &str) -> &str {
    if text.chars().count() < 3 {
        return text;
    }
    let start = text.chars().next().map_or(0, char::len_utf8);
    let end = text.char_indices().last().map_or(text.len(), |(i, _)| i);
    &text[start..end]
}
