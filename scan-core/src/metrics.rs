// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Validation counters and reporting

use crate::Symbology;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Pipeline metrics collector
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    start_time: Instant,

    // Outcome metrics
    records_total: AtomicU64,
    records_valid: AtomicU64,
    records_invalid: AtomicU64,

    // Recovered record errors
    records_malformed: AtomicU64,
    records_unsupported: AtomicU64,

    // Indexed like Symbology::ALL
    by_symbology: [AtomicU64; 8],
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner {
                start_time: Instant::now(),
                records_total: AtomicU64::new(0),
                records_valid: AtomicU64::new(0),
                records_invalid: AtomicU64::new(0),
                records_malformed: AtomicU64::new(0),
                records_unsupported: AtomicU64::new(0),
                by_symbology: Default::default(),
            }),
        }
    }

    pub fn record_result(&self, symbology: Symbology, valid: bool) {
        self.inner.records_total.fetch_add(1, Ordering::Relaxed);
        if valid {
            self.inner.records_valid.fetch_add(1, Ordering::Relaxed);
        } else {
            self.inner.records_invalid.fetch_add(1, Ordering::Relaxed);
        }
        self.inner.by_symbology[symbology_index(symbology)].fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.inner.records_malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_unsupported(&self) {
        self.inner.records_unsupported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_total(&self) -> u64 {
        self.inner.records_total.load(Ordering::Relaxed)
    }

    pub fn records_valid(&self) -> u64 {
        self.inner.records_valid.load(Ordering::Relaxed)
    }

    pub fn records_invalid(&self) -> u64 {
        self.inner.records_invalid.load(Ordering::Relaxed)
    }

    pub fn records_malformed(&self) -> u64 {
        self.inner.records_malformed.load(Ordering::Relaxed)
    }

    pub fn records_unsupported(&self) -> u64 {
        self.inner.records_unsupported.load(Ordering::Relaxed)
    }

    pub fn records_for(&self, symbology: Symbology) -> u64 {
        self.inner.by_symbology[symbology_index(symbology)].load(Ordering::Relaxed)
    }

    // Derived metrics
    pub fn uptime_seconds(&self) -> u64 {
        self.inner.start_time.elapsed().as_secs()
    }

    /// Share of records that passed validation (0.0 - 100.0)
    pub fn valid_percent(&self) -> f64 {
        let total = self.records_total();
        if total > 0 {
            self.records_valid() as f64 / total as f64 * 100.0
        } else {
            0.0
        }
    }

    /// Generate Prometheus-compatible metrics output
    pub fn prometheus_format(&self) -> String {
        let mut output = String::new();

        output.push_str("# HELP scan_records_total Total number of validated records\n");
        output.push_str("# TYPE scan_records_total counter\n");
        output.push_str(&format!("scan_records_total {}\n", self.records_total()));

        output.push_str("# HELP scan_records_valid Records whose check value matched\n");
        output.push_str("# TYPE scan_records_valid counter\n");
        output.push_str(&format!("scan_records_valid {}\n", self.records_valid()));

        output.push_str("# HELP scan_records_malformed Records rejected as structurally malformed\n");
        output.push_str("# TYPE scan_records_malformed counter\n");
        output.push_str(&format!("scan_records_malformed {}\n", self.records_malformed()));

        output.push_str("# HELP scan_records_unsupported Records with no supported symbology\n");
        output.push_str("# TYPE scan_records_unsupported counter\n");
        output.push_str(&format!("scan_records_unsupported {}\n", self.records_unsupported()));

        output.push_str("# HELP scan_records_by_symbology Records per detected symbology\n");
        output.push_str("# TYPE scan_records_by_symbology counter\n");
        for symbology in Symbology::ALL {
            output.push_str(&format!(
                "scan_records_by_symbology{{symbology=\"{}\"}} {}\n",
                symbology,
                self.records_for(symbology)
            ));
        }

        output.push_str("# HELP scan_uptime_seconds Pipeline uptime in seconds\n");
        output.push_str("# TYPE scan_uptime_seconds gauge\n");
        output.push_str(&format!("scan_uptime_seconds {}\n", self.uptime_seconds()));

        output
    }
}

fn symbology_index(symbology: Symbology) -> usize {
    Symbology::ALL
        .iter()
        .position(|&s| s == symbology)
        .unwrap_or(Symbology::ALL.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics() {
        let metrics = Metrics::new();

        metrics.record_result(Symbology::Ean13, true);
        metrics.record_result(Symbology::Ean13, false);
        metrics.record_result(Symbology::Unknown, false);
        metrics.record_unsupported();

        assert_eq!(metrics.records_total(), 3);
        assert_eq!(metrics.records_valid(), 1);
        assert_eq!(metrics.records_invalid(), 2);
        assert_eq!(metrics.records_unsupported(), 1);
        assert_eq!(metrics.records_for(Symbology::Ean13), 2);
        assert_eq!(metrics.records_for(Symbology::Code128B), 0);
    }

    #[test]
    fn test_valid_percent() {
        let metrics = Metrics::new();
        assert_eq!(metrics.valid_percent(), 0.0);

        for i in 0..4 {
            metrics.record_result(Symbology::UpcA, i % 2 == 0);
        }
        assert!((metrics.valid_percent() - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_prometheus_format() {
        let metrics = Metrics::new();
        metrics.record_result(Symbology::Code128B, true);

        let output = metrics.prometheus_format();
        assert!(output.contains("scan_records_total 1\n"));
        assert!(output.contains("scan_records_by_symbology{symbology=\"Code128-B\"} 1\n"));
        assert!(output.contains("scan_records_by_symbology{symbology=\"UPC-E\"} 0\n"));
    }
}
