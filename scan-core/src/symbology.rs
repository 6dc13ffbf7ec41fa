// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Structural symbology detection
//!
//! Decoded scanner text carries no symbology tag, so the symbology is inferred
//! from character-set and length constraints alone.

use crate::config::EightDigitSymbology;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Barcode symbologies recognized by the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Symbology {
    #[serde(rename = "Code128-A")]
    Code128A,
    #[serde(rename = "Code128-B")]
    Code128B,
    #[serde(rename = "Code128-C")]
    Code128C,
    #[serde(rename = "EAN-13")]
    Ean13,
    #[serde(rename = "EAN-8")]
    Ean8,
    #[serde(rename = "UPC-A")]
    UpcA,
    #[serde(rename = "UPC-E")]
    UpcE,
    #[serde(rename = "Unknown")]
    Unknown,
}

impl Symbology {
    /// Every symbology, in display order
    pub const ALL: [Symbology; 8] = [
        Self::Code128A,
        Self::Code128B,
        Self::Code128C,
        Self::Ean13,
        Self::Ean8,
        Self::UpcA,
        Self::UpcE,
        Self::Unknown,
    ];

    /// Display tag
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Code128A => "Code128-A",
            Self::Code128B => "Code128-B",
            Self::Code128C => "Code128-C",
            Self::Ean13 => "EAN-13",
            Self::Ean8 => "EAN-8",
            Self::UpcA => "UPC-A",
            Self::UpcE => "UPC-E",
            Self::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Detect the symbology of a record, reading 8-digit codes as EAN-8
pub fn detect(record: &str) -> Symbology {
    detect_with(record, EightDigitSymbology::Ean8)
}

/// Detect the symbology of a record
///
/// Rules are evaluated in order and the function never fails:
///
/// 1. All digits: 12 → UPC-A, 8 → `eight_digit`, 13 → EAN-13, other even lengths → Code128-C
/// 2. Any control character → Code128-A
/// 3. Every code point ≤ 95 → Code128-A
/// 4. Every code point printable ASCII → Code128-B
/// 5. Anything else, including the empty record → Unknown
pub fn detect_with(record: &str, eight_digit: EightDigitSymbology) -> Symbology {
    if record.is_empty() {
        return Symbology::Unknown;
    }

    if record.bytes().all(|b| b.is_ascii_digit()) {
        match record.len() {
            12 => return Symbology::UpcA,
            8 => {
                return match eight_digit {
                    EightDigitSymbology::Ean8 => Symbology::Ean8,
                    EightDigitSymbology::Upce => Symbology::UpcE,
                }
            }
            13 => return Symbology::Ean13,
            n if n % 2 == 0 => return Symbology::Code128C,
            _ => {}
        }
    }

    let mut within_a = true;
    let mut within_b = true;
    for c in record.chars() {
        let code = c as u32;
        if code < 32 {
            return Symbology::Code128A;
        }
        if code > 95 {
            within_a = false;
        }
        if code > 126 {
            within_b = false;
        }
    }

    if within_a {
        Symbology::Code128A
    } else if within_b {
        Symbology::Code128B
    } else {
        Symbology::Unknown
    }
}
