// SPDX-License-Identifier: MIT
//
// Scan Pipeline: Barcode Scanner Stream Framing and Validation
// Copyright (c) 2025 Scan Pipeline Contributors

//! Check value computation for the supported symbologies
//!
//! Every function here is pure. Structural problems (wrong characters, wrong
//! length) are reported as [`Error::MalformedRecord`]; a check value that does
//! not match is a normal `false` from [`verify`], never an error.

use crate::{Error, Result, Symbology};

/// Code128 start symbol values, used as the initial accumulator
const START_A: u64 = 103;
const START_B: u64 = 104;
const START_C: u64 = 105;

const CODE128_MODULUS: u64 = 103;

/// Verify the check value embedded in `record` for the given symbology
pub fn verify(record: &str, symbology: Symbology) -> Result<bool> {
    let expected = expected_check(record, symbology)?;
    let actual = embedded_check(record, symbology)?;
    Ok(expected == actual)
}

/// Compute the check value a well-formed record of this symbology must carry
pub fn expected_check(record: &str, symbology: Symbology) -> Result<u32> {
    match symbology {
        Symbology::Ean13 | Symbology::Ean8 | Symbology::UpcA => {
            let digits = parse_digits(record, symbology)?;
            let required = match symbology {
                Symbology::Ean13 => 13,
                Symbology::Ean8 => 8,
                _ => 12,
            };
            if digits.len() != required {
                return Err(Error::malformed(
                    symbology,
                    format!("expected {} digits, got {}", required, digits.len()),
                ));
            }
            Ok(modulo10(&digits) as u32)
        }
        Symbology::UpcE => {
            let upca = expand_upce(record)?;
            let digits = parse_digits(&upca, Symbology::UpcE)?;
            Ok(modulo10(&digits) as u32)
        }
        Symbology::Code128A => code128a(record),
        Symbology::Code128B => code128b(record),
        Symbology::Code128C => code128c(record),
        Symbology::Unknown => Err(Error::UnsupportedSymbology(symbology)),
    }
}

/// Read the check value carried by the last character of `record`
fn embedded_check(record: &str, symbology: Symbology) -> Result<u32> {
    let last = record
        .chars()
        .last()
        .ok_or_else(|| Error::malformed(symbology, "empty record"))?;

    match symbology {
        Symbology::Ean13 | Symbology::Ean8 | Symbology::UpcA | Symbology::UpcE => last
            .to_digit(10)
            .ok_or_else(|| Error::malformed(symbology, "check character is not a digit")),
        Symbology::Code128A | Symbology::Code128C => Ok(last as u32),
        Symbology::Code128B => Ok((last as u32).saturating_sub(32)),
        Symbology::Unknown => Err(Error::UnsupportedSymbology(symbology)),
    }
}

/// Modulo-10 check digit over every digit but the last
///
/// Weights alternate 3/1 starting with 3 at the rightmost payload digit, the
/// GS1 convention, so positions count from 0 at the right.
pub fn modulo10(digits: &[u8]) -> u8 {
    let payload = &digits[..digits.len().saturating_sub(1)];
    let sum: u32 = payload
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| d as u32 * if i % 2 == 0 { 3 } else { 1 })
        .sum();
    ((10 - sum % 10) % 10) as u8
}

/// Expand an 8-digit UPC-E code to its 12-digit UPC-A form
///
/// The 7th digit selects where the suppressed zeros are reinserted; the
/// check digit is carried through unchanged.
pub fn expand_upce(record: &str) -> Result<String> {
    let d = record.as_bytes();
    if d.len() != 8 || !d.iter().all(u8::is_ascii_digit) {
        return Err(Error::malformed(
            Symbology::UpcE,
            format!("expected 8 digits, got {:?}", record),
        ));
    }

    let (n, m1, m2, m3, m4, m5, exp, check) = (
        d[0] as char,
        d[1] as char,
        d[2] as char,
        d[3] as char,
        d[4] as char,
        d[5] as char,
        d[6] as char,
        d[7] as char,
    );

    let upca = match exp {
        '0'..='2' => format!("{n}{m1}{m2}{exp}0000{m3}{m4}{m5}{check}"),
        '3' | '4' => format!("{n}{m1}{m2}{m3}{m4}00000{m5}{check}"),
        _ => format!("{n}{m1}{m2}{m3}{m4}{m5}0000{exp}{check}"),
    };

    if upca.len() != 12 {
        return Err(Error::malformed(
            Symbology::UpcE,
            format!("expansion produced {} digits", upca.len()),
        ));
    }
    Ok(upca)
}

/// Code128 subset A check value
///
/// Characters must lie in `[0, 95]`; payload characters are weighted by raw
/// code point.
pub fn code128a(record: &str) -> Result<u32> {
    let codes = code_points(record, Symbology::Code128A)?;
    if let Some(&bad) = codes.iter().find(|&&c| c > 95) {
        return Err(Error::malformed(
            Symbology::Code128A,
            format!("code point {} outside 0..=95", bad),
        ));
    }
    Ok(weighted_sum(START_A, &codes[..codes.len() - 1], |c| c))
}

/// Code128 subset B check value
///
/// Characters must be printable ASCII; payload values are `code - 32`.
pub fn code128b(record: &str) -> Result<u32> {
    let codes = code_points(record, Symbology::Code128B)?;
    if let Some(&bad) = codes.iter().find(|&&c| !(32..=126).contains(&c)) {
        return Err(Error::malformed(
            Symbology::Code128B,
            format!("code point {} outside 32..=126", bad),
        ));
    }
    Ok(weighted_sum(START_B, &codes[..codes.len() - 1], |c| c - 32))
}

/// Code128 subset C check value
///
/// The record must be an even number of digits. Weighting is applied to each
/// raw character code at its character position, not to decoded digit pairs.
pub fn code128c(record: &str) -> Result<u32> {
    let bytes = record.as_bytes();
    if !bytes.iter().all(u8::is_ascii_digit) {
        return Err(Error::malformed(Symbology::Code128C, "non-digit character"));
    }
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return Err(Error::malformed(
            Symbology::Code128C,
            format!("even digit count required, got {}", bytes.len()),
        ));
    }
    let codes: Vec<u32> = bytes.iter().map(|&b| b as u32).collect();
    Ok(weighted_sum(START_C, &codes[..codes.len() - 1], |c| c))
}

fn weighted_sum(start: u64, payload: &[u32], value: impl Fn(u32) -> u32) -> u32 {
    let sum = payload
        .iter()
        .enumerate()
        .fold(start, |acc, (i, &c)| acc + value(c) as u64 * (i as u64 + 1));
    (sum % CODE128_MODULUS) as u32
}

fn code_points(record: &str, symbology: Symbology) -> Result<Vec<u32>> {
    let codes: Vec<u32> = record.chars().map(|c| c as u32).collect();
    if codes.len() < 2 {
        return Err(Error::malformed(
            symbology,
            "at least one data character and a check character required",
        ));
    }
    Ok(codes)
}

fn parse_digits(record: &str, symbology: Symbology) -> Result<Vec<u8>> {
    if record.len() < 2 {
        return Err(Error::malformed(symbology, "too short for a check digit"));
    }
    record
        .bytes()
        .map(|b| {
            if b.is_ascii_digit() {
                Ok(b - b'0')
            } else {
                Err(Error::malformed(symbology, "non-digit character"))
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn digits(s: &str) -> Vec<u8> {
        s.bytes().map(|b| b - b'0').collect()
    }

    #[test]
    fn test_modulo10_reference_input() {
        // Payload 012345678, weights 3/1 from the right: sum 76.
        assert_eq!(modulo10(&digits("0123456789")), 4);
        assert!(!verify("0123456789", Symbology::Code128C).unwrap());
    }

    #[test]
    fn test_known_retail_codes() {
        assert!(verify("5901234123457", Symbology::Ean13).unwrap());
        assert!(verify("4006381333931", Symbology::Ean13).unwrap());
        assert!(verify("036000291452", Symbology::UpcA).unwrap());
        assert!(verify("96385074", Symbology::Ean8).unwrap());

        assert!(!verify("5901234123458", Symbology::Ean13).unwrap());
        assert!(!verify("036000291453", Symbology::UpcA).unwrap());
    }

    #[test]
    fn test_wrong_length_is_malformed() {
        let err = verify("590123412345", Symbology::Ean13).unwrap_err();
        assert!(matches!(
            err,
            Error::MalformedRecord {
                symbology: Symbology::Ean13,
                ..
            }
        ));
        assert!(verify("12A45678", Symbology::Ean8).is_err());
    }

    #[test]
    fn test_upce_expansion() {
        assert_eq!(expand_upce("04252614").unwrap(), "042100005264");
        assert_eq!(expand_upce("01234505").unwrap(), "012000003455");
        assert_eq!(expand_upce("01234535").unwrap(), "012340000055");
        assert_eq!(expand_upce("01234545").unwrap(), "012340000055");
        assert_eq!(expand_upce("01234565").unwrap(), "012345000065");
    }

    #[test]
    fn test_upce_malformed() {
        assert!(expand_upce("0425261").is_err());
        assert!(expand_upce("042526145").is_err());
        assert!(expand_upce("0425A614").is_err());
        assert!(expand_upce("").is_err());
    }

    #[test]
    fn test_upce_validation() {
        assert!(verify("04252614", Symbology::UpcE).unwrap());
        assert!(!verify("04252615", Symbology::UpcE).unwrap());
    }

    #[test]
    fn test_code128b() {
        // 104 + 65*1 + 66*2 + 67*3 = 502, 502 % 103 = 90 -> 'z'
        assert_eq!(code128b("abcz").unwrap(), 90);
        assert!(verify("abcz", Symbology::Code128B).unwrap());
        assert!(!verify("abcy", Symbology::Code128B).unwrap());
        assert!(code128b("ab\u{7f}c").is_err());
    }

    #[test]
    fn test_code128a() {
        // 103 + 65*1 + 66*2 = 300, 300 % 103 = 94 -> '^'
        assert_eq!(code128a("AB^").unwrap(), 94);
        assert!(verify("AB^", Symbology::Code128A).unwrap());
        assert!(!verify("AB]", Symbology::Code128A).unwrap());
        assert!(code128a("ab").is_err());
        assert!(code128a("A").is_err());
    }

    #[test]
    fn test_code128c() {
        // 105 + 50 + 96 + 144 + 192 + 285 = 872, 872 % 103 = 48 -> '0'
        assert_eq!(code128c("200090").unwrap(), 48);
        assert!(verify("200090", Symbology::Code128C).unwrap());
        assert!(!verify("200091", Symbology::Code128C).unwrap());
    }

    #[test]
    fn test_code128c_malformed() {
        assert!(code128c("12345").is_err());
        assert!(code128c("12a4").is_err());
        assert!(code128c("").is_err());
    }

    #[test]
    fn test_unknown_is_unsupported() {
        let err = verify("caf\u{e9}", Symbology::Unknown).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSymbology(Symbology::Unknown)));
    }

    fn printable() -> impl Strategy<Value = char> {
        (32u8..=126).prop_map(char::from)
    }

    proptest! {
        #[test]
        fn prop_ean13_round_trip(payload in proptest::collection::vec(0u8..10, 12)) {
            let mut code = payload.clone();
            code.push(0);
            let check = modulo10(&code);
            let record: String = payload
                .iter()
                .chain(std::iter::once(&check))
                .map(|d| char::from(b'0' + d))
                .collect();
            prop_assert!(verify(&record, Symbology::Ean13).unwrap());
        }

        #[test]
        fn prop_upce_expands_to_twelve(code in "[0-9]{8}") {
            let upca = expand_upce(&code).unwrap();
            prop_assert_eq!(upca.len(), 12);
            prop_assert_eq!(upca.as_bytes()[11], code.as_bytes()[7]);
        }

        #[test]
        fn prop_upce_rejects_other_lengths(code in "[0-9]{0,7}|[0-9]{9,16}") {
            prop_assert!(expand_upce(&code).is_err());
        }

        #[test]
        fn prop_code128_deterministic(record in "[ -~]{2,40}") {
            prop_assert_eq!(code128b(&record).unwrap(), code128b(&record).unwrap());
        }

        #[test]
        fn prop_code128b_detects_substitution(
            payload in proptest::collection::vec(printable(), 1..60),
            position in any::<proptest::sample::Index>(),
            replacement in printable(),
        ) {
            let mut record: String = payload.iter().collect();
            record.push(' ');
            let check = code128b(&record).unwrap();
            prop_assume!(check <= 94);
            record.pop();
            record.push(char::from(check as u8 + 32));
            prop_assert!(verify(&record, Symbology::Code128B).unwrap());

            let mut chars: Vec<char> = record.chars().collect();
            let i = position.index(chars.len());
            prop_assume!(chars[i] != replacement);
            chars[i] = replacement;
            let flipped: String = chars.into_iter().collect();
            prop_assert!(!verify(&flipped, Symbology::Code128B).unwrap());
        }

        #[test]
        fn prop_code128a_detects_substitution(
            payload in proptest::collection::vec((32u8..=95).prop_map(char::from), 1..60),
            position in any::<proptest::sample::Index>(),
            replacement in (32u8..=95).prop_map(char::from),
        ) {
            let mut record: String = payload.iter().collect();
            record.push(' ');
            let check = code128a(&record).unwrap();
            prop_assume!(check <= 95);
            record.pop();
            record.push(char::from(check as u8));
            prop_assert!(verify(&record, Symbology::Code128A).unwrap());

            let mut chars: Vec<char> = record.chars().collect();
            let i = position.index(chars.len());
            prop_assume!(chars[i] != replacement);
            chars[i] = replacement;
            let flipped: String = chars.into_iter().collect();
            prop_assert!(!verify(&flipped, Symbology::Code128A).unwrap());
        }
    }

    proptest! {
        // Only about one payload in ten carries a digit check value.
        #![proptest_config(ProptestConfig {
            max_global_rejects: 50_000,
            ..ProptestConfig::default()
        })]

        #[test]
        fn prop_code128c_detects_substitution(
            payload in "[0-9]([0-9]{2}){0,29}",
            position in any::<proptest::sample::Index>(),
            replacement in (b'0'..=b'9').prop_map(char::from),
        ) {
            let mut record = payload.clone();
            record.push('0');
            let check = code128c(&record).unwrap();
            prop_assume!((48..=57).contains(&check));
            record.pop();
            record.push(char::from(check as u8));
            prop_assert!(verify(&record, Symbology::Code128C).unwrap());

            let mut chars: Vec<char> = record.chars().collect();
            let i = position.index(chars.len());
            prop_assume!(chars[i] != replacement);
            chars[i] = replacement;
            let flipped: String = chars.into_iter().collect();
            prop_assert!(!verify(&flipped, Symbology::Code128C).unwrap());
        }
    }
}
