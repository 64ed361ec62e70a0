// SPDX-License-Identifier: GPL-3.0-only

//! EAN-13 checksum gate
//!
//! Every code that reaches the cart goes through this module, whether it was
//! read by the camera or typed by the operator. The gate keeps every ASCII and
//! full-width digit of the input and checks the result against the EAN-13
//! weighted checksum. Input with more than 13 digits never passes; only the
//! manual entry field caps its text to 13 characters, through [`normalize`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of digits in an EAN-13 code
pub const EAN13_LENGTH: usize = 13;

const FULL_WIDTH_ZERO: char = '\u{FF10}';
const FULL_WIDTH_NINE: char = '\u{FF19}';

/// A validated 13-digit EAN-13 code
///
/// Only constructible through [`get_valid_code`] (or its `FromStr` /
/// `TryFrom` equivalents), so holding a `ScanCode` means the checksum held.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ScanCode(String);

impl ScanCode {
    /// The canonical 13 ASCII digits
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The GS1 prefix (first three digits), which identifies the issuing
    /// numbering organisation
    pub fn prefix(&self) -> &str {
        &self.0[..3]
    }

    /// The trailing check digit
    pub fn check_digit(&self) -> u8 {
        self.0.as_bytes()[EAN13_LENGTH - 1] - b'0'
    }
}

impl fmt::Display for ScanCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ScanCode {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<ScanCode> for String {
    fn from(code: ScanCode) -> Self {
        code.0
    }
}

impl TryFrom<String> for ScanCode {
    type Error = InvalidCode;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        get_valid_code(&raw).ok_or(InvalidCode { normalized: extract_digits(&raw) })
    }
}

impl std::str::FromStr for ScanCode {
    type Err = InvalidCode;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        get_valid_code(raw).ok_or_else(|| InvalidCode { normalized: extract_digits(raw) })
    }
}

/// Input that did not survive the checksum gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidCode {
    /// The digits of the input, untruncated
    pub normalized: String,
}

impl fmt::Display for InvalidCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.normalized.len() != EAN13_LENGTH {
            write!(
                f,
                "Invalid barcode '{}': expected {} digits, got {}",
                self.normalized,
                EAN13_LENGTH,
                self.normalized.len()
            )
        } else {
            write!(f, "Invalid barcode '{}': checksum mismatch", self.normalized)
        }
    }
}

impl std::error::Error for InvalidCode {}

/// Map a character to its ASCII digit, accepting full-width forms
fn ascii_digit(c: char) -> Option<char> {
    match c {
        '0'..='9' => Some(c),
        FULL_WIDTH_ZERO..=FULL_WIDTH_NINE => {
            let offset = c as u32 - FULL_WIDTH_ZERO as u32;
            char::from_digit(offset, 10)
        }
        _ => None,
    }
}

/// Strip everything but digits, mapping full-width digits to ASCII
pub fn extract_digits(raw: &str) -> String {
    raw.trim().chars().filter_map(ascii_digit).collect()
}

/// Strip everything but digits and truncate to 13 characters
///
/// Cleans up what the operator types into the manual entry field. The result
/// is always a prefix-of-13 ASCII digit string, so `normalize` is idempotent.
/// Never use it on scanned text: truncation can turn a longer symbol into an
/// unrelated valid code.
pub fn normalize(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter_map(ascii_digit)
        .take(EAN13_LENGTH)
        .collect()
}

/// Compute the EAN check digit for the given payload digits
///
/// Works for any payload length (12 for EAN-13, 7 for EAN-8): weights
/// alternate 3/1 starting from the rightmost payload digit. Returns `None`
/// if the payload contains anything but ASCII digits.
pub fn check_digit(payload: &str) -> Option<u8> {
    let mut sum = 0u32;
    for (i, b) in payload.bytes().rev().enumerate() {
        if !b.is_ascii_digit() {
            return None;
        }
        let weight = if i % 2 == 0 { 3 } else { 1 };
        sum += (b - b'0') as u32 * weight;
    }
    Some(((10 - (sum % 10)) % 10) as u8)
}

/// Whether `digits` is exactly 13 ASCII digits with a correct check digit
pub fn is_valid(digits: &str) -> bool {
    if digits.len() != EAN13_LENGTH || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let (payload, check) = digits.split_at(EAN13_LENGTH - 1);
    check_digit(payload) == Some(check.as_bytes()[0] - b'0')
}

/// Extract the digits of raw input and validate them in one step
///
/// Input with more than 13 digits is rejected, never truncated.
pub fn get_valid_code(raw: &str) -> Option<ScanCode> {
    let digits = extract_digits(raw);
    is_valid(&digits).then_some(ScanCode(digits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_codes() {
        assert!(is_valid("4901234567894"));
        assert!(is_valid("4006381333931"));
        assert!(!is_valid("4006381333932"));
    }

    #[test]
    fn test_check_digit_matches_weighted_sum() {
        // Weighted sum over the first 12 digits, x1 on even indices and x3 on odd
        for payload in ["490123456789", "400638133393", "000000000000", "999999999999"] {
            let sum: u32 = payload
                .bytes()
                .enumerate()
                .map(|(i, b)| (b - b'0') as u32 * if i % 2 == 0 { 1 } else { 3 })
                .sum();
            let expected = ((10 - sum % 10) % 10) as u8;
            assert_eq!(check_digit(payload), Some(expected), "payload {}", payload);

            let code = format!("{}{}", payload, expected);
            assert!(is_valid(&code));
            let wrong = format!("{}{}", payload, (expected + 1) % 10);
            assert!(!is_valid(&wrong));
        }
    }

    #[test]
    fn test_ean8_check_digit() {
        // 9638507 -> 4 (EAN-8 "96385074")
        assert_eq!(check_digit("9638507"), Some(4));
    }

    #[test]
    fn test_is_valid_rejects_wrong_length_and_non_digits() {
        assert!(!is_valid(""));
        assert!(!is_valid("490123"));
        assert!(!is_valid("49012345678940"));
        assert!(!is_valid("49012345678a4"));
    }

    #[test]
    fn test_normalize_strips_non_digits() {
        assert_eq!(normalize(" 4901-2345 6789 4 "), "4901234567894");
        assert_eq!(normalize("abc"), "");
        assert_eq!(normalize("EAN: 490123"), "490123");
    }

    #[test]
    fn test_normalize_truncates() {
        assert_eq!(normalize("49012345678941234"), "4901234567894");
    }

    #[test]
    fn test_longer_input_is_never_truncated_into_a_code() {
        // The first 13 digits form a valid code
        assert!(get_valid_code("40063813339315").is_none());
        assert!(get_valid_code("4006381333931 5").is_none());
        assert!(get_valid_code("４００６３８１３３３９３１５").is_none());

        let err = "40063813339315999".parse::<ScanCode>().unwrap_err();
        assert_eq!(err.normalized, "40063813339315999");
        assert!(err.to_string().contains("got 17"));
    }

    #[test]
    fn test_extract_digits_keeps_length() {
        assert_eq!(extract_digits(" 4901-2345 6789 4 "), "4901234567894");
        assert_eq!(extract_digits("49012345678941234"), "49012345678941234");
        assert_eq!(extract_digits("日本４９０"), "490");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "",
            "  ４９０１２３４５６７８９４ ",
            "49-01-23",
            "x1y2z3",
            "12345678901234567890",
            "日本4901234567894",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input {:?}", input);
            assert!(once.bytes().all(|b| b.is_ascii_digit()));
            assert!(once.len() <= EAN13_LENGTH);
        }
    }

    #[test]
    fn test_full_width_digits() {
        let full = "４９０１２３４５６７８９４";
        assert_eq!(normalize(full), "4901234567894");
        assert_eq!(get_valid_code(full), get_valid_code("4901234567894"));
        assert!(get_valid_code(full).is_some());
    }

    #[test]
    fn test_get_valid_code() {
        assert!(get_valid_code("490123").is_none());
        assert!(get_valid_code("4901234567890").is_none());
        let code = get_valid_code("4901234567894").unwrap();
        assert_eq!(code.as_str(), "4901234567894");
        assert_eq!(code.prefix(), "490");
        assert_eq!(code.check_digit(), 4);
    }

    #[test]
    fn test_scan_code_parse_and_serde() {
        let code: ScanCode = "4901234567894".parse().unwrap();
        let json = serde_json::to_string(&code).unwrap();
        assert_eq!(json, "\"4901234567894\"");

        let back: ScanCode = serde_json::from_str(&json).unwrap();
        assert_eq!(back, code);

        assert!(serde_json::from_str::<ScanCode>("\"4901234567890\"").is_err());
    }

    #[test]
    fn test_invalid_code_message() {
        let err = "490123".parse::<ScanCode>().unwrap_err();
        assert_eq!(err.normalized, "490123");
        assert!(err.to_string().contains("expected 13 digits"));

        let err = "4901234567890".parse::<ScanCode>().unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }
}
