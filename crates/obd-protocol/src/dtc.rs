//! Diagnostic Trouble Code decoding for Modes 02, 03 and 07
//!
//! A DTC travels as two bytes. The top two bits of the first byte select the
//! system letter, the remaining fourteen bits are four digits (one 2-bit, three
//! nibbles). Each digit is printed as a decimal number, so a nibble above 9
//! takes two characters (`0A 1F` renders as `P010115`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::mode;

/// DTC system category, selected by the top two bits of the first byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DtcCategory {
    /// P codes - engine, transmission
    Powertrain,
    /// C codes - ABS, suspension
    Chassis,
    /// B codes - airbags, climate control
    Body,
    /// U codes - network communication
    Network,
}

impl DtcCategory {
    /// Get category from the first DTC byte
    pub fn from_high_byte(high_byte: u8) -> Self {
        match (high_byte >> 6) & 0x03 {
            0 => DtcCategory::Powertrain,
            1 => DtcCategory::Chassis,
            2 => DtcCategory::Body,
            _ => DtcCategory::Network,
        }
    }

    /// Category letter
    pub fn letter(&self) -> char {
        match self {
            DtcCategory::Powertrain => 'P',
            DtcCategory::Chassis => 'C',
            DtcCategory::Body => 'B',
            DtcCategory::Network => 'U',
        }
    }

    /// Inverse of [`letter`](Self::letter)
    pub fn from_letter(letter: char) -> Option<Self> {
        match letter.to_ascii_uppercase() {
            'P' => Some(DtcCategory::Powertrain),
            'C' => Some(DtcCategory::Chassis),
            'B' => Some(DtcCategory::Body),
            'U' => Some(DtcCategory::Network),
            _ => None,
        }
    }

    fn bits(&self) -> u8 {
        match self {
            DtcCategory::Powertrain => 0,
            DtcCategory::Chassis => 1,
            DtcCategory::Body => 2,
            DtcCategory::Network => 3,
        }
    }
}

/// A decoded trouble code, e.g. `P0301`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DtcCode {
    /// System category
    pub category: DtcCategory,
    /// Digit values: the 2-bit digit, then three nibbles
    pub digits: [u8; 4],
}

impl DtcCode {
    /// Re-encode into the two-byte wire form
    pub fn to_bytes(&self) -> [u8; 2] {
        let [d1, d2, d3, d4] = self.digits;
        [
            (self.category.bits() << 6) | ((d1 & 0x03) << 4) | (d2 & 0x0F),
            ((d3 & 0x0F) << 4) | (d4 & 0x0F),
        ]
    }
}

impl fmt::Display for DtcCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [d1, d2, d3, d4] = self.digits;
        write!(f, "{}{}{}{}{}", self.category.letter(), d1, d2, d3, d4)
    }
}

/// Error parsing a textual DTC
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid DTC: {0}")]
pub struct ParseDtcError(String);

/// Parses the single-digit form `P0301`. Multi-character digits are ambiguous
/// in text and are rejected.
impl FromStr for DtcCode {
    type Err = ParseDtcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ParseDtcError(s.to_string());
        let mut chars = s.chars();
        let category = chars
            .next()
            .and_then(DtcCategory::from_letter)
            .ok_or_else(invalid)?;
        let rest = chars.as_str().as_bytes();
        if rest.len() != 4 || !rest.iter().all(u8::is_ascii_digit) || rest[0] > b'3' {
            return Err(invalid());
        }
        let digits = [rest[0] - b'0', rest[1] - b'0', rest[2] - b'0', rest[3] - b'0'];
        Ok(Self { category, digits })
    }
}

/// Decode one two-byte DTC pair
pub fn decode_dtc(b1: u8, b2: u8) -> DtcCode {
    let digit1 = (b1 & 0x30) >> 4;
    let digit2 = b1 & 0x0F;
    let digit3 = (b2 & 0xF0) >> 4;
    let digit4 = b2 & 0x0F;
    DtcCode {
        category: DtcCategory::from_high_byte(b1),
        digits: [digit1, digit2, digit3, digit4],
    }
}

/// Decode a DTC list response whose first byte must be `expected_sid`.
///
/// `00 00` filler pairs are skipped and a trailing odd byte is ignored. A wrong
/// or missing header gives an empty list.
fn decode_dtc_list(expected_sid: u8, response: &[u8]) -> Vec<DtcCode> {
    match response.split_first() {
        Some((&sid, payload)) if sid == expected_sid => payload
            .chunks_exact(2)
            .filter(|pair| pair[0] != 0 || pair[1] != 0)
            .map(|pair| decode_dtc(pair[0], pair[1]))
            .collect(),
        _ => Vec::new(),
    }
}

/// Decode a Mode 03 (stored DTCs) response
pub fn decode_stored_dtcs(response: &[u8]) -> Vec<DtcCode> {
    decode_dtc_list(mode::READ_DTC + mode::POSITIVE_RESPONSE_OFFSET, response)
}

/// Decode a Mode 07 (pending DTCs) response
pub fn decode_pending_dtcs(response: &[u8]) -> Vec<DtcCode> {
    decode_dtc_list(mode::PENDING_DTC + mode::POSITIVE_RESPONSE_OFFSET, response)
}

/// Decode a Mode 02 PID 02 (freeze-frame DTC) response: `42 02 b1 b2 ...`
pub fn decode_freeze_frame_dtc(response: &[u8]) -> Vec<DtcCode> {
    match response {
        [sid, pid, b1, b2, ..]
            if *sid == mode::FREEZE_FRAME + mode::POSITIVE_RESPONSE_OFFSET
                && *pid == mode::FREEZE_FRAME_DTC_PID
                && (*b1 != 0 || *b2 != 0) =>
        {
            vec![decode_dtc(*b1, *b2)]
        }
        _ => Vec::new(),
    }
}

/// Join codes as `P0133, P0301`
pub fn join_codes(codes: &[DtcCode]) -> String {
    codes
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
