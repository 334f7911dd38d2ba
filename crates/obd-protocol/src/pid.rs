//! OBD-II PID Registry and Value Decoding
//!
//! Maps semantic labels (`rpm`, `coolant`, ...) to their Mode 01 parameter id,
//! decoding formula and display unit. The registry is a fixed table; decoding
//! dispatches on the [`Pid`] variant.

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Standard OBD-II PIDs for Mode 01 (current data)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Pid {
    /// Engine coolant temperature (0x05)
    CoolantTemp = 0x05,
    /// Short-term fuel trim bank 1 (0x06)
    ShortFuelTrim = 0x06,
    /// Long-term fuel trim bank 1 (0x07)
    LongFuelTrim = 0x07,
    /// Engine RPM (0x0C)
    Rpm = 0x0C,
    /// Vehicle speed (0x0D)
    Speed = 0x0D,
    /// Intake air temperature (0x0F)
    IntakeTemp = 0x0F,
    /// Mass air flow rate (0x10)
    Maf = 0x10,
    /// Throttle position (0x11)
    ThrottlePosition = 0x11,
}

impl Pid {
    /// Every PID in the registry, in id order
    pub const ALL: [Pid; 8] = [
        Pid::CoolantTemp,
        Pid::ShortFuelTrim,
        Pid::LongFuelTrim,
        Pid::Rpm,
        Pid::Speed,
        Pid::IntakeTemp,
        Pid::Maf,
        Pid::ThrottlePosition,
    ];

    /// Get the PID hex value
    pub fn as_hex(&self) -> u8 {
        *self as u8
    }

    /// Label used on the command line, in console output and as CSV column
    pub fn label(&self) -> &'static str {
        match self {
            Pid::CoolantTemp => "coolant",
            Pid::ShortFuelTrim => "stft1",
            Pid::LongFuelTrim => "ltft1",
            Pid::Rpm => "rpm",
            Pid::Speed => "speed",
            Pid::IntakeTemp => "intake_temp",
            Pid::Maf => "maf",
            Pid::ThrottlePosition => "throttle",
        }
    }

    /// Display unit
    pub fn unit(&self) -> &'static str {
        match self {
            Pid::CoolantTemp | Pid::IntakeTemp => "°C",
            Pid::ShortFuelTrim | Pid::LongFuelTrim | Pid::ThrottlePosition => "%",
            Pid::Rpm => "rpm",
            Pid::Speed => "km/h",
            Pid::Maf => "g/s",
        }
    }

    /// Get the number of response bytes for this PID
    pub fn response_bytes(&self) -> usize {
        match self {
            Pid::Rpm | Pid::Maf => 2,
            _ => 1,
        }
    }

    /// Look up a registry entry by label (case-insensitive)
    pub fn from_label(label: &str) -> Option<Pid> {
        Self::ALL
            .into_iter()
            .find(|pid| pid.label().eq_ignore_ascii_case(label))
    }

    /// Look up a registry entry by its Mode 01 id
    pub fn from_hex(id: u8) -> Option<Pid> {
        Self::ALL.into_iter().find(|pid| pid.as_hex() == id)
    }

    /// Decode the data bytes (after the `41 <pid>` header) into a value.
    ///
    /// Returns `None` when fewer bytes than the formula needs are present.
    pub fn decode(&self, bytes: &[u8]) -> Option<f64> {
        if bytes.len() < self.response_bytes() {
            return None;
        }
        let a = bytes[0] as f64;
        let value = match self {
            // A - 40 (°C)
            Pid::CoolantTemp | Pid::IntakeTemp => a - 40.0,
            // (A - 128) / 1.28 (%)
            Pid::ShortFuelTrim | Pid::LongFuelTrim => (a - 128.0) / 1.28,
            // ((A*256)+B)/4
            Pid::Rpm => ((a * 256.0) + bytes[1] as f64) / 4.0,
            // A (km/h)
            Pid::Speed => a,
            // ((A*256)+B) / 100 (g/s)
            Pid::Maf => ((a * 256.0) + bytes[1] as f64) / 100.0,
            // A * 100 / 255 (%)
            Pid::ThrottlePosition => a * 100.0 / 255.0,
        };
        Some(value)
    }
}

/// A requested live parameter: registry entry or bare numeric id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PidDefinition {
    /// Column / display label
    pub label: String,
    /// Mode 01 parameter id
    pub id: u8,
    /// Registry entry, `None` for ids outside the registry
    pub kind: Option<Pid>,
}

impl PidDefinition {
    /// Definition for a registry PID
    pub fn known(pid: Pid) -> Self {
        Self {
            label: pid.label().to_string(),
            id: pid.as_hex(),
            kind: Some(pid),
        }
    }

    /// Definition for an id the registry has no formula for
    pub fn raw(label: impl Into<String>, id: u8) -> Self {
        Self {
            label: label.into(),
            id,
            kind: None,
        }
    }

    /// Display unit (empty for raw ids)
    pub fn unit(&self) -> &'static str {
        self.kind.map(|pid| pid.unit()).unwrap_or("")
    }

    /// Decode data bytes into a value.
    ///
    /// Raw ids yield the big-endian integer of up to four data bytes.
    pub fn decode(&self, bytes: &[u8]) -> Option<f64> {
        match self.kind {
            Some(pid) => pid.decode(bytes),
            None if bytes.is_empty() => None,
            None => {
                let value = bytes
                    .iter()
                    .take(4)
                    .fold(0u64, |acc, b| (acc << 8) | *b as u64);
                Some(value as f64)
            }
        }
    }
}

/// Parse an integer literal with optional `0x`/`0o`/`0b` prefix
pub fn parse_numeric_literal(text: &str) -> Option<u32> {
    let text = text.trim();
    let lower = text.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else {
        (lower.as_str(), 10)
    };
    if digits.is_empty() {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

/// Resolve a label or numeric literal into a PID definition
pub fn resolve(token: &str) -> Option<PidDefinition> {
    let token = token.trim();
    if let Some(pid) = Pid::from_label(token) {
        return Some(PidDefinition::known(pid));
    }
    let id = parse_numeric_literal(token).and_then(|n| u8::try_from(n).ok())?;
    Some(match Pid::from_hex(id) {
        Some(pid) => PidDefinition::known(pid),
        None => PidDefinition::raw(token, id),
    })
}

/// Resolve a comma-separated PID list, keeping request order.
///
/// Unresolvable entries are logged and dropped.
pub fn resolve_list(list: &str) -> Vec<PidDefinition> {
    list.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| {
            let resolved = resolve(token);
            if resolved.is_none() {
                warn!("PID unresolved: {}", token);
            }
            resolved
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpm_decode() {
        // 1A F8 => 0x1AF8 / 4 = 6904 / 4 = 1726
        let value = Pid::Rpm.decode(&[0x1A, 0xF8]).unwrap();
        assert_eq!(value, 1726.0);
    }

    #[test]
    fn test_coolant_temp_decode() {
        // 0x73 = 115, so temp = 115 - 40 = 75°C
        assert_eq!(Pid::CoolantTemp.decode(&[0x73]), Some(75.0));
        assert_eq!(Pid::IntakeTemp.decode(&[0x00]), Some(-40.0));
    }

    #[test]
    fn test_speed_decode() {
        assert_eq!(Pid::Speed.decode(&[0x55]), Some(85.0));
    }

    #[test]
    fn test_fuel_trim_decode() {
        // 0x80 = 128, so trim = 0%
        assert_eq!(Pid::ShortFuelTrim.decode(&[0x80]), Some(0.0));

        // 0x90 = 144, so trim = 16 / 1.28 = 12.5%
        let trim = Pid::LongFuelTrim.decode(&[0x90]).unwrap();
        assert!((trim - 12.5).abs() < 1e-9);
    }

    #[test]
    fn test_maf_and_throttle_decode() {
        assert_eq!(Pid::Maf.decode(&[0x01, 0xF4]), Some(5.0));
        let throttle = Pid::ThrottlePosition.decode(&[0xFF]).unwrap();
        assert!((throttle - 100.0).abs() < 0.01);
    }

    #[test]
    fn test_short_payload_has_no_value() {
        assert_eq!(Pid::Rpm.decode(&[0x1A]), None);
        assert_eq!(Pid::Maf.decode(&[]), None);
        assert_eq!(Pid::Speed.decode(&[]), None);
    }

    #[test]
    fn test_registry_ids_unique() {
        for (i, a) in Pid::ALL.iter().enumerate() {
            for b in &Pid::ALL[i + 1..] {
                assert_ne!(a.as_hex(), b.as_hex());
                assert_ne!(a.label(), b.label());
            }
        }
    }

    #[test]
    fn test_resolve_label_and_literal() {
        let rpm = resolve("rpm").unwrap();
        assert_eq!(rpm.id, 0x0C);
        assert_eq!(rpm.unit(), "rpm");

        // A literal naming a registry id picks up its label and formula
        let speed = resolve("0x0D").unwrap();
        assert_eq!(speed.label, "speed");
        assert_eq!(speed.kind, Some(Pid::Speed));

        let custom = resolve("0x2F").unwrap();
        assert_eq!(custom.label, "0x2F");
        assert_eq!(custom.id, 0x2F);
        assert_eq!(custom.kind, None);
        assert_eq!(custom.decode(&[0x01, 0x02]), Some(258.0));
        assert_eq!(custom.decode(&[]), None);

        assert!(resolve("boost").is_none());
        assert!(resolve("0x1FF").is_none());
    }

    #[test]
    fn test_resolve_list_drops_unknown_keeps_order() {
        let pids = resolve_list("speed, bogus,rpm,,0x11");
        let labels: Vec<_> = pids.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["speed", "rpm", "throttle"]);
    }

    #[test]
    fn test_numeric_literals() {
        assert_eq!(parse_numeric_literal("0x7E0"), Some(0x7E0));
        assert_eq!(parse_numeric_literal("0X7e8"), Some(0x7E8));
        assert_eq!(parse_numeric_literal("2016"), Some(2016));
        assert_eq!(parse_numeric_literal("0b101"), Some(5));
        assert_eq!(parse_numeric_literal("0x"), None);
        assert_eq!(parse_numeric_literal("rpm"), None);
    }
}
