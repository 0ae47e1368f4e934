//! Numbers with unit suffixes, shared by rule documents and conditions.

use opensilicon_core::geometry::{NM_PER_MIL, NM_PER_MM};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Nm,
    Um,
    Mm,
    Mil,
    Inch,
    Deg,
}

impl Unit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.to_ascii_lowercase().as_str() {
            "nm" => Some(Unit::Nm),
            "um" => Some(Unit::Um),
            "mm" => Some(Unit::Mm),
            "mil" | "mils" => Some(Unit::Mil),
            "in" => Some(Unit::Inch),
            "deg" => Some(Unit::Deg),
            _ => None,
        }
    }
}

/// A parsed number and the unit it was written with, if any.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: Option<Unit>,
}

impl Quantity {
    /// Length in nanometres. Bare numbers are millimetres.
    pub fn to_length(self) -> Option<f64> {
        let scale = match self.unit.unwrap_or(Unit::Mm) {
            Unit::Nm => 1.0,
            Unit::Um => 1_000.0,
            Unit::Mm => NM_PER_MM,
            Unit::Mil => NM_PER_MIL,
            Unit::Inch => NM_PER_MIL * 1_000.0,
            Unit::Deg => return None,
        };
        Some(self.value * scale)
    }

    /// Angle in degrees. Bare numbers are degrees.
    pub fn to_angle(self) -> Option<f64> {
        match self.unit {
            None | Some(Unit::Deg) => Some(self.value),
            _ => None,
        }
    }
}

/// Split `text` into a number and an optional unit suffix, e.g. `0.5mm`.
///
/// Returns `None` if the numeric part is malformed or the suffix is not a known unit.
pub fn parse_quantity(text: &str) -> Option<Quantity> {
    let split = text
        .find(|c: char| c.is_ascii_alphabetic())
        .unwrap_or(text.len());
    let (number, suffix) = text.split_at(split);
    let value: f64 = number.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    let unit = if suffix.is_empty() {
        None
    } else {
        Some(Unit::from_suffix(suffix)?)
    };
    Some(Quantity { value, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lengths() {
        assert_eq!(parse_quantity("0.5mm").and_then(Quantity::to_length), Some(500_000.0));
        assert_eq!(parse_quantity("10mil").and_then(Quantity::to_length), Some(254_000.0));
        assert_eq!(parse_quantity("2").and_then(Quantity::to_length), Some(2_000_000.0));
        assert_eq!(parse_quantity("150um").and_then(Quantity::to_length), Some(150_000.0));
    }

    #[test]
    fn test_angles() {
        assert_eq!(parse_quantity("45deg").and_then(Quantity::to_angle), Some(45.0));
        assert_eq!(parse_quantity("90").and_then(Quantity::to_angle), Some(90.0));
        assert_eq!(parse_quantity("1mm").and_then(Quantity::to_angle), None);
        assert_eq!(parse_quantity("45deg").and_then(Quantity::to_length), None);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(parse_quantity("0.5furlong").is_none());
        assert!(parse_quantity("mm").is_none());
        assert!(parse_quantity("1.2.3mm").is_none());
    }
}
