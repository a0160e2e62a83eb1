//! Currency Units and Display Formatting
//!
//! The workflow deals in three denominations: the native base unit (sats),
//! whole coins (BTC) and one fiat currency chosen by the session. Amounts are
//! always dispatched in base units; the other two only exist for display.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Base units per whole coin
pub const SATS_PER_BTC: f64 = 100_000_000.0;

/// Grouping separator inserted by [`format_amount`]
pub const GROUPING_SEPARATOR: char = ',';

/// A denomination an amount can be expressed in
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum CurrencyUnit {
    /// Smallest indivisible unit
    #[default]
    Sats,
    /// Whole coins
    Btc,
    /// The session's fiat currency
    Other,
}

impl CurrencyUnit {
    /// All units, in display order
    pub const ALL: [CurrencyUnit; 3] = [CurrencyUnit::Sats, CurrencyUnit::Btc, CurrencyUnit::Other];

    /// Whether this is the unit amounts are dispatched in
    pub fn is_base_unit(&self) -> bool {
        matches!(self, CurrencyUnit::Sats)
    }

    /// Label shown to the user. `Other` is labelled with the fiat code.
    pub fn label<'a>(&self, fiat_unit: &'a str) -> &'a str {
        match self {
            CurrencyUnit::Sats => "Sats",
            CurrencyUnit::Btc => "BTC",
            CurrencyUnit::Other => fiat_unit,
        }
    }
}

impl fmt::Display for CurrencyUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CurrencyUnit::Sats => write!(f, "Sats"),
            CurrencyUnit::Btc => write!(f, "BTC"),
            CurrencyUnit::Other => write!(f, "OTHER"),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown currency unit '{0}' (expected sats, btc or fiat)")]
pub struct UnitParseError(pub String);

impl FromStr for CurrencyUnit {
    type Err = UnitParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sat" | "sats" | "satoshi" | "satoshis" => Ok(CurrencyUnit::Sats),
            "btc" => Ok(CurrencyUnit::Btc),
            "fiat" | "other" => Ok(CurrencyUnit::Other),
            _ => Err(UnitParseError(s.to_string())),
        }
    }
}

/// Fraction-digit rule for one unit (`min_fraction` digits are always shown,
/// anything past `max_fraction` is rounded away)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFormat {
    pub min_fraction: usize,
    pub max_fraction: usize,
}

impl UnitFormat {
    pub const fn new(min_fraction: usize, max_fraction: usize) -> Self {
        Self {
            min_fraction,
            max_fraction,
        }
    }
}

/// Per-unit format table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitFormats {
    #[serde(default = "default_sats_format")]
    pub sats: UnitFormat,
    #[serde(default = "default_btc_format")]
    pub btc: UnitFormat,
    #[serde(default = "default_other_format")]
    pub other: UnitFormat,
}

fn default_sats_format() -> UnitFormat {
    UnitFormat::new(0, 0)
}

// Eight digits so that sats <-> BTC never loses precision.
fn default_btc_format() -> UnitFormat {
    UnitFormat::new(8, 8)
}

fn default_other_format() -> UnitFormat {
    UnitFormat::new(2, 2)
}

impl Default for UnitFormats {
    fn default() -> Self {
        Self {
            sats: default_sats_format(),
            btc: default_btc_format(),
            other: default_other_format(),
        }
    }
}

impl UnitFormats {
    pub fn get(&self, unit: CurrencyUnit) -> UnitFormat {
        match unit {
            CurrencyUnit::Sats => self.sats,
            CurrencyUnit::Btc => self.btc,
            CurrencyUnit::Other => self.other,
        }
    }

    /// Format `value` for `unit` and read it back as a plain number.
    ///
    /// This is what the amount field shows after a unit switch: the value
    /// rounded to the unit's precision, with grouping separators removed.
    pub fn redisplay(&self, unit: CurrencyUnit, value: f64) -> Result<f64, std::num::ParseFloatError> {
        parse_amount(&format_amount(value, self.get(unit)))
    }

    /// Check every rule has `min_fraction <= max_fraction`
    pub fn validate(&self) -> Result<(), String> {
        for unit in CurrencyUnit::ALL {
            let format = self.get(unit);
            if format.min_fraction > format.max_fraction {
                return Err(format!(
                    "format for {} has min_fraction {} > max_fraction {}",
                    unit, format.min_fraction, format.max_fraction
                ));
            }
        }
        Ok(())
    }
}

/// Format a value with grouping separators, e.g. `1234567.891` with
/// `UnitFormat::new(2, 2)` becomes `"1,234,567.89"`.
pub fn format_amount(value: f64, format: UnitFormat) -> String {
    let fixed = format!("{:.*}", format.max_fraction, value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part),
        None => (fixed.as_str(), ""),
    };

    // Drop trailing zeros beyond the minimum
    let mut frac = frac_part.to_string();
    while frac.len() > format.min_fraction && frac.ends_with('0') {
        frac.pop();
    }

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(GROUPING_SEPARATOR);
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };

    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{}.{}", sign, grouped, frac)
    }
}

/// Parse a displayed amount, ignoring grouping separators
pub fn parse_amount(displayed: &str) -> Result<f64, std::num::ParseFloatError> {
    displayed
        .trim()
        .replace(GROUPING_SEPARATOR, "")
        .parse::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_groups_thousands() {
        assert_eq!(format_amount(1_234_567.0, UnitFormat::new(0, 0)), "1,234,567");
        assert_eq!(format_amount(999.0, UnitFormat::new(0, 0)), "999");
        assert_eq!(format_amount(1000.0, UnitFormat::new(0, 0)), "1,000");
    }

    #[test]
    fn test_format_fraction_rules() {
        assert_eq!(format_amount(1234.5, UnitFormat::new(2, 2)), "1,234.50");
        assert_eq!(format_amount(0.123456789, UnitFormat::new(8, 8)), "0.12345679");
        assert_eq!(format_amount(1.5, UnitFormat::new(0, 4)), "1.5");
        assert_eq!(format_amount(2.0, UnitFormat::new(0, 4)), "2");
    }

    #[test]
    fn test_format_negative() {
        assert_eq!(format_amount(-1234.5, UnitFormat::new(1, 1)), "-1,234.5");
        assert_eq!(format_amount(-0.001, UnitFormat::new(0, 0)), "0");
    }

    #[test]
    fn test_parse_strips_grouping() {
        assert_eq!(parse_amount("1,234,567.89").unwrap(), 1_234_567.89);
        assert_eq!(parse_amount(" 42 ").unwrap(), 42.0);
        assert!(parse_amount("abc").is_err());
    }

    #[test]
    fn test_redisplay_rounds_to_unit_precision() {
        let formats = UnitFormats::default();
        assert_eq!(formats.redisplay(CurrencyUnit::Sats, 1234.7).unwrap(), 1235.0);
        assert_eq!(formats.redisplay(CurrencyUnit::Other, 12.345_6).unwrap(), 12.35);
        assert_eq!(
            formats.redisplay(CurrencyUnit::Btc, 0.000_123_456).unwrap(),
            0.000_123_46
        );
    }

    #[test]
    fn test_unit_from_str() {
        assert_eq!("sats".parse::<CurrencyUnit>().unwrap(), CurrencyUnit::Sats);
        assert_eq!("BTC".parse::<CurrencyUnit>().unwrap(), CurrencyUnit::Btc);
        assert_eq!("fiat".parse::<CurrencyUnit>().unwrap(), CurrencyUnit::Other);
        assert!("doge".parse::<CurrencyUnit>().is_err());
    }

    #[test]
    fn test_unit_labels() {
        assert_eq!(CurrencyUnit::Sats.label("USD"), "Sats");
        assert_eq!(CurrencyUnit::Other.label("EUR"), "EUR");
        assert!(CurrencyUnit::Sats.is_base_unit());
        assert!(!CurrencyUnit::Other.is_base_unit());
    }

    #[test]
    fn test_formats_validate() {
        assert!(UnitFormats::default().validate().is_ok());
        let bad = UnitFormats {
            other: UnitFormat::new(3, 2),
            ..UnitFormats::default()
        };
        assert!(bad.validate().is_err());
    }
}
