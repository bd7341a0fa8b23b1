//! Typed values produced by expression nodes.

pub mod temporal;

pub use temporal::{Temporal, TemporalKind};

use crate::decimal::{Decimal, DecimalStatus, RoundMode};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Scale marker for REAL values whose number of decimals is not fixed.
pub const NOT_FIXED_DEC: u8 = 31;

/// Significant digits of a double.
pub const DBL_DIG: u32 = 15;

/// Display width of a REAL value with `decimals` fractional digits.
pub fn float_length(decimals: u8) -> u32 {
    if decimals < NOT_FIXED_DEC {
        DBL_DIG + 2 + decimals as u32
    } else {
        DBL_DIG + 8
    }
}

/// The category of representation a node natively produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultType {
    Int,
    Real,
    Decimal,
    String,
    Temporal,
}

impl ResultType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultType::Int => "INT",
            ResultType::Real => "REAL",
            ResultType::Decimal => "DECIMAL",
            ResultType::String => "STRING",
            ResultType::Temporal => "TEMPORAL",
        }
    }
}

impl fmt::Display for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single NULL-aware value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    UInt(u64),
    Real(f64),
    Decimal(Decimal),
    String(String),
    Temporal(Temporal),
}

/// Something lost or clamped while converting a value to another domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionNote {
    /// Only a prefix of the text was numeric.
    Truncated {
        type_name: &'static str,
        text: String,
    },
    /// The value did not fit the target and was clamped.
    OutOfRange { type_name: &'static str },
}

impl fmt::Display for ConversionNote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversionNote::Truncated { type_name, text } => {
                write!(f, "Truncated incorrect {} value: '{}'", type_name, text)
            }
            ConversionNote::OutOfRange { type_name } => {
                write!(f, "Out of range value for {}", type_name)
            }
        }
    }
}

/// Splits `text` into its longest numeric prefix (leading spaces skipped)
/// and whether anything but whitespace followed it.
fn numeric_prefix(text: &str, allow_fraction: bool) -> (&str, bool) {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut i = 0;
    if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }
    let digits_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut seen_digits = i > digits_start;
    if allow_fraction {
        if i < bytes.len() && bytes[i] == b'.' {
            let dot = i;
            i += 1;
            let frac_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            seen_digits |= i > frac_start;
            if !seen_digits {
                i = dot;
            }
        }
        if seen_digits && i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mark = i;
            i += 1;
            if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                i += 1;
            }
            let exp_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            if i == exp_start {
                i = mark;
            }
        }
    }
    if !seen_digits {
        return ("", !trimmed.trim_end().is_empty());
    }
    let garbage = trimmed[i..].bytes().any(|b| !b.is_ascii_whitespace());
    (&trimmed[..i], garbage)
}

/// Rounds a double to the nearest integer (ties to even) and clamps it.
pub fn real_to_int(value: f64, unsigned: bool) -> (i64, Option<ConversionNote>) {
    if value.is_nan() {
        return (0, Some(ConversionNote::OutOfRange { type_name: "INTEGER" }));
    }
    let rounded = value.round_ties_even();
    if unsigned {
        if rounded < 0.0 {
            return (0, Some(ConversionNote::OutOfRange { type_name: "INTEGER" }));
        }
        if rounded >= 18_446_744_073_709_551_616.0 {
            return (-1, Some(ConversionNote::OutOfRange { type_name: "INTEGER" }));
        }
        return (rounded as u64 as i64, None);
    }
    if rounded < -9_223_372_036_854_775_808.0 {
        return (i64::MIN, Some(ConversionNote::OutOfRange { type_name: "INTEGER" }));
    }
    if rounded >= 9_223_372_036_854_775_808.0 {
        return (i64::MAX, Some(ConversionNote::OutOfRange { type_name: "INTEGER" }));
    }
    (rounded as i64, None)
}

/// Formats a double with a fixed number of decimals, or in shortest
/// round-trip form when the number of decimals is not fixed.
pub fn format_real(value: f64, decimals: u8) -> String {
    if decimals < NOT_FIXED_DEC {
        return format!("{:.*}", decimals as usize, value);
    }
    if value == 0.0 {
        return "0".to_string();
    }
    let magnitude = value.abs();
    if !(1e-4..1e15).contains(&magnitude) {
        format!("{:e}", value)
    } else {
        format!("{}", value)
    }
}

/// Parses the integer prefix of `text` as a 64-bit pattern.
///
/// Values between `i64::MAX` and `u64::MAX` keep their unsigned bit
/// pattern; anything wider clamps.
fn parse_int_prefix(text: &str) -> (i64, Option<ConversionNote>) {
    let (prefix, garbage) = numeric_prefix(text, false);
    let truncated = || ConversionNote::Truncated {
        type_name: "INTEGER",
        text: text.to_string(),
    };
    if prefix.is_empty() || prefix == "+" || prefix == "-" {
        return (0, (!text.trim().is_empty()).then(truncated));
    }
    let note = garbage.then(truncated);
    match prefix.parse::<i128>() {
        Ok(v) if v >= i64::MIN as i128 && v <= u64::MAX as i128 => (v as i64, note),
        Ok(v) if v < 0 => (i64::MIN, Some(ConversionNote::OutOfRange { type_name: "INTEGER" })),
        _ => (-1, Some(ConversionNote::OutOfRange { type_name: "INTEGER" })),
    }
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Domain of the payload, `None` for NULL.
    pub fn result_type(&self) -> Option<ResultType> {
        match self {
            Value::Null => None,
            Value::Int(_) | Value::UInt(_) => Some(ResultType::Int),
            Value::Real(_) => Some(ResultType::Real),
            Value::Decimal(_) => Some(ResultType::Decimal),
            Value::String(_) => Some(ResultType::String),
            Value::Temporal(_) => Some(ResultType::Temporal),
        }
    }

    /// Integer view as a 64-bit pattern read with `unsigned`.
    pub fn to_int(&self, unsigned: bool) -> (i64, Option<ConversionNote>) {
        match self {
            Value::Null => (0, None),
            Value::Int(v) => (*v, None),
            Value::UInt(v) => (*v as i64, None),
            Value::Real(v) => real_to_int(*v, unsigned),
            Value::Decimal(d) => match d.to_i64(unsigned, RoundMode::HalfUp) {
                (v, DecimalStatus::Ok) => (v, None),
                (v, _) => (v, Some(ConversionNote::OutOfRange { type_name: "INTEGER" })),
            },
            Value::String(s) => parse_int_prefix(s),
            Value::Temporal(t) => (t.to_i64(), None),
        }
    }

    pub fn to_real(&self) -> (f64, Option<ConversionNote>) {
        match self {
            Value::Null => (0.0, None),
            Value::Int(v) => (*v as f64, None),
            Value::UInt(v) => (*v as f64, None),
            Value::Real(v) => (*v, None),
            Value::Decimal(d) => (d.to_f64(), None),
            Value::String(s) => {
                let (prefix, garbage) = numeric_prefix(s, true);
                let value = prefix.parse::<f64>().unwrap_or(0.0);
                let clean = !garbage && (!prefix.is_empty() || s.trim().is_empty());
                let note = (!clean).then(|| ConversionNote::Truncated {
                    type_name: "DOUBLE",
                    text: s.clone(),
                });
                (value, note)
            }
            Value::Temporal(t) => (t.to_decimal(6).to_f64(), None),
        }
    }

    pub fn to_decimal(&self) -> (Decimal, Option<ConversionNote>) {
        match self {
            Value::Null => (Decimal::ZERO, None),
            Value::Int(v) => (Decimal::from_i64(*v), None),
            Value::UInt(v) => (Decimal::from_u64(*v), None),
            Value::Real(v) => match Decimal::from_f64(*v) {
                (d, DecimalStatus::Ok) | (d, DecimalStatus::Truncated) => (d, None),
                (d, _) => (d, Some(ConversionNote::OutOfRange { type_name: "DECIMAL" })),
            },
            Value::Decimal(d) => (*d, None),
            Value::String(s) => match Decimal::parse(s) {
                (d, DecimalStatus::Ok) => (d, None),
                (d, DecimalStatus::Overflow) => {
                    (d, Some(ConversionNote::OutOfRange { type_name: "DECIMAL" }))
                }
                (d, _) if s.trim().is_empty() => (d, None),
                (d, _) => (
                    d,
                    Some(ConversionNote::Truncated {
                        type_name: "DECIMAL",
                        text: s.clone(),
                    }),
                ),
            },
            Value::Temporal(t) => (t.to_decimal(6), None),
        }
    }

    /// Text view; `decimals` fixes the scale of REAL and DECIMAL payloads.
    pub fn to_text(&self, decimals: u8) -> String {
        match self {
            Value::Null => String::new(),
            Value::Int(v) => v.to_string(),
            Value::UInt(v) => v.to_string(),
            Value::Real(v) => format_real(*v, decimals),
            Value::Decimal(d) => {
                let mut rounded = Decimal::ZERO;
                d.round(decimals.min(crate::decimal::MAX_SCALE) as i32, RoundMode::HalfUp, &mut rounded);
                rounded.to_string()
            }
            Value::String(s) => s.clone(),
            Value::Temporal(t) => t.format(decimals.min(6)),
        }
    }

    /// Temporal view; text is parsed, numbers are not accepted.
    pub fn to_temporal(&self) -> Option<Temporal> {
        match self {
            Value::Temporal(t) => Some(*t),
            Value::String(s) => Temporal::parse(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::UInt(v) => write!(f, "{}", v),
            Value::Real(v) => write!(f, "{}", format_real(*v, NOT_FIXED_DEC)),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::String(s) => write!(f, "'{}'", s.replace('\'', "''")),
            Value::Temporal(t) => write!(f, "{} '{}'", t.kind().as_str(), t),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<u64> for Value {
    fn from(v: u64) -> Self {
        Value::UInt(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Real(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<Temporal> for Value {
    fn from(v: Temporal) -> Self {
        Value::Temporal(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_int() {
        assert_eq!(Value::from("42").to_int(false), (42, None));
        assert_eq!(Value::from("  -7  ").to_int(false), (-7, None));
        let (v, note) = Value::from("12abc").to_int(false);
        assert_eq!(v, 12);
        assert!(matches!(note, Some(ConversionNote::Truncated { .. })));
        assert_eq!(Value::from("18446744073709551615").to_int(false).0, -1);
        let (v, note) = Value::from("99999999999999999999999").to_int(false);
        assert_eq!(v, -1);
        assert!(matches!(note, Some(ConversionNote::OutOfRange { .. })));
    }

    #[test]
    fn test_string_to_real() {
        assert_eq!(Value::from("1.5e2").to_real(), (150.0, None));
        let (v, note) = Value::from("abc").to_real();
        assert_eq!(v, 0.0);
        assert!(note.is_some());
        assert_eq!(Value::from("").to_real(), (0.0, None));
    }

    #[test]
    fn test_real_to_int_rounding() {
        assert_eq!(real_to_int(2.5, false), (2, None));
        assert_eq!(real_to_int(-3.5, false), (-4, None));
        assert_eq!(real_to_int(-1.0, true).0, 0);
        assert_eq!(real_to_int(1e30, false).0, i64::MAX);
    }

    #[test]
    fn test_to_text() {
        assert_eq!(Value::Real(0.1 + 0.2).to_text(NOT_FIXED_DEC), "0.30000000000000004");
        assert_eq!(Value::Real(2.0).to_text(3), "2.000");
        assert_eq!(Value::Real(1e20).to_text(NOT_FIXED_DEC), "1e20");
        let d = Decimal::parse("0.666666666").0;
        assert_eq!(Value::Decimal(d).to_text(4), "0.6667");
        assert_eq!(Value::UInt(u64::MAX).to_text(0), "18446744073709551615");
    }

    #[test]
    fn test_display_quotes_strings() {
        assert_eq!(Value::from("it's").to_string(), "'it''s'");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }
}
