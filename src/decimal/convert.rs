//! Conversions between decimals and text, integers and doubles.

use super::mag::{Mag, MAX_DIGITS};
use super::{Decimal, DecimalStatus, RoundMode, MAX_PRECISION, MAX_SCALE};
use std::fmt;
use std::str::FromStr;

impl Decimal {
    pub fn from_i64(value: i64) -> Decimal {
        Decimal {
            negative: value < 0,
            scale: 0,
            coef: Mag::from_u128(value.unsigned_abs() as u128),
        }
    }

    pub fn from_u64(value: u64) -> Decimal {
        Decimal {
            negative: false,
            scale: 0,
            coef: Mag::from_u128(value as u128),
        }
    }

    /// Converts a double through its shortest round-trip representation.
    pub fn from_f64(value: f64) -> (Decimal, DecimalStatus) {
        if value.is_nan() {
            return (Decimal::ZERO, DecimalStatus::BadNumber);
        }
        if value.is_infinite() {
            let max = Decimal::max_value(MAX_PRECISION, 0);
            let clamped = if value < 0.0 { max.negate() } else { max };
            return (clamped, DecimalStatus::Overflow);
        }
        Decimal::parse(&format!("{:e}", value))
    }

    /// Parses `[sign] digits [. digits] [e [sign] digits]`, ignoring
    /// leading whitespace.
    ///
    /// Trailing garbage yields `Truncated`; input without any digit yields
    /// `BadNumber` and zero.
    pub fn parse(text: &str) -> (Decimal, DecimalStatus) {
        let bytes = text.trim_start().as_bytes();
        let mut i = 0;
        let mut negative = false;
        if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
            negative = bytes[i] == b'-';
            i += 1;
        }

        let int_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        let int_part = &bytes[int_start..i];

        let mut frac_part: &[u8] = &[];
        if i < bytes.len() && bytes[i] == b'.' {
            i += 1;
            let frac_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                i += 1;
            }
            frac_part = &bytes[frac_start..i];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return (Decimal::ZERO, DecimalStatus::BadNumber);
        }

        let mut exponent: i64 = 0;
        if i < bytes.len() && (bytes[i] == b'e' || bytes[i] == b'E') {
            let mark = i;
            i += 1;
            let mut exp_negative = false;
            if i < bytes.len() && (bytes[i] == b'+' || bytes[i] == b'-') {
                exp_negative = bytes[i] == b'-';
                i += 1;
            }
            let exp_start = i;
            while i < bytes.len() && bytes[i].is_ascii_digit() {
                exponent = (exponent * 10 + (bytes[i] - b'0') as i64).min(100_000);
                i += 1;
            }
            if exp_start == i {
                i = mark;
                exponent = 0;
            } else if exp_negative {
                exponent = -exponent;
            }
        }

        let trailing = bytes[i..].iter().any(|b| !b.is_ascii_whitespace());
        let (value, status) = Decimal::from_digits(negative, int_part, frac_part, exponent);
        if trailing && status == DecimalStatus::Ok {
            (value, DecimalStatus::Truncated)
        } else {
            (value, status)
        }
    }

    fn from_digits(
        negative: bool,
        int_part: &[u8],
        frac_part: &[u8],
        exponent: i64,
    ) -> (Decimal, DecimalStatus) {
        let digits: Vec<u8> = int_part
            .iter()
            .chain(frac_part.iter())
            .map(|b| b - b'0')
            .skip_while(|d| *d == 0)
            .collect();
        let scale = frac_part.len() as i64 - exponent;
        let int_digits = digits.len() as i64 - scale;

        if int_digits > MAX_PRECISION as i64 {
            let max = Decimal::max_value(MAX_PRECISION, 0);
            let clamped = if negative { max.negate() } else { max };
            return (clamped, DecimalStatus::Overflow);
        }

        if scale < 0 {
            let coef = Mag::from_digits(&digits).mul_pow10((-scale) as u32);
            return Decimal::fit(negative, coef, 0);
        }

        let mut keep = digits.len();
        let mut scale = scale;
        if scale > MAX_SCALE as i64 {
            let excess = (scale - MAX_SCALE as i64) as usize;
            keep = keep.saturating_sub(excess);
            scale = MAX_SCALE as i64;
        }
        if keep > MAX_PRECISION as usize {
            scale -= (keep - MAX_PRECISION as usize) as i64;
            keep = MAX_PRECISION as usize;
        }
        let truncated = digits[keep..].iter().any(|d| *d != 0);
        let (value, status) = Decimal::fit(negative, Mag::from_digits(&digits[..keep]), scale as u32);
        if truncated && status == DecimalStatus::Ok {
            (value, DecimalStatus::Truncated)
        } else {
            (value, status)
        }
    }

    /// Rounds to an integer with `mode` and returns its 64-bit pattern.
    ///
    /// With `unsigned` the pattern is to be read as `u64`; negative values
    /// clamp to zero. Out-of-range values clamp and report `Overflow`.
    pub fn to_i64(&self, unsigned: bool, mode: RoundMode) -> (i64, DecimalStatus) {
        let mut whole = Decimal::ZERO;
        self.round(0, mode, &mut whole);
        let magnitude = whole.coef.to_u128();

        if unsigned {
            if whole.negative {
                return (0, DecimalStatus::Overflow);
            }
            return match magnitude {
                Some(m) if m <= u64::MAX as u128 => (m as u64 as i64, DecimalStatus::Ok),
                _ => (u64::MAX as i64, DecimalStatus::Overflow),
            };
        }

        match (whole.negative, magnitude) {
            (false, Some(m)) if m <= i64::MAX as u128 => (m as i64, DecimalStatus::Ok),
            (false, _) => (i64::MAX, DecimalStatus::Overflow),
            (true, Some(m)) if m <= 1u128 << 63 => ((-(m as i128)) as i64, DecimalStatus::Ok),
            (true, _) => (i64::MIN, DecimalStatus::Overflow),
        }
    }

    /// Nearest double.
    pub fn to_f64(&self) -> f64 {
        self.to_string().parse::<f64>().unwrap_or(0.0)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = [0u8; MAX_DIGITS];
        let n = self.coef.write_digits(&mut buf);
        let scale = self.scale as usize;

        let mut text = String::with_capacity(n + scale + 3);
        if self.negative {
            text.push('-');
        }
        let width = n.max(scale + 1);
        for pos in 0..width {
            if pos == width - scale && scale > 0 {
                text.push('.');
            }
            let digit = if pos < width - n { 0 } else { buf[pos - (width - n)] };
            text.push((b'0' + digit) as char);
        }
        f.write_str(&text)
    }
}

impl FromStr for Decimal {
    type Err = DecimalStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match Decimal::parse(s) {
            (value, DecimalStatus::Ok) => Ok(value),
            (_, status) => Err(status),
        }
    }
}
