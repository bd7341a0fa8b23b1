//! Fixed-point decimal numbers.
//!
//! A [`Decimal`] is an exact base-10 value: a sign, an unscaled coefficient
//! held in base-10^9 digit groups, and a scale (number of fractional digits).
//! Values are `Copy` and live on the stack. Every arithmetic operation writes
//! into a caller-owned result and reports a [`DecimalStatus`] instead of
//! failing, so callers decide whether a condition is a warning, a NULL or an
//! error.

mod arith;
mod convert;
mod mag;
mod round;

use mag::Mag;
use std::cmp::Ordering;
use std::fmt;

/// Maximum number of significant digits in a decimal value.
pub const MAX_PRECISION: u8 = 65;

/// Maximum number of fractional digits in a decimal value.
pub const MAX_SCALE: u8 = 38;

/// Outcome of a digit-level decimal operation.
///
/// Ordered by severity: anything above `Overflow` means the result is not
/// usable and the calling node produces NULL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DecimalStatus {
    Ok,
    /// Fractional digits were dropped to fit the result.
    Truncated,
    /// The integer part did not fit; the result was clamped to the maximum.
    Overflow,
    DivZero,
    BadNumber,
}

impl DecimalStatus {
    /// Numeric code used in diagnostics (bit values of the classic decimal library).
    pub fn code(self) -> u8 {
        match self {
            DecimalStatus::Ok => 0,
            DecimalStatus::Truncated => 1,
            DecimalStatus::Overflow => 2,
            DecimalStatus::DivZero => 4,
            DecimalStatus::BadNumber => 8,
        }
    }

    /// True when the result must not be used.
    pub fn is_fatal(self) -> bool {
        self > DecimalStatus::Overflow
    }

    pub(crate) fn worst(self, other: DecimalStatus) -> DecimalStatus {
        self.max(other)
    }
}

/// Rounding applied when digits are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundMode {
    /// Round half away from zero.
    HalfUp,
    /// Drop the discarded digits.
    Truncate,
    /// Round towards positive infinity.
    Ceiling,
    /// Round towards negative infinity.
    Floor,
}

/// An exact decimal value with at most [`MAX_PRECISION`] digits.
#[derive(Clone, Copy)]
pub struct Decimal {
    negative: bool,
    scale: u8,
    coef: Mag,
}

impl Decimal {
    pub const ZERO: Decimal = Decimal {
        negative: false,
        scale: 0,
        coef: Mag::ZERO,
    };

    /// Largest magnitude representable with `precision` digits, `scale` of them fractional.
    pub fn max_value(precision: u8, scale: u8) -> Decimal {
        let precision = precision.clamp(1, MAX_PRECISION);
        let scale = scale.min(MAX_SCALE).min(precision);
        let nines = Mag::pow10(precision as u32).sub(&Mag::from_u128(1));
        Decimal {
            negative: false,
            scale,
            coef: nines,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.coef.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Number of fractional digits.
    pub fn scale(&self) -> u8 {
        self.scale
    }

    /// Total number of digits, counting fractional zeros and at least one digit.
    pub fn precision(&self) -> u8 {
        (self.coef.digits() as u8).max(self.scale).max(1)
    }

    /// Number of digits left of the decimal point.
    pub fn int_digits(&self) -> u8 {
        (self.coef.digits() as u8).saturating_sub(self.scale)
    }

    /// Returns the value with its sign flipped. Zero stays positive.
    pub fn negate(&self) -> Decimal {
        let mut out = *self;
        out.negative = !self.negative && !self.is_zero();
        out
    }

    pub fn abs(&self) -> Decimal {
        let mut out = *self;
        out.negative = false;
        out
    }

    /// Compares by value; scale does not matter (`1.0 == 1.00`).
    pub fn compare(&self, other: &Decimal) -> Ordering {
        match (self.negative, other.negative) {
            (false, true) => return Ordering::Greater,
            (true, false) => return Ordering::Less,
            _ => {}
        }
        let scale = self.scale.max(other.scale) as u32;
        let lhs = self.coef.mul_pow10(scale - self.scale as u32);
        let rhs = other.coef.mul_pow10(scale - other.scale as u32);
        let ord = lhs.cmp_mag(&rhs);
        if self.negative {
            ord.reverse()
        } else {
            ord
        }
    }

    /// Builds a decimal from raw parts, fitting it into the precision bounds.
    ///
    /// Excess fractional digits are truncated first; an integer part wider
    /// than [`MAX_PRECISION`] clamps to the maximum magnitude.
    pub(crate) fn fit(negative: bool, coef: Mag, scale: u32) -> (Decimal, DecimalStatus) {
        let mut coef = coef;
        let mut scale = scale;
        let mut status = DecimalStatus::Ok;

        if scale > MAX_SCALE as u32 {
            let (quot, rem) = coef.divmod_pow10(scale - MAX_SCALE as u32);
            if !rem.is_zero() {
                status = DecimalStatus::Truncated;
            }
            coef = quot;
            scale = MAX_SCALE as u32;
        }

        let digits = coef.digits();
        if digits.saturating_sub(scale) > MAX_PRECISION as u32 {
            let max = Decimal::max_value(MAX_PRECISION, 0);
            let clamped = if negative { max.negate() } else { max };
            return (clamped, DecimalStatus::Overflow);
        }

        if digits > MAX_PRECISION as u32 {
            let drop = digits - MAX_PRECISION as u32;
            let (quot, rem) = coef.divmod_pow10(drop);
            if !rem.is_zero() {
                status = DecimalStatus::Truncated;
            }
            coef = quot;
            scale -= drop;
        }

        let value = Decimal {
            negative: negative && !coef.is_zero(),
            scale: scale as u8,
            coef,
        };
        (value, status)
    }
}

impl Default for Decimal {
    fn default() -> Self {
        Decimal::ZERO
    }
}

impl PartialEq for Decimal {
    fn eq(&self, other: &Self) -> bool {
        self.compare(other) == Ordering::Equal
    }
}

impl Eq for Decimal {}

impl PartialOrd for Decimal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Decimal {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

impl fmt::Debug for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Decimal({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        let (d, status) = Decimal::parse(s);
        assert_eq!(status, DecimalStatus::Ok, "parsing {}", s);
        d
    }

    #[test]
    fn test_max_value() {
        assert_eq!(Decimal::max_value(5, 2).to_string(), "999.99");
        assert_eq!(Decimal::max_value(3, 0).to_string(), "999");
    }

    #[test]
    fn test_compare_ignores_scale() {
        assert_eq!(dec("1.0").compare(&dec("1.00")), Ordering::Equal);
        assert_eq!(dec("-2").compare(&dec("1.5")), Ordering::Less);
        assert_eq!(dec("-2").compare(&dec("-2.5")), Ordering::Greater);
        assert!(dec("0.001") > Decimal::ZERO);
    }

    #[test]
    fn test_precision_and_int_digits() {
        let d = dec("123.45");
        assert_eq!(d.precision(), 5);
        assert_eq!(d.scale(), 2);
        assert_eq!(d.int_digits(), 3);
        assert_eq!(dec("0.001").precision(), 3);
    }

    #[test]
    fn test_negative_zero_is_positive() {
        assert!(!dec("-0.00").is_negative());
        assert!(!Decimal::ZERO.negate().is_negative());
    }

    #[test]
    fn test_status_ordering() {
        assert!(!DecimalStatus::Overflow.is_fatal());
        assert!(DecimalStatus::DivZero.is_fatal());
        assert_eq!(DecimalStatus::Truncated.worst(DecimalStatus::Ok), DecimalStatus::Truncated);
        assert_eq!(DecimalStatus::BadNumber.code(), 8);
    }
}
