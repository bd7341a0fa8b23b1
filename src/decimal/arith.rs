//! Digit-level arithmetic. Each operation writes into `to` and reports a status.

use super::mag::{Mag, DIGITS_PER_LIMB};
use super::{Decimal, DecimalStatus, MAX_SCALE};
use std::cmp::Ordering;

/// Coefficients of `a` and `b` rescaled to their common (larger) scale.
fn align(a: &Decimal, b: &Decimal) -> (Mag, Mag, u32) {
    let scale = a.scale.max(b.scale) as u32;
    (
        a.coef.mul_pow10(scale - a.scale as u32),
        b.coef.mul_pow10(scale - b.scale as u32),
        scale,
    )
}

fn signed_sum(a_neg: bool, a: Mag, b_neg: bool, b: Mag) -> (bool, Mag) {
    if a_neg == b_neg {
        return (a_neg, a.add(&b));
    }
    match a.cmp_mag(&b) {
        Ordering::Less => (b_neg, b.sub(&a)),
        _ => (a_neg, a.sub(&b)),
    }
}

impl Decimal {
    /// `to = self + rhs` with scale `max(s1, s2)`.
    pub fn add(&self, rhs: &Decimal, to: &mut Decimal) -> DecimalStatus {
        let (a, b, scale) = align(self, rhs);
        let (negative, coef) = signed_sum(self.negative, a, rhs.negative, b);
        let (value, status) = Decimal::fit(negative, coef, scale);
        *to = value;
        status
    }

    /// `to = self - rhs` with scale `max(s1, s2)`.
    pub fn sub(&self, rhs: &Decimal, to: &mut Decimal) -> DecimalStatus {
        let (a, b, scale) = align(self, rhs);
        let (negative, coef) = signed_sum(self.negative, a, !rhs.negative, b);
        let (value, status) = Decimal::fit(negative, coef, scale);
        *to = value;
        status
    }

    /// `to = self * rhs`; fractional digits beyond [`MAX_SCALE`] are truncated.
    pub fn mul(&self, rhs: &Decimal, to: &mut Decimal) -> DecimalStatus {
        let coef = self.coef.mul(&rhs.coef);
        let scale = self.scale as u32 + rhs.scale as u32;
        let (value, status) = Decimal::fit(self.negative != rhs.negative, coef, scale);
        *to = value;
        status
    }

    /// `to = self / rhs`.
    ///
    /// The quotient carries `s1 + s2 + scale_incr` fractional digits rounded
    /// up to a whole digit group (capped at [`MAX_SCALE`]) and is truncated
    /// there; callers round it to their display scale.
    pub fn div(&self, rhs: &Decimal, to: &mut Decimal, scale_incr: u8) -> DecimalStatus {
        if rhs.is_zero() {
            *to = Decimal::ZERO;
            return DecimalStatus::DivZero;
        }
        let wanted = self.scale as u32 + rhs.scale as u32 + scale_incr as u32;
        let target = wanted
            .div_ceil(DIGITS_PER_LIMB)
            .saturating_mul(DIGITS_PER_LIMB)
            .min(MAX_SCALE as u32)
            .max(self.scale as u32);
        let shift = target + rhs.scale as u32 - self.scale as u32;
        let (quot, _) = self.coef.mul_pow10(shift).divmod(&rhs.coef);
        let (value, status) = Decimal::fit(self.negative != rhs.negative, quot, target);
        *to = value;
        status
    }

    /// `to = self MOD rhs`; the result takes the sign of the dividend.
    pub fn modulo(&self, rhs: &Decimal, to: &mut Decimal) -> DecimalStatus {
        if rhs.is_zero() {
            *to = Decimal::ZERO;
            return DecimalStatus::DivZero;
        }
        let (a, b, scale) = align(self, rhs);
        let (_, rem) = a.divmod(&b);
        let (value, status) = Decimal::fit(self.negative, rem, scale);
        *to = value;
        status
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::parse(s).0
    }

    fn run(
        op: fn(&Decimal, &Decimal, &mut Decimal) -> DecimalStatus,
        a: &str,
        b: &str,
    ) -> (String, DecimalStatus) {
        let mut out = Decimal::ZERO;
        let status = op(&dec(a), &dec(b), &mut out);
        (out.to_string(), status)
    }

    #[test]
    fn test_add_sub() {
        assert_eq!(run(Decimal::add, "1.5", "2.25").0, "3.75");
        assert_eq!(run(Decimal::add, "-1.5", "0.25").0, "-1.25");
        assert_eq!(run(Decimal::sub, "1", "1.00").0, "0.00");
        assert_eq!(run(Decimal::sub, "-3", "-5").0, "2");
    }

    #[test]
    fn test_add_overflow_clamps() {
        let max = Decimal::max_value(65, 0).to_string();
        let (text, status) = run(Decimal::add, &max, "1");
        assert_eq!(status, DecimalStatus::Overflow);
        assert_eq!(text, max);

        let neg = format!("-{}", max);
        let (text, status) = run(Decimal::sub, &neg, "1");
        assert_eq!(status, DecimalStatus::Overflow);
        assert_eq!(text, neg);
    }

    #[test]
    fn test_mul_scale() {
        assert_eq!(run(Decimal::mul, "1.5", "-0.25").0, "-0.375");
        let (_, status) = run(
            Decimal::mul,
            "0.0000000000000000000000000000000000001",
            "0.123",
        );
        assert_eq!(status, DecimalStatus::Truncated);
    }

    #[test]
    fn test_div() {
        let mut out = Decimal::ZERO;
        assert_eq!(dec("2").div(&dec("3"), &mut out, 4), DecimalStatus::Ok);
        assert_eq!(out.to_string(), "0.666666666");

        assert_eq!(dec("1").div(&dec("0"), &mut out, 4), DecimalStatus::DivZero);

        dec("-7").div(&dec("2"), &mut out, 0);
        assert_eq!(out.to_string(), "-3");
    }

    #[test]
    fn test_modulo_sign_follows_dividend() {
        assert_eq!(run(Decimal::modulo, "-7.5", "2").0, "-1.5");
        assert_eq!(run(Decimal::modulo, "7", "-3").0, "1");
        assert_eq!(run(Decimal::modulo, "7", "0").1, DecimalStatus::DivZero);
    }
}
