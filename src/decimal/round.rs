use super::mag::Mag;
use super::{Decimal, DecimalStatus, RoundMode, MAX_PRECISION, MAX_SCALE};
use std::cmp::Ordering;

impl Decimal {
    /// Rounds to `scale` fractional digits, writing into `to`.
    ///
    /// A negative `scale` rounds to the left of the decimal point
    /// (`round(1234, -2) = 1200`). A scale larger than the current one pads
    /// with zeros.
    pub fn round(&self, scale: i32, mode: RoundMode, to: &mut Decimal) -> DecimalStatus {
        let scale = scale.clamp(-(MAX_PRECISION as i32), MAX_SCALE as i32);
        let current = self.scale as i32;

        if scale >= current {
            let coef = self.coef.mul_pow10((scale - current) as u32);
            let (value, status) = Decimal::fit(self.negative, coef, scale as u32);
            *to = value;
            return status;
        }

        let drop = (current - scale) as u32;
        let (mut quot, rem) = self.coef.divmod_pow10(drop);
        let bump = !rem.is_zero()
            && match mode {
                RoundMode::HalfUp => {
                    let half = Mag::pow10(drop - 1).mul_small(5);
                    rem.cmp_mag(&half) != Ordering::Less
                }
                RoundMode::Truncate => false,
                RoundMode::Ceiling => !self.negative,
                RoundMode::Floor => self.negative,
            };
        if bump {
            quot = quot.add_small(1);
        }

        let (coef, new_scale) = if scale < 0 {
            (quot.mul_pow10((-scale) as u32), 0)
        } else {
            (quot, scale as u32)
        };
        let (value, status) = Decimal::fit(self.negative, coef, new_scale);
        *to = value;
        status
    }

    /// Smallest integer not less than `self`.
    pub fn ceiling(&self, to: &mut Decimal) -> DecimalStatus {
        self.round(0, RoundMode::Ceiling, to)
    }

    /// Largest integer not greater than `self`.
    pub fn floor(&self, to: &mut Decimal) -> DecimalStatus {
        self.round(0, RoundMode::Floor, to)
    }
}
