//! Overflow guards for 64-bit integer and double arithmetic.
//!
//! Integers travel as a 64-bit pattern plus a flag saying whether the
//! pattern is to be read as signed or unsigned, which is how every integer
//! node in the expression tree produces its value. The functions here never
//! rely on wrapping or trapping: each operation decides up front whether the
//! mathematical result is representable and, if so, whether it must be read
//! as unsigned.

use thiserror::Error;

/// A 64-bit integer value and the signedness it is read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntOperand {
    pub value: i64,
    pub unsigned: bool,
}

impl IntOperand {
    pub fn signed(value: i64) -> Self {
        Self {
            value,
            unsigned: false,
        }
    }

    pub fn unsigned(value: u64) -> Self {
        Self {
            value: value as i64,
            unsigned: true,
        }
    }

    /// True when the mathematical value is negative.
    pub fn is_negative(&self) -> bool {
        !self.unsigned && self.value < 0
    }

    /// Absolute value of the mathematical value.
    pub fn magnitude(&self) -> u64 {
        if self.unsigned {
            self.value as u64
        } else {
            self.value.unsigned_abs()
        }
    }

    /// Mathematical value widened to 128 bits.
    pub fn to_i128(&self) -> i128 {
        if self.unsigned {
            self.value as u64 as i128
        } else {
            self.value as i128
        }
    }
}

/// The mathematical result of an integer operation is outside 64 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integer value is out of range")]
pub struct IntOverflow;

/// A floating-point operation produced an infinite or undefined value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("DOUBLE value is out of range")]
pub struct FloatOverflow;

/// True iff `a + b` exceeds `u64::MAX`.
pub fn unsigned_sum_overflows(a: u64, b: u64) -> bool {
    u64::MAX - a < b
}

/// Addition with signed/unsigned reconciliation.
///
/// Returns the raw 2's-complement sum and whether it must be read as
/// unsigned. Callers still pass it through [`fit_integer`] to check it
/// against the signedness of their own result.
pub fn add(a: IntOperand, b: IntOperand) -> Result<IntOperand, IntOverflow> {
    let raw = a.value.wrapping_add(b.value);
    let mut unsigned = false;

    if a.unsigned {
        if b.unsigned || b.value >= 0 {
            if unsigned_sum_overflows(a.value as u64, b.value as u64) {
                return Err(IntOverflow);
            }
            unsigned = true;
        } else if a.value as u64 > i64::MAX as u64 {
            unsigned = true;
        }
    } else if b.unsigned {
        if a.value >= 0 {
            if unsigned_sum_overflows(a.value as u64, b.value as u64) {
                return Err(IntOverflow);
            }
            unsigned = true;
        } else if b.value as u64 > i64::MAX as u64 {
            unsigned = true;
        }
    } else if a.value >= 0 && b.value >= 0 {
        unsigned = true;
    } else if a.value < 0 && b.value < 0 && raw >= 0 {
        return Err(IntOverflow);
    }

    Ok(IntOperand {
        value: raw,
        unsigned,
    })
}

/// Subtraction with signed/unsigned reconciliation, see [`add`].
pub fn sub(a: IntOperand, b: IntOperand) -> Result<IntOperand, IntOverflow> {
    let raw = a.value.wrapping_sub(b.value);
    let mut unsigned = false;

    if a.unsigned {
        if b.unsigned {
            if (a.value as u64) < (b.value as u64) {
                if raw >= 0 {
                    return Err(IntOverflow);
                }
            } else {
                unsigned = true;
            }
        } else if b.value >= 0 {
            if a.value as u64 > b.value as u64 {
                unsigned = true;
            }
        } else {
            if unsigned_sum_overflows(a.value as u64, b.value.wrapping_neg() as u64) {
                return Err(IntOverflow);
            }
            unsigned = true;
        }
    } else if b.unsigned {
        if (a.value.wrapping_sub(i64::MIN) as u64) < b.value as u64 {
            return Err(IntOverflow);
        }
    } else if a.value >= 0 && b.value < 0 {
        unsigned = true;
    } else if a.value < 0 && b.value > 0 && raw >= 0 {
        return Err(IntOverflow);
    }

    Ok(IntOperand {
        value: raw,
        unsigned,
    })
}

/// Multiplication on magnitudes, see [`add`].
pub fn mul(a: IntOperand, b: IntOperand) -> Result<IntOperand, IntOverflow> {
    let product = a
        .magnitude()
        .checked_mul(b.magnitude())
        .ok_or(IntOverflow)?;

    if a.is_negative() != b.is_negative() {
        if product > 1u64 << 63 {
            return Err(IntOverflow);
        }
        return Ok(IntOperand::signed((product as i64).wrapping_neg()));
    }
    Ok(IntOperand::unsigned(product))
}

/// Integer division truncating towards zero. `None` when `b` is zero.
pub fn int_div(a: IntOperand, b: IntOperand) -> Option<Result<IntOperand, IntOverflow>> {
    if b.value == 0 {
        return None;
    }
    let quot = a.magnitude() / b.magnitude();
    if a.is_negative() != b.is_negative() {
        if quot > 1u64 << 63 {
            return Some(Err(IntOverflow));
        }
        return Some(Ok(IntOperand::signed((quot as i64).wrapping_neg())));
    }
    Some(Ok(IntOperand::unsigned(quot)))
}

/// Remainder with the sign of the dividend. `None` when `b` is zero.
///
/// The result is read with the dividend's signedness.
pub fn int_mod(a: IntOperand, b: IntOperand) -> Option<i64> {
    if b.value == 0 {
        return None;
    }
    let rem = a.magnitude() % b.magnitude();
    if a.is_negative() {
        Some((rem as i64).wrapping_neg())
    } else {
        Some(rem as i64)
    }
}

/// Checks that `result` can be read with the target signedness.
pub fn fit_integer(result: IntOperand, target_unsigned: bool) -> Result<i64, IntOverflow> {
    if target_unsigned && !result.unsigned && result.value < 0 {
        return Err(IntOverflow);
    }
    if !target_unsigned && result.unsigned && result.value as u64 > i64::MAX as u64 {
        return Err(IntOverflow);
    }
    Ok(result.value)
}

/// Maps an infinite or NaN result to [`FloatOverflow`].
pub fn check_float(value: f64) -> Result<f64, FloatOverflow> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(FloatOverflow)
    }
}
