//! Unsigned magnitude stored as little-endian base-10^9 limbs.
//!
//! `Mag` is a fixed-capacity, `Copy` value so that every decimal operation
//! works entirely on the caller's stack. The capacity covers the widest
//! intermediate the decimal layer produces (a 65-digit dividend shifted by
//! 76 digits before long division).

use std::cmp::Ordering;

pub(crate) const BASE: u32 = 1_000_000_000;
pub(crate) const DIGITS_PER_LIMB: u32 = 9;
pub(crate) const LIMBS: usize = 24;
pub(crate) const MAX_DIGITS: usize = LIMBS * DIGITS_PER_LIMB as usize;

const POW10: [u32; 10] = [
    1,
    10,
    100,
    1_000,
    10_000,
    100_000,
    1_000_000,
    10_000_000,
    100_000_000,
    1_000_000_000,
];

/// Invariant: limbs at and above `len` are zero and `limbs[len - 1]` is
/// non-zero, so derived equality is value equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mag {
    limbs: [u32; LIMBS],
    len: u8,
}

fn limb_digits(limb: u32) -> u32 {
    let mut n = 1;
    while n < DIGITS_PER_LIMB && limb >= POW10[n as usize] {
        n += 1;
    }
    n
}

impl Mag {
    pub(crate) const ZERO: Mag = Mag {
        limbs: [0; LIMBS],
        len: 0,
    };

    pub(crate) fn from_u128(mut value: u128) -> Self {
        let mut mag = Mag::ZERO;
        let mut i = 0;
        while value > 0 && i < LIMBS {
            mag.limbs[i] = (value % BASE as u128) as u32;
            value /= BASE as u128;
            i += 1;
        }
        mag.len = i as u8;
        mag
    }

    /// Builds a magnitude from most-significant-first decimal digits (0..=9).
    pub(crate) fn from_digits(digits: &[u8]) -> Self {
        let mut mag = Mag::ZERO;
        let digits = &digits[digits.len().saturating_sub(MAX_DIGITS)..];
        for (i, chunk) in digits.rchunks(DIGITS_PER_LIMB as usize).enumerate() {
            mag.limbs[i] = chunk.iter().fold(0u32, |acc, d| acc * 10 + *d as u32);
        }
        mag.len = LIMBS as u8;
        mag.trim();
        mag
    }

    /// `10^n`, or zero when `n` is beyond the capacity.
    pub(crate) fn pow10(n: u32) -> Self {
        let idx = (n / DIGITS_PER_LIMB) as usize;
        if idx >= LIMBS {
            return Mag::ZERO;
        }
        let mut mag = Mag::ZERO;
        mag.limbs[idx] = POW10[(n % DIGITS_PER_LIMB) as usize];
        mag.len = idx as u8 + 1;
        mag
    }

    pub(crate) fn is_zero(&self) -> bool {
        self.len == 0
    }

    fn trim(&mut self) {
        while self.len > 0 && self.limbs[self.len as usize - 1] == 0 {
            self.len -= 1;
        }
    }

    /// Number of significant decimal digits (zero has none).
    pub(crate) fn digits(&self) -> u32 {
        if self.is_zero() {
            return 0;
        }
        let top = self.len as u32 - 1;
        top * DIGITS_PER_LIMB + limb_digits(self.limbs[top as usize])
    }

    pub(crate) fn to_u128(&self) -> Option<u128> {
        let mut acc: u128 = 0;
        for i in (0..self.len as usize).rev() {
            acc = acc
                .checked_mul(BASE as u128)?
                .checked_add(self.limbs[i] as u128)?;
        }
        Some(acc)
    }

    pub(crate) fn cmp_mag(&self, other: &Mag) -> Ordering {
        if self.len != other.len {
            return self.len.cmp(&other.len);
        }
        for i in (0..self.len as usize).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    pub(crate) fn add(&self, other: &Mag) -> Mag {
        let mut out = Mag::ZERO;
        let n = (self.len.max(other.len) as usize + 1).min(LIMBS);
        let mut carry = 0u32;
        for i in 0..n {
            let sum = self.limbs[i] + other.limbs[i] + carry;
            if sum >= BASE {
                out.limbs[i] = sum - BASE;
                carry = 1;
            } else {
                out.limbs[i] = sum;
                carry = 0;
            }
        }
        out.len = n as u8;
        out.trim();
        out
    }

    /// `self - other`; requires `self >= other`.
    pub(crate) fn sub(&self, other: &Mag) -> Mag {
        debug_assert!(self.cmp_mag(other) != Ordering::Less);
        let mut out = Mag::ZERO;
        let mut borrow = 0u32;
        for i in 0..self.len as usize {
            let rhs = other.limbs[i] + borrow;
            if self.limbs[i] >= rhs {
                out.limbs[i] = self.limbs[i] - rhs;
                borrow = 0;
            } else {
                out.limbs[i] = self.limbs[i] + BASE - rhs;
                borrow = 1;
            }
        }
        out.len = self.len;
        out.trim();
        out
    }

    pub(crate) fn mul(&self, other: &Mag) -> Mag {
        let mut acc = [0u64; LIMBS];
        for i in 0..self.len as usize {
            let mut carry = 0u64;
            let a = self.limbs[i] as u64;
            if a == 0 {
                continue;
            }
            for j in 0..other.len as usize {
                let k = i + j;
                if k >= LIMBS {
                    break;
                }
                let cur = acc[k] + a * other.limbs[j] as u64 + carry;
                acc[k] = cur % BASE as u64;
                carry = cur / BASE as u64;
            }
            let mut k = i + other.len as usize;
            while carry > 0 && k < LIMBS {
                let cur = acc[k] + carry;
                acc[k] = cur % BASE as u64;
                carry = cur / BASE as u64;
                k += 1;
            }
        }
        let mut out = Mag::ZERO;
        for (dst, src) in out.limbs.iter_mut().zip(acc.iter()) {
            *dst = *src as u32;
        }
        out.len = LIMBS as u8;
        out.trim();
        out
    }

    pub(crate) fn mul_small(&self, factor: u32) -> Mag {
        let mut out = Mag::ZERO;
        let mut carry = 0u64;
        let mut i = 0;
        while i < LIMBS && (i < self.len as usize || carry > 0) {
            let cur = self.limbs[i] as u64 * factor as u64 + carry;
            out.limbs[i] = (cur % BASE as u64) as u32;
            carry = cur / BASE as u64;
            i += 1;
        }
        out.len = i as u8;
        out.trim();
        out
    }

    pub(crate) fn add_small(&self, addend: u32) -> Mag {
        self.add(&Mag::from_u128(addend as u128))
    }

    pub(crate) fn divmod_small(&self, divisor: u32) -> (Mag, u32) {
        let mut out = Mag::ZERO;
        let mut rem = 0u64;
        for i in (0..self.len as usize).rev() {
            let cur = rem * BASE as u64 + self.limbs[i] as u64;
            out.limbs[i] = (cur / divisor as u64) as u32;
            rem = cur % divisor as u64;
        }
        out.len = self.len;
        out.trim();
        (out, rem as u32)
    }

    pub(crate) fn mul_pow10(&self, n: u32) -> Mag {
        if self.is_zero() || n == 0 {
            return *self;
        }
        let shift = (n / DIGITS_PER_LIMB) as usize;
        let mut out = Mag::ZERO;
        for i in 0..self.len as usize {
            if i + shift < LIMBS {
                out.limbs[i + shift] = self.limbs[i];
            }
        }
        out.len = (self.len as usize + shift).min(LIMBS) as u8;
        out.trim();
        out.mul_small(POW10[(n % DIGITS_PER_LIMB) as usize])
    }

    /// Splits `self` into `(self / 10^n, self % 10^n)`.
    pub(crate) fn divmod_pow10(&self, n: u32) -> (Mag, Mag) {
        if n == 0 {
            return (*self, Mag::ZERO);
        }
        if n >= self.digits() {
            return (Mag::ZERO, *self);
        }
        let shift = (n / DIGITS_PER_LIMB) as usize;
        let mut shifted = Mag::ZERO;
        for i in shift..self.len as usize {
            shifted.limbs[i - shift] = self.limbs[i];
        }
        shifted.len = (self.len as usize - shift) as u8;
        let (quot, _) = shifted.divmod_small(POW10[(n % DIGITS_PER_LIMB) as usize]);
        let rem = self.sub(&quot.mul_pow10(n));
        (quot, rem)
    }

    /// Writes the decimal digits most-significant first, returning how many.
    pub(crate) fn write_digits(&self, out: &mut [u8; MAX_DIGITS]) -> usize {
        if self.is_zero() {
            return 0;
        }
        let total = self.digits() as usize;
        let mut pos = total;
        for i in 0..self.len as usize {
            let mut limb = self.limbs[i];
            let width = if i + 1 == self.len as usize {
                limb_digits(limb)
            } else {
                DIGITS_PER_LIMB
            };
            for _ in 0..width {
                pos -= 1;
                out[pos] = (limb % 10) as u8;
                limb /= 10;
            }
        }
        total
    }

    /// Schoolbook long division, one decimal digit of quotient at a time.
    pub(crate) fn divmod(&self, divisor: &Mag) -> (Mag, Mag) {
        if self.cmp_mag(divisor) == Ordering::Less {
            return (Mag::ZERO, *self);
        }
        if divisor.len == 1 {
            let (quot, rem) = self.divmod_small(divisor.limbs[0]);
            return (quot, Mag::from_u128(rem as u128));
        }
        let mut buf = [0u8; MAX_DIGITS];
        let n = self.write_digits(&mut buf);
        let mut quot = Mag::ZERO;
        let mut rem = Mag::ZERO;
        for &digit in &buf[..n] {
            rem = rem.mul_small(10).add_small(digit as u32);
            let mut q = 0;
            while rem.cmp_mag(divisor) != Ordering::Less {
                rem = rem.sub(divisor);
                q += 1;
            }
            quot = quot.mul_small(10).add_small(q);
        }
        (quot, rem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digits_of(mag: &Mag) -> String {
        let mut buf = [0u8; MAX_DIGITS];
        let n = mag.write_digits(&mut buf);
        if n == 0 {
            return "0".to_string();
        }
        buf[..n].iter().map(|d| (b'0' + d) as char).collect()
    }

    #[test]
    fn test_from_u128_and_digits() {
        let mag = Mag::from_u128(12_345_678_901_234_567_890);
        assert_eq!(mag.digits(), 20);
        assert_eq!(digits_of(&mag), "12345678901234567890");
        assert_eq!(mag.to_u128(), Some(12_345_678_901_234_567_890));
        assert_eq!(Mag::ZERO.digits(), 0);
    }

    #[test]
    fn test_add_sub_carry() {
        let a = Mag::from_u128(999_999_999);
        let b = Mag::from_u128(1);
        let sum = a.add(&b);
        assert_eq!(sum.to_u128(), Some(1_000_000_000));
        assert_eq!(sum.sub(&b), a);
    }

    #[test]
    fn test_mul_and_pow10() {
        let a = Mag::from_u128(123_456_789_012);
        let b = Mag::from_u128(987_654_321);
        assert_eq!(
            a.mul(&b).to_u128(),
            Some(123_456_789_012u128 * 987_654_321u128)
        );
        assert_eq!(Mag::pow10(20).digits(), 21);
        assert_eq!(Mag::from_u128(7).mul_pow10(12).to_u128(), Some(7_000_000_000_000));
    }

    #[test]
    fn test_divmod_pow10() {
        let mag = Mag::from_u128(123_456_789_012_345);
        let (q, r) = mag.divmod_pow10(10);
        assert_eq!(q.to_u128(), Some(12_345));
        assert_eq!(r.to_u128(), Some(6_789_012_345));
    }

    #[test]
    fn test_long_division() {
        let n = Mag::from_digits(&[1; 60]);
        let d = Mag::from_u128(3_000_000_000_000_000_007);
        let (q, r) = n.divmod(&d);
        assert_eq!(q.mul(&d).add(&r), n);
        assert_eq!(r.cmp_mag(&d), Ordering::Less);
    }
}
