//! Base-10 fixed-point numbers for speeds, gains and accumulators.
//!
//! A `Fixed` is an `i64` count of millionths (6 decimal places). Every arithmetic
//! operation is integer-only with explicit rounding (half away from zero) and
//! saturation, so controller outputs and smoothed averages are reproducible bit
//! for bit on every platform.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::str::FromStr;

/// Number of decimal places carried by [`Fixed`].
pub const DECIMALS: u32 = 6;
/// Raw units per whole number.
pub const SCALE: i64 = 1_000_000;

/// Signed decimal with six fractional digits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fixed(i64);

/// Integer division rounded to nearest, ties away from zero.
///
/// Returns 0 when `den == 0`.
#[inline]
pub fn div_round_half_away(num: i128, den: i128) -> i128 {
    if den == 0 {
        return 0;
    }
    let (num, den) = if den < 0 { (-num, -den) } else { (num, den) };
    let half = den / 2;
    if num >= 0 {
        (num + half) / den
    } else {
        (num - half) / den
    }
}

#[inline]
fn saturate(v: i128) -> i64 {
    if v > i128::from(i64::MAX) {
        i64::MAX
    } else if v < i128::from(i64::MIN) {
        i64::MIN
    } else {
        v as i64
    }
}

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(SCALE);
    pub const MAX: Fixed = Fixed(i64::MAX);
    pub const MIN: Fixed = Fixed(i64::MIN);

    /// Build from raw millionths.
    #[inline]
    pub const fn from_raw(raw: i64) -> Self {
        Self(raw)
    }

    /// Raw millionths.
    #[inline]
    pub const fn raw(self) -> i64 {
        self.0
    }

    /// Whole number.
    #[inline]
    pub const fn from_int(v: i64) -> Self {
        Self(v.saturating_mul(SCALE))
    }

    /// `v / 1000`, e.g. milliseconds to seconds.
    #[inline]
    pub const fn from_millis(v: i64) -> Self {
        Self(v.saturating_mul(SCALE / 1000))
    }

    /// Quantize a float to the nearest millionth. Non-finite values yield `None`.
    pub fn from_f64(v: f64) -> Option<Self> {
        if !v.is_finite() {
            return None;
        }
        let scaled = (v * SCALE as f64).round();
        if scaled >= i64::MAX as f64 {
            Some(Self::MAX)
        } else if scaled <= i64::MIN as f64 {
            Some(Self::MIN)
        } else {
            Some(Self(scaled as i64))
        }
    }

    /// Lossy conversion for display and telemetry only.
    #[inline]
    pub fn to_f64(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    #[inline]
    pub const fn abs(self) -> Self {
        Self(self.0.saturating_abs())
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Clamp into `[lo, hi]`. Unlike `Ord::clamp` this never panics; when
    /// `lo > hi` the upper bound wins.
    #[inline]
    pub fn clamp_to(self, lo: Fixed, hi: Fixed) -> Self {
        self.max(lo).min(hi)
    }

    /// Division rounded half away from zero; `None` on a zero divisor.
    pub fn checked_div(self, rhs: Fixed) -> Option<Self> {
        if rhs.0 == 0 {
            return None;
        }
        let num = i128::from(self.0) * i128::from(SCALE);
        Some(Self(saturate(div_round_half_away(num, i128::from(rhs.0)))))
    }

    /// Division by an integer count, rounded half away from zero; `None` when `n == 0`.
    pub fn checked_div_int(self, n: i64) -> Option<Self> {
        if n == 0 {
            return None;
        }
        Some(Self(saturate(div_round_half_away(
            i128::from(self.0),
            i128::from(n),
        ))))
    }
}

impl Add for Fixed {
    type Output = Fixed;
    #[inline]
    fn add(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Fixed {
    #[inline]
    fn add_assign(&mut self, rhs: Fixed) {
        *self = *self + rhs;
    }
}

impl Sub for Fixed {
    type Output = Fixed;
    #[inline]
    fn sub(self, rhs: Fixed) -> Fixed {
        Fixed(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Fixed {
    #[inline]
    fn sub_assign(&mut self, rhs: Fixed) {
        *self = *self - rhs;
    }
}

impl Neg for Fixed {
    type Output = Fixed;
    #[inline]
    fn neg(self) -> Fixed {
        Fixed(self.0.saturating_neg())
    }
}

impl Mul for Fixed {
    type Output = Fixed;
    /// Product rounded half away from zero to six decimals.
    fn mul(self, rhs: Fixed) -> Fixed {
        let wide = i128::from(self.0) * i128::from(rhs.0);
        Fixed(saturate(div_round_half_away(wide, i128::from(SCALE))))
    }
}

impl fmt::Display for Fixed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let neg = self.0 < 0;
        let mag = self.0.unsigned_abs();
        let int = mag / SCALE as u64;
        let frac = mag % SCALE as u64;
        if neg {
            f.write_str("-")?;
        }
        write!(f, "{int}")?;
        if frac != 0 {
            let digits = format!("{frac:06}");
            write!(f, ".{}", digits.trim_end_matches('0'))?;
        }
        Ok(())
    }
}

/// Failure to parse a decimal literal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseFixedError {
    Empty,
    InvalidDigit,
    TooManyDecimals,
    Overflow,
}

impl fmt::Display for ParseFixedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseFixedError::Empty => write!(f, "empty decimal literal"),
            ParseFixedError::InvalidDigit => write!(f, "invalid digit in decimal literal"),
            ParseFixedError::TooManyDecimals => {
                write!(f, "decimal literal has more than {DECIMALS} fractional digits")
            }
            ParseFixedError::Overflow => write!(f, "decimal literal out of range"),
        }
    }
}

impl std::error::Error for ParseFixedError {}

impl FromStr for Fixed {
    type Err = ParseFixedError;

    /// Parses `[+-]digits[.digits]`, exactly, with at most six fractional digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (neg, body) = match s.as_bytes().first() {
            Some(b'-') => (true, &s[1..]),
            Some(b'+') => (false, &s[1..]),
            Some(_) => (false, s),
            None => return Err(ParseFixedError::Empty),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f),
            None => (body, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseFixedError::Empty);
        }
        if frac_part.len() > DECIMALS as usize {
            return Err(ParseFixedError::TooManyDecimals);
        }
        let all_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if !all_digits(int_part) || !all_digits(frac_part) {
            return Err(ParseFixedError::InvalidDigit);
        }

        let mut raw: i128 = 0;
        for b in int_part.bytes() {
            raw = raw * 10 + i128::from(b - b'0');
            if raw > i128::from(i64::MAX) {
                return Err(ParseFixedError::Overflow);
            }
        }
        raw *= i128::from(SCALE);
        let mut frac: i128 = 0;
        for b in frac_part.bytes() {
            frac = frac * 10 + i128::from(b - b'0');
        }
        for _ in frac_part.len()..DECIMALS as usize {
            frac *= 10;
        }
        raw += frac;
        if neg {
            raw = -raw;
        }
        i64::try_from(raw)
            .map(Fixed)
            .map_err(|_| ParseFixedError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fx(s: &str) -> Fixed {
        s.parse().unwrap()
    }

    #[test]
    fn parses_and_displays_exactly() {
        assert_eq!(fx("1.25").raw(), 1_250_000);
        assert_eq!(fx("-0.5").raw(), -500_000);
        assert_eq!(fx("3").raw(), 3_000_000);
        assert_eq!(fx(".75").raw(), 750_000);
        assert_eq!(fx("0.000001").raw(), 1);
        assert_eq!(fx("1.25").to_string(), "1.25");
        assert_eq!(fx("-2.010").to_string(), "-2.01");
        assert_eq!(fx("7").to_string(), "7");
        assert_eq!(fx("-0.000001").to_string(), "-0.000001");
    }

    #[test]
    fn rejects_bad_literals() {
        assert_eq!("".parse::<Fixed>(), Err(ParseFixedError::Empty));
        assert_eq!(".".parse::<Fixed>(), Err(ParseFixedError::Empty));
        assert_eq!("1.2345678".parse::<Fixed>(), Err(ParseFixedError::TooManyDecimals));
        assert_eq!("1e3".parse::<Fixed>(), Err(ParseFixedError::InvalidDigit));
        assert_eq!(
            "99999999999999999999".parse::<Fixed>(),
            Err(ParseFixedError::Overflow)
        );
    }

    #[test]
    fn multiplication_rounds_half_away_from_zero() {
        // 0.000001 * 0.5 = 0.0000005 -> 0.000001
        assert_eq!((Fixed::from_raw(1) * fx("0.5")).raw(), 1);
        assert_eq!((Fixed::from_raw(-1) * fx("0.5")).raw(), -1);
        assert_eq!(fx("1.5") * fx("2"), fx("3"));
        assert_eq!(fx("0.1") * fx("0.1"), fx("0.01"));
    }

    #[test]
    fn division_rounds_and_guards_zero() {
        assert_eq!(fx("1").checked_div(fx("3")), Some(fx("0.333333")));
        assert_eq!(fx("2").checked_div(fx("3")), Some(fx("0.666667")));
        assert_eq!(fx("-2").checked_div(fx("3")), Some(fx("-0.666667")));
        assert_eq!(fx("1").checked_div(Fixed::ZERO), None);
        assert_eq!(fx("0.3").checked_div_int(2), Some(fx("0.15")));
        assert_eq!(Fixed::from_raw(3).checked_div_int(2), Some(Fixed::from_raw(2)));
        assert_eq!(Fixed::from_raw(-3).checked_div_int(2), Some(Fixed::from_raw(-2)));
    }

    #[test]
    fn saturates_instead_of_overflowing() {
        assert_eq!(Fixed::MAX + Fixed::ONE, Fixed::MAX);
        assert_eq!(Fixed::MIN - Fixed::ONE, Fixed::MIN);
        assert_eq!(Fixed::MAX * fx("2"), Fixed::MAX);
        assert_eq!(-Fixed::MIN, Fixed::MAX);
    }

    #[test]
    fn clamp_to_never_panics() {
        assert_eq!(fx("5").clamp_to(fx("0"), fx("3")), fx("3"));
        assert_eq!(fx("-1").clamp_to(fx("0"), fx("3")), fx("0"));
        assert_eq!(fx("1").clamp_to(fx("3"), fx("0")), fx("0"));
    }

    #[test]
    fn float_quantization() {
        assert_eq!(Fixed::from_f64(0.1), Some(fx("0.1")));
        assert_eq!(Fixed::from_f64(-2.5), Some(fx("-2.5")));
        assert_eq!(Fixed::from_f64(f64::NAN), None);
        assert_eq!(Fixed::from_millis(100), fx("0.1"));
    }
}
