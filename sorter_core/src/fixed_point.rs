//! Fixed-point helpers on top of `sorter_traits::Fixed`.
//!
//! Aggregates are summed in `i128` so a full smoothing window can never overflow,
//! then rounded once, half away from zero.

use sorter_traits::Fixed;
use sorter_traits::fixed::div_round_half_away;

/// Arithmetic mean of the samples, or `None` when there are none.
pub fn mean<I>(samples: I) -> Option<Fixed>
where
    I: IntoIterator<Item = Fixed>,
{
    let mut sum: i128 = 0;
    let mut n: i128 = 0;
    for s in samples {
        sum += i128::from(s.raw());
        n += 1;
    }
    if n == 0 {
        return None;
    }
    let q = div_round_half_away(sum, n);
    // The mean of i64 values always fits in i64.
    debug_assert!((i128::from(i64::MIN)..=i128::from(i64::MAX)).contains(&q));
    Some(Fixed::from_raw(q as i64))
}

const SCALE: i128 = sorter_traits::fixed::SCALE as i128;

#[inline]
fn saturate(v: i128) -> Fixed {
    Fixed::from_raw(i64::try_from(v).unwrap_or(if v < 0 { i64::MIN } else { i64::MAX }))
}

/// Running sum of `Fixed` products kept at twelve decimals.
///
/// Products such as `error * dt` are added unrounded, so contributions below
/// one millionth still build up. Rounding to six decimals happens only when the
/// sum is read back or scaled by a gain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WideAccumulator(i128);

impl WideAccumulator {
    pub const ZERO: Self = Self(0);

    /// Add `a * b` exactly.
    #[inline]
    pub fn add_product(self, a: Fixed, b: Fixed) -> Self {
        Self(
            self.0
                .saturating_add(i128::from(a.raw()) * i128::from(b.raw())),
        )
    }

    /// Clamp into `[-limit, limit]`.
    #[inline]
    pub fn clamp_abs(self, limit: Fixed) -> Self {
        let l = i128::from(limit.raw()).abs() * SCALE;
        Self(self.0.clamp(-l, l))
    }

    /// The sum rounded to six decimals.
    #[inline]
    pub fn to_fixed(self) -> Fixed {
        saturate(div_round_half_away(self.0, SCALE))
    }

    /// `k * sum`, rounded once to six decimals.
    pub fn scaled_by(self, k: Fixed) -> Fixed {
        match i128::from(k.raw()).checked_mul(self.0) {
            Some(p) => saturate(div_round_half_away(p, SCALE * SCALE)),
            None => k * self.to_fixed(),
        }
    }
}

/// `|a - b|` without overflow.
#[inline]
pub fn abs_diff(a: Fixed, b: Fixed) -> Fixed {
    (a - b).abs()
}
