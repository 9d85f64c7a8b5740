//! Common time/period helpers for sorter_core.

use std::time::Duration;

use sorter_traits::Fixed;

/// Number of microseconds in one second.
pub const MICROS_PER_SEC: u64 = 1_000_000;

/// Smallest smoothing window, in samples.
pub const MIN_WINDOW: usize = 3;
/// Largest smoothing window, in samples.
pub const MAX_WINDOW: usize = 50;

/// Smoothing window for a loop period: `clamp(round(1 / period_s), 3, 50)`,
/// which keeps roughly one second of history.
/// A zero period is treated as infinitely fast and yields the largest window.
#[inline]
pub fn smoothing_window_len(loop_period: Duration) -> usize {
    let period_us = u64::try_from(loop_period.as_micros()).unwrap_or(u64::MAX);
    if period_us == 0 {
        return MAX_WINDOW;
    }
    // round(1e6 / period_us), ties away from zero
    let per_sec = (MICROS_PER_SEC + period_us / 2) / period_us;
    let per_sec = usize::try_from(per_sec).unwrap_or(MAX_WINDOW);
    per_sec.clamp(MIN_WINDOW, MAX_WINDOW)
}

/// Loop period in seconds as a fixed-point value (microsecond resolution).
#[inline]
pub fn period_seconds(loop_period: Duration) -> Fixed {
    let us = i64::try_from(loop_period.as_micros()).unwrap_or(i64::MAX);
    Fixed::from_raw(us)
}
