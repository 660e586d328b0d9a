// Copyright (c) 2026 the osal authors
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! `OS_time_t`: a signed 64-bit tick count at 100ns per tick (`spec.md`
//! §4.7). All conversions are deterministic integer math, no floats.

use core::ops::{Add, Sub};

/// Ticks per second, microsecond, and millisecond at the 100ns tick rate.
pub const TICKS_PER_SECOND: i64 = 10_000_000;
pub const TICKS_PER_MILLISECOND: i64 = 10_000;
pub const TICKS_PER_MICROSECOND: i64 = 10;

/// Factor relating 32-bit fixed-point subseconds to ticks: one second is
/// both `2^32` subseconds and `10^7` ticks, so `ticks = subsec * 10^7 / 2^32
/// = subsec * 2_500_000 / 2^30`.
const SUBSEC_TICK_NUMERATOR: i64 = 2_500_000;
const SUBSEC_SHIFT: u32 = 30;

/// A signed 100ns tick count, the sole time representation used by every
/// timestamp and duration in this crate. No wrapping or overflow check is
/// defined for `Add`/`Subtract`; this deliberately matches the original's
/// undefined-on-overflow tick arithmetic by using Rust's wrapping ops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct TimeValue(i64);

impl TimeValue {
    pub const ZERO: TimeValue = TimeValue(0);

    #[must_use]
    pub fn from_ticks(ticks: i64) -> Self {
        TimeValue(ticks)
    }

    #[must_use]
    pub fn ticks(self) -> i64 {
        self.0
    }

    #[must_use]
    pub fn from_seconds(s: i64) -> Self {
        TimeValue(s.wrapping_mul(TICKS_PER_SECOND))
    }

    #[must_use]
    pub fn from_milliseconds(ms: i64) -> Self {
        TimeValue(ms.wrapping_mul(TICKS_PER_MILLISECOND))
    }

    #[must_use]
    pub fn from_microseconds(us: i64) -> Self {
        TimeValue(us.wrapping_mul(TICKS_PER_MICROSECOND))
    }

    /// Truncating: a tick is 100ns, so any remainder under 100ns is lost.
    #[must_use]
    pub fn from_nanoseconds(ns: i64) -> Self {
        TimeValue(ns / 100)
    }

    /// `seconds` and a fractional `subseconds` part (whole + fraction
    /// composed from a single physical moment expressed in one unit).
    #[must_use]
    pub fn assemble_from_seconds(whole: i64, frac_seconds: i64) -> Self {
        TimeValue(whole.wrapping_mul(TICKS_PER_SECOND).wrapping_add(frac_seconds.wrapping_mul(TICKS_PER_SECOND)))
    }

    #[must_use]
    pub fn assemble_from_milliseconds(whole_seconds: i64, frac_ms: i64) -> Self {
        TimeValue(
            whole_seconds
                .wrapping_mul(TICKS_PER_SECOND)
                .wrapping_add(frac_ms.wrapping_mul(TICKS_PER_MILLISECOND)),
        )
    }

    #[must_use]
    pub fn assemble_from_microseconds(whole_seconds: i64, frac_us: i64) -> Self {
        TimeValue(
            whole_seconds
                .wrapping_mul(TICKS_PER_SECOND)
                .wrapping_add(frac_us.wrapping_mul(TICKS_PER_MICROSECOND)),
        )
    }

    #[must_use]
    pub fn assemble_from_nanoseconds(whole_seconds: i64, frac_ns: i64) -> Self {
        TimeValue(
            whole_seconds
                .wrapping_mul(TICKS_PER_SECOND)
                .wrapping_add(frac_ns / 100),
        )
    }

    /// `subseconds` is a 32-bit fixed-point fraction of a second
    /// (`0 == .0`, `2^32-1 ≈ .99999999977`).
    #[must_use]
    pub fn assemble_from_subseconds(whole_seconds: i64, subseconds: u32) -> Self {
        let frac_ticks = (i64::from(subseconds) * SUBSEC_TICK_NUMERATOR) >> SUBSEC_SHIFT;
        TimeValue(whole_seconds.wrapping_mul(TICKS_PER_SECOND).wrapping_add(frac_ticks))
    }

    #[must_use]
    pub fn total_seconds(self) -> i64 {
        self.0.div_euclid(TICKS_PER_SECOND)
    }

    #[must_use]
    pub fn total_milliseconds(self) -> i64 {
        self.0.div_euclid(TICKS_PER_MILLISECOND)
    }

    #[must_use]
    pub fn total_microseconds(self) -> i64 {
        self.0.div_euclid(TICKS_PER_MICROSECOND)
    }

    #[must_use]
    pub fn total_nanoseconds(self) -> i64 {
        self.0.wrapping_mul(100)
    }

    #[must_use]
    pub fn seconds_part(self) -> i64 {
        self.total_seconds()
    }

    #[must_use]
    pub fn milliseconds_part(self) -> i64 {
        self.frac_ticks().div_euclid(TICKS_PER_MILLISECOND)
    }

    #[must_use]
    pub fn microseconds_part(self) -> i64 {
        self.frac_ticks().div_euclid(TICKS_PER_MICROSECOND)
    }

    #[must_use]
    pub fn nanoseconds_part(self) -> i64 {
        self.frac_ticks().wrapping_mul(100)
    }

    /// Round the fractional-second tick remainder up into a 32-bit
    /// fixed-point subsecond fraction. The `+N-1` rounding-up does not
    /// round-trip exactly for every tick value; the original's own
    /// comment documents this as a known, accepted imprecision and this
    /// port preserves it rather than "fixing" it.
    #[must_use]
    pub fn subseconds_part(self) -> u32 {
        let frac = self.frac_ticks();
        #[allow(
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss,
            reason = "frac_ticks() is in [0, TICKS_PER_SECOND), result fits u32 by construction"
        )]
        let subsec = (((frac << SUBSEC_SHIFT) + SUBSEC_TICK_NUMERATOR - 1) / SUBSEC_TICK_NUMERATOR) as u32;
        subsec
    }

    fn frac_ticks(self) -> i64 {
        self.0.rem_euclid(TICKS_PER_SECOND)
    }

    #[must_use]
    pub fn add(self, other: TimeValue) -> TimeValue {
        TimeValue(self.0.wrapping_add(other.0))
    }

    #[must_use]
    pub fn subtract(self, other: TimeValue) -> TimeValue {
        TimeValue(self.0.wrapping_sub(other.0))
    }
}

impl Add for TimeValue {
    type Output = TimeValue;
    fn add(self, rhs: TimeValue) -> TimeValue {
        TimeValue::add(self, rhs)
    }
}

impl Sub for TimeValue {
    type Output = TimeValue;
    fn sub(self, rhs: TimeValue) -> TimeValue {
        TimeValue::subtract(self, rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn millisecond_roundtrip() {
        let t = TimeValue::assemble_from_milliseconds(1, 901);
        assert_eq!(t.total_milliseconds(), 1901);
        assert_eq!(t.milliseconds_part(), 901);
    }

    #[test]
    fn nanosecond_sum_matches_scenario() {
        let a = TimeValue::assemble_from_nanoseconds(3, 777_777_777);
        let b = TimeValue::assemble_from_nanoseconds(4, 888_888_888);
        assert_eq!((a + b).total_milliseconds(), 8666);
    }

    #[test]
    fn subsecond_zero_roundtrips() {
        let t = TimeValue::assemble_from_subseconds(0, 0);
        assert_eq!(t.subseconds_part(), 0);
    }

    #[test]
    fn subsecond_half_roundtrips_closely() {
        let half = 1u32 << 31;
        let t = TimeValue::assemble_from_subseconds(0, half);
        // not required to be exact (documented imprecision), but must be close.
        let back = t.subseconds_part();
        assert!(back.abs_diff(half) < 4);
    }

    #[test]
    fn microsecond_roundtrip_law() {
        for s in [0i64, 1, 1000, 1_000_000] {
            for u in [0i64, 1, 500_000, 999_999] {
                let t = TimeValue::assemble_from_microseconds(s, u);
                assert_eq!(t.total_seconds(), s);
                assert_eq!(t.microseconds_part(), u);
            }
        }
    }

    #[test]
    fn serial_like_wrap_does_not_panic() {
        let near_max = TimeValue::from_ticks(i64::MAX);
        let one = TimeValue::from_ticks(1);
        let _ = near_max + one; // wraps silently, must not panic
    }
}
