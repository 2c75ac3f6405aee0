//! Virtual time in ticks

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Sub-tick units per tick.
pub const UNITS_PER_TICK: u64 = 1_000_000;

/// A point (or span) on the virtual clock, measured in ticks.
///
/// Stored as a fixed-point count of millionths of a tick so fractional waits
/// (e.g. `1000 / 3` ticks between arrivals) do not drift when chained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimTime(u64);

impl SimTime {
    /// Time zero, the start of every run.
    pub const fn zero() -> Self {
        SimTime(0)
    }

    /// Create a SimTime from whole ticks
    pub const fn from_ticks(ticks: u64) -> Self {
        SimTime(ticks.saturating_mul(UNITS_PER_TICK))
    }

    /// Create a SimTime from raw sub-tick units
    pub const fn from_units(units: u64) -> Self {
        SimTime(units)
    }

    /// Create a SimTime from a fractional tick count.
    ///
    /// Negative and non-finite inputs clamp to zero; values beyond the
    /// representable range saturate.
    pub fn from_ticks_f64(ticks: f64) -> Self {
        if !ticks.is_finite() || ticks <= 0.0 {
            return SimTime::zero();
        }
        const MAX_TICKS: f64 = (u64::MAX / UNITS_PER_TICK) as f64;
        if ticks >= MAX_TICKS {
            return SimTime(u64::MAX);
        }
        SimTime((ticks * UNITS_PER_TICK as f64).round() as u64)
    }

    /// Get the raw sub-tick value
    pub const fn as_units(&self) -> u64 {
        self.0
    }

    /// Whole ticks, truncating any fraction
    pub const fn whole_ticks(&self) -> u64 {
        self.0 / UNITS_PER_TICK
    }

    /// Ticks as a float, keeping the fraction
    pub fn as_ticks_f64(&self) -> f64 {
        self.0 as f64 / UNITS_PER_TICK as f64
    }

    /// Ticks elapsed since `earlier`, or zero if `earlier` is later.
    pub fn ticks_since(&self, earlier: SimTime) -> f64 {
        SimTime(self.0.saturating_sub(earlier.0)).as_ticks_f64()
    }
}

impl Add<SimTime> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl Sub<SimTime> for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> Self::Output {
        SimTime(self.0.saturating_sub(rhs.0))
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::zero()
    }
}

impl From<u64> for SimTime {
    /// Whole ticks
    fn from(ticks: u64) -> Self {
        SimTime::from_ticks(ticks)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / UNITS_PER_TICK;
        let frac = self.0 % UNITS_PER_TICK;
        if frac == 0 {
            write!(f, "{whole}t")
        } else {
            let digits = format!("{frac:06}");
            write!(f, "{whole}.{}t", digits.trim_end_matches('0'))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simtime_creation() {
        assert_eq!(SimTime::zero().as_units(), 0);
        assert_eq!(SimTime::from_ticks(3).as_units(), 3 * UNITS_PER_TICK);
        assert_eq!(SimTime::from_ticks(3).whole_ticks(), 3);
        assert_eq!(SimTime::from(7u64), SimTime::from_ticks(7));
    }

    #[test]
    fn test_simtime_fractional() {
        let t = SimTime::from_ticks_f64(1000.0 / 3.0);
        assert_eq!(t.whole_ticks(), 333);
        assert!((t.as_ticks_f64() - 333.333_333).abs() < 1e-6);

        // Three chained thirds land on 1000 ticks within one unit.
        let sum = t + t + t;
        assert!(sum.as_units().abs_diff(SimTime::from_ticks(1000).as_units()) <= 1);
    }

    #[test]
    fn test_simtime_clamps_bad_input() {
        assert_eq!(SimTime::from_ticks_f64(-4.0), SimTime::zero());
        assert_eq!(SimTime::from_ticks_f64(f64::NAN), SimTime::zero());
        assert_eq!(SimTime::from_ticks_f64(f64::INFINITY), SimTime::zero());
        assert_eq!(SimTime::from_ticks_f64(1e300).as_units(), u64::MAX);
    }

    #[test]
    fn test_simtime_arithmetic() {
        let t1 = SimTime::from_ticks(10);
        let t2 = SimTime::from_ticks(4);

        assert_eq!(t1 + t2, SimTime::from_ticks(14));
        assert_eq!(t1 - t2, SimTime::from_ticks(6));
        assert_eq!(t2 - t1, SimTime::zero());
        assert_eq!(t1.ticks_since(t2), 6.0);
        assert_eq!(t2.ticks_since(t1), 0.0);
    }

    #[test]
    fn test_simtime_ordering() {
        let t1 = SimTime::from_ticks(1);
        let t2 = SimTime::from_ticks_f64(1.5);

        assert!(t1 < t2);
        assert!(t2 > t1);
        assert_eq!(t1, t1);
    }

    #[test]
    fn test_simtime_display() {
        assert_eq!(SimTime::from_ticks(12).to_string(), "12t");
        assert_eq!(SimTime::from_ticks_f64(2.5).to_string(), "2.5t");
        assert_eq!(SimTime::from_ticks_f64(0.25).to_string(), "0.25t");
    }
}
