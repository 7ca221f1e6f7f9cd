//! Virtual simulation time.
//!
//! All protocol timing is expressed on a picosecond grid so that sub-nanosecond
//! propagation delays (a few picoseconds per millimetre) and multi-millisecond
//! watchdog windows share one integer representation.
//!
//! - `SimTime`: an absolute instant since the start of the run
//! - `SimDuration`: a non-negative span between two instants

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Sub};

const PICOS_PER_NANO: u64 = 1_000;
const PICOS_PER_MICRO: u64 = 1_000_000;
const PICOS_PER_MILLI: u64 = 1_000_000_000;
const PICOS_PER_SECOND: u64 = 1_000_000_000_000;

/// Absolute point on the virtual time axis, in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimTime(u64);

/// Span of virtual time, in picoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SimDuration(u64);

impl SimTime {
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_picos(picos: u64) -> Self {
        SimTime(picos)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        SimTime(nanos * PICOS_PER_NANO)
    }

    pub const fn from_micros(micros: u64) -> Self {
        SimTime(micros * PICOS_PER_MICRO)
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimTime(millis * PICOS_PER_MILLI)
    }

    pub const fn as_picos(self) -> u64 {
        self.0
    }

    /// Whole nanoseconds, truncated.
    pub const fn as_nanos(self) -> u64 {
        self.0 / PICOS_PER_NANO
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / PICOS_PER_SECOND as f64
    }

    /// Elapsed span since `earlier`, zero if `earlier` lies in the future.
    pub fn saturating_since(self, earlier: SimTime) -> SimDuration {
        SimDuration(self.0.saturating_sub(earlier.0))
    }
}

impl SimDuration {
    pub const ZERO: SimDuration = SimDuration(0);

    pub const fn from_picos(picos: u64) -> Self {
        SimDuration(picos)
    }

    pub const fn from_nanos(nanos: u64) -> Self {
        SimDuration(nanos * PICOS_PER_NANO)
    }

    pub const fn from_micros(micros: u64) -> Self {
        SimDuration(micros * PICOS_PER_MICRO)
    }

    pub const fn from_millis(millis: u64) -> Self {
        SimDuration(millis * PICOS_PER_MILLI)
    }

    /// Rounds to the nearest picosecond; negative and non-finite inputs map to zero.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return SimDuration::ZERO;
        }
        SimDuration((secs * PICOS_PER_SECOND as f64).round() as u64)
    }

    pub const fn as_picos(self) -> u64 {
        self.0
    }

    /// Whole nanoseconds, truncated.
    pub const fn as_nanos(self) -> u64 {
        self.0 / PICOS_PER_NANO
    }

    pub fn as_secs_f64(self) -> f64 {
        self.0 as f64 / PICOS_PER_SECOND as f64
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_sub(other.0))
    }
}

impl Add<SimDuration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimDuration) -> SimTime {
        SimTime(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign<SimDuration> for SimTime {
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub<SimTime> for SimTime {
    type Output = SimDuration;

    fn sub(self, rhs: SimTime) -> SimDuration {
        self.saturating_since(rhs)
    }
}

impl Add for SimDuration {
    type Output = SimDuration;

    fn add(self, rhs: SimDuration) -> SimDuration {
        SimDuration(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for SimDuration {
    fn add_assign(&mut self, rhs: SimDuration) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Mul<u64> for SimDuration {
    type Output = SimDuration;

    fn mul(self, rhs: u64) -> SimDuration {
        SimDuration(self.0.saturating_mul(rhs))
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0 as f64 / PICOS_PER_NANO as f64)
    }
}

impl fmt::Display for SimDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0 as f64 / PICOS_PER_NANO as f64)
    }
}
