//! Simulation time base.
//!
//! All protocol state is stamped with [`SimTime`], an instant measured in
//! nanoseconds since the start of the simulation. Durations use
//! `core::time::Duration`. Instants never go backwards inside one node's
//! event stream, so subtraction of an earlier instant is well defined.

use core::fmt;
use core::ops::{Add, AddAssign, Sub};
use core::time::Duration;

/// An instant on the discrete-event clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[must_use]
pub struct SimTime(u64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: SimTime = SimTime(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub const fn from_micros(micros: u64) -> Self {
        Self(micros * 1_000)
    }

    pub const fn from_millis(millis: u64) -> Self {
        Self(millis * 1_000_000)
    }

    pub const fn from_secs(secs: u64) -> Self {
        Self(secs * 1_000_000_000)
    }

    #[must_use]
    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    #[must_use]
    pub fn as_secs_f64(&self) -> f64 {
        self.0 as f64 / 1e9
    }

    /// Duration since `earlier`, saturating to zero if `earlier` is later.
    pub fn saturating_since(&self, earlier: SimTime) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }

    /// Checked subtraction of a duration, `None` on underflow.
    pub fn checked_sub(&self, d: Duration) -> Option<SimTime> {
        self.0.checked_sub(d.as_nanos() as u64).map(SimTime)
    }

    /// Subtraction of a duration, saturating at the simulation start.
    pub fn saturating_sub(&self, d: Duration) -> SimTime {
        SimTime(self.0.saturating_sub(d.as_nanos() as u64))
    }
}

impl Add<Duration> for SimTime {
    type Output = SimTime;

    fn add(self, rhs: Duration) -> SimTime {
        SimTime(self.0 + rhs.as_nanos() as u64)
    }
}

impl AddAssign<Duration> for SimTime {
    fn add_assign(&mut self, rhs: Duration) {
        self.0 += rhs.as_nanos() as u64;
    }
}

impl Sub<SimTime> for SimTime {
    type Output = Duration;

    fn sub(self, rhs: SimTime) -> Duration {
        Duration::from_nanos(self.0 - rhs.0)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}s", self.as_secs_f64())
    }
}

impl fmt::Debug for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SimTime({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arithmetic() {
        let t = SimTime::from_millis(100);
        let u = t + Duration::from_millis(50);
        assert_eq!(u, SimTime::from_millis(150));
        assert_eq!(u - t, Duration::from_millis(50));
    }

    #[test]
    fn test_saturating_since() {
        let t = SimTime::from_millis(100);
        let u = SimTime::from_millis(150);
        assert_eq!(u.saturating_since(t), Duration::from_millis(50));
        assert_eq!(t.saturating_since(u), Duration::ZERO);
    }

    #[test]
    fn test_checked_sub() {
        let t = SimTime::from_millis(10);
        assert_eq!(
            t.checked_sub(Duration::from_millis(4)),
            Some(SimTime::from_millis(6))
        );
        assert_eq!(t.checked_sub(Duration::from_millis(11)), None);
        assert_eq!(t.saturating_sub(Duration::from_millis(11)), SimTime::ZERO);
    }
}
