// SPDX-License-Identifier: Apache-2.0
// Copyright Open Network Fabric Authors

//! Millisecond timestamps for translation state.
//!
//! Port map entries store their last-used time in a single atomic word, so
//! the engine works with milliseconds on a monotonic clock that starts at
//! engine creation rather than with [`std::time::Instant`] directly.
//! [`Timestamp::NEVER`] (zero) marks a slot that has never been touched.

use std::time::{Duration, Instant};

/// Milliseconds since the engine's [`Clock`] was created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Timestamp(u64);

impl Timestamp {
    /// The "never touched" sentinel.
    pub const NEVER: Timestamp = Timestamp(0);

    /// Build a timestamp from raw milliseconds.
    #[must_use]
    pub fn from_millis(millis: u64) -> Timestamp {
        Timestamp(millis)
    }

    /// The raw millisecond value.
    #[must_use]
    pub fn as_millis(self) -> u64 {
        self.0
    }

    /// Time elapsed from `earlier` to `self`, zero if `earlier` is later.
    #[must_use]
    pub fn saturating_since(self, earlier: Timestamp) -> Duration {
        Duration::from_millis(self.0.saturating_sub(earlier.0))
    }
}

impl std::ops::Add<Duration> for Timestamp {
    type Output = Timestamp;

    fn add(self, rhs: Duration) -> Timestamp {
        #[allow(clippy::cast_possible_truncation)] // u64 millis outlive any deployment
        Timestamp(self.0 + rhs.as_millis() as u64)
    }
}

/// Monotonic clock handing out [`Timestamp`]s.
#[derive(Debug)]
pub struct Clock {
    start: Instant,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    /// Start a clock at the current instant.
    #[must_use]
    pub fn new() -> Clock {
        Clock {
            start: Instant::now(),
        }
    }

    /// The current timestamp.
    #[must_use]
    pub fn now(&self) -> Timestamp {
        #[allow(clippy::cast_possible_truncation)] // u64 millis outlive any deployment
        Timestamp(self.start.elapsed().as_millis() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_since() {
        let early = Timestamp::from_millis(1000);
        let late = Timestamp::from_millis(2500);
        assert_eq!(late.saturating_since(early), Duration::from_millis(1500));
        assert_eq!(early.saturating_since(late), Duration::ZERO);
        assert_eq!(early + Duration::from_millis(500), Timestamp::from_millis(1500));
    }

    #[test]
    fn clock_is_monotonic() {
        let clock = Clock::new();
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
