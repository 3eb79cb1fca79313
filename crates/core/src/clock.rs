//! Time source abstraction.
//!
//! Ticket windows and expiration checks are always computed from a `Clock`
//! so that tests can move time forward without sleeping.

use std::sync::RwLock;

use chrono::{DateTime, Duration, FixedOffset, Local};

/// Source of the current, timezone-aware instant.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

/// Wall clock in the host's local timezone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<DateTime<FixedOffset>>,
}

impl FixedClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Replace the current instant.
    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = now;
    }

    /// Move the clock forward by `by`.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock_advance() {
        let start = DateTime::parse_from_rfc3339("2024-05-01T10:00:00-03:00").unwrap();
        let clock = FixedClock::new(start);

        clock.advance(Duration::minutes(30));
        assert_eq!(
            clock.now(),
            DateTime::parse_from_rfc3339("2024-05-01T10:30:00-03:00").unwrap()
        );
    }

    #[test]
    fn test_fixed_clock_set() {
        let start = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z").unwrap();
        let later = DateTime::parse_from_rfc3339("2024-06-01T10:00:00Z").unwrap();
        let clock = FixedClock::new(start);

        clock.set(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_system_clock_is_monotonic_enough() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }
}
