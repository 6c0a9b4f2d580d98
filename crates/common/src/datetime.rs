//! Time source abstraction.
//!
//! Everything that stamps entities reads the time through a [`Clock`] so tests can
//! pin it.

use chrono::{DateTime, Utc};
use std::fmt::Debug;

/// Get the current UTC timestamp.
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Source of the current time.
pub trait Clock: Send + Sync + Debug {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        now_utc()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_clock_is_current() {
        let before = now_utc();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
