//! Test doubles.

use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use recipe_hub_common::Clock;
use std::sync::Arc;

/// A clock that only moves when told to.
///
/// Clones share the same time, so a test can keep one handle and give another
/// to the code under test.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
        }
    }

    /// Move forward by `step`
    pub fn advance(&self, step: Duration) -> DateTime<Utc> {
        let mut now = self.now.lock();
        *now += step;
        *now
    }

    pub fn advance_secs(&self, seconds: i64) -> DateTime<Utc> {
        self.advance(Duration::seconds(seconds))
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.lock() = at;
    }
}

impl Default for ManualClock {
    /// 2024-01-01T00:00:00Z
    fn default() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_else(Utc::now))
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
