use std::sync::Mutex;

use time::{Duration, OffsetDateTime};

use super::lock::mutex_lock;

/// Wall-clock source for job timestamps and retention cutoffs.
pub trait Clock: Send + Sync {
    fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, at: OffsetDateTime) {
        *mutex_lock(&self.now, "application::jobs::clock", "set") = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = mutex_lock(&self.now, "application::jobs::clock", "advance");
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *mutex_lock(&self.now, "application::jobs::clock", "now")
    }
}
