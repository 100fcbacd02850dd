//! Midnight reset scheduling

use chrono::{DateTime, Local, NaiveDate};
use medminder_util::next_local_midnight;

use crate::{TimerKey, TimerQueue};

/// Re-arms the daily reset from the wall clock on every firing, so DST
/// changes and clock adjustments never accumulate drift.
#[derive(Debug)]
pub struct DailyReset {
    current_day: NaiveDate,
    resets: u64,
}

impl DailyReset {
    pub fn new(now: DateTime<Local>) -> Self {
        Self {
            current_day: now.date_naive(),
            resets: 0,
        }
    }

    /// Schedule the next reset at the coming local midnight
    pub fn arm(&self, timers: &mut TimerQueue, now: DateTime<Local>) -> DateTime<Local> {
        let at = next_local_midnight(&now);
        timers.schedule(TimerKey::DailyReset, at);
        at
    }

    /// Record a firing and re-arm for the following midnight
    pub fn fired(&mut self, timers: &mut TimerQueue, now: DateTime<Local>) -> DateTime<Local> {
        self.current_day = now.date_naive();
        self.resets += 1;
        self.arm(timers, now)
    }

    pub fn current_day(&self) -> NaiveDate {
        self.current_day
    }

    pub fn resets(&self) -> u64 {
        self.resets
    }
}
