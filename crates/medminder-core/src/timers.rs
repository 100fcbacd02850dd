//! Cancellable one-shot timers
//!
//! Timers are plain deadlines keyed by what they do. The engine drains due
//! timers at the start of every tick, so scheduling a key again replaces the
//! previous deadline and cancelling a key guarantees it never fires.

use chrono::{DateTime, Local};
use medminder_util::{MedicationId, instant_after};
use std::collections::HashMap;
use std::time::Duration;

/// What a timer does when it fires
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TimerKey {
    /// A snoozed dose reminder returns to the feed
    DoseSnooze(MedicationId),
    /// A changed refill date is evaluated against the reminder window
    RefillSettle(MedicationId),
    /// Tracking state is cleared at local midnight
    DailyReset,
}

impl TimerKey {
    pub fn medication_id(&self) -> Option<&MedicationId> {
        match self {
            TimerKey::DoseSnooze(id) | TimerKey::RefillSettle(id) => Some(id),
            TimerKey::DailyReset => None,
        }
    }
}

/// Pending timers by key
#[derive(Debug, Default)]
pub struct TimerQueue {
    deadlines: HashMap<TimerKey, DateTime<Local>>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `key` to fire at `at`, replacing any pending deadline for it
    pub fn schedule(&mut self, key: TimerKey, at: DateTime<Local>) -> Option<DateTime<Local>> {
        self.deadlines.insert(key, at)
    }

    /// Schedule `key` to fire `delay` after `now`
    pub fn schedule_after(
        &mut self,
        key: TimerKey,
        now: DateTime<Local>,
        delay: Duration,
    ) -> DateTime<Local> {
        let at = instant_after(&now, delay);
        self.schedule(key, at);
        at
    }

    /// Cancel a pending timer; returns whether one was pending
    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        self.deadlines.remove(key).is_some()
    }

    /// Cancel every timer belonging to a medication
    pub fn cancel_medication(&mut self, id: &MedicationId) -> usize {
        let before = self.deadlines.len();
        self.deadlines.retain(|key, _| key.medication_id() != Some(id));
        before - self.deadlines.len()
    }

    /// Cancel every pending dose snooze
    pub fn cancel_dose_snoozes(&mut self) -> usize {
        let before = self.deadlines.len();
        self.deadlines
            .retain(|key, _| !matches!(key, TimerKey::DoseSnooze(_)));
        before - self.deadlines.len()
    }

    pub fn deadline(&self, key: &TimerKey) -> Option<DateTime<Local>> {
        self.deadlines.get(key).copied()
    }

    pub fn is_scheduled(&self, key: &TimerKey) -> bool {
        self.deadlines.contains_key(key)
    }

    /// Earliest pending deadline
    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.deadlines.values().min().copied()
    }

    /// Remove and return every timer due at `now`, earliest first
    pub fn take_due(&mut self, now: DateTime<Local>) -> Vec<TimerKey> {
        let mut due: Vec<(DateTime<Local>, TimerKey)> = self
            .deadlines
            .iter()
            .filter(|(_, at)| **at <= now)
            .map(|(key, at)| (*at, key.clone()))
            .collect();
        due.sort();

        for (_, key) in &due {
            self.deadlines.remove(key);
        }

        due.into_iter().map(|(_, key)| key).collect()
    }

    pub fn len(&self) -> usize {
        self.deadlines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deadlines.is_empty()
    }
}
