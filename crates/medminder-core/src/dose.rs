//! Dose reminder tracking
//!
//! Each (medication, resolved time) pair moves through
//! `Idle -> Notified -> Snoozed -> Notified`, and back to `Idle` only when
//! the daily reset clears the day's keys. Marking a dose as taken pins every
//! resolved time of the medication as notified.

use chrono::{DateTime, Local, NaiveDate};
use medminder_api::Medication;
use medminder_util::{ClockTime, MedicationId};
use std::collections::{HashMap, HashSet};

use crate::resolve_dose_times;

/// Identifies one dose reminder slot
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DoseKey {
    pub medication_id: MedicationId,
    pub date: NaiveDate,
    pub time: ClockTime,
}

impl DoseKey {
    pub fn new(medication_id: MedicationId, date: NaiveDate, time: ClockTime) -> Self {
        Self {
            medication_id,
            date,
            time,
        }
    }
}

/// A snoozed dose reminder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DoseSnooze {
    pub until: DateTime<Local>,
    /// Slot the reminder was issued for; the re-issued entry shows it again
    pub time: ClockTime,
}

/// Dose reminder state for the current day
#[derive(Debug, Default)]
pub struct DoseTracker {
    notified_today: HashSet<DoseKey>,
    snoozed: HashMap<MedicationId, DoseSnooze>,
}

impl DoseTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find medications whose resolved time matches `now`'s minute and that
    /// have not been notified for that slot, marking each as notified.
    ///
    /// Results follow the order of `medications`.
    pub fn evaluate<'a>(
        &mut self,
        now: DateTime<Local>,
        medications: &'a [Medication],
        user_default_time: ClockTime,
    ) -> Vec<(&'a Medication, ClockTime)> {
        let today = now.date_naive();
        let current = ClockTime::of(&now);
        let mut due = Vec::new();

        for medication in medications {
            if !medication.takes_doses_on(today) || self.is_snoozed(&medication.id, now) {
                continue;
            }

            for time in resolve_dose_times(medication, user_default_time) {
                if time != current {
                    continue;
                }
                if self
                    .notified_today
                    .insert(DoseKey::new(medication.id.clone(), today, time))
                {
                    due.push((medication, time));
                }
            }
        }

        due
    }

    /// Whether a snooze is pending for the medication at `now`
    pub fn is_snoozed(&self, id: &MedicationId, now: DateTime<Local>) -> bool {
        self.snoozed.get(id).is_some_and(|s| s.until > now)
    }

    pub fn snooze(&mut self, id: MedicationId, until: DateTime<Local>, time: ClockTime) {
        self.snoozed.insert(id, DoseSnooze { until, time });
    }

    /// Drop a pending snooze, returning it
    pub fn clear_snooze(&mut self, id: &MedicationId) -> Option<DoseSnooze> {
        self.snoozed.remove(id)
    }

    /// Done for today: every resolved time is marked notified and any snooze is dropped
    pub fn mark_taken(&mut self, id: &MedicationId, date: NaiveDate, times: &[ClockTime]) {
        for time in times {
            self.notified_today
                .insert(DoseKey::new(id.clone(), date, *time));
        }
        self.snoozed.remove(id);
    }

    /// Drop today's notified keys for a medication so it can fire again
    pub fn invalidate(&mut self, id: &MedicationId, date: NaiveDate) -> usize {
        let before = self.notified_today.len();
        self.notified_today
            .retain(|key| !(&key.medication_id == id && key.date == date));
        before - self.notified_today.len()
    }

    pub fn was_notified(&self, id: &MedicationId, date: NaiveDate, time: ClockTime) -> bool {
        self.notified_today
            .contains(&DoseKey::new(id.clone(), date, time))
    }

    /// Forget everything about a medication
    pub fn forget(&mut self, id: &MedicationId) {
        self.notified_today.retain(|key| &key.medication_id != id);
        self.snoozed.remove(id);
    }

    /// Clear all state, returning how many entries were dropped
    pub fn reset(&mut self) -> usize {
        let cleared = self.notified_today.len() + self.snoozed.len();
        self.notified_today.clear();
        self.snoozed.clear();
        cleared
    }
}
