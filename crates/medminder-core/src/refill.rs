//! Refill reminder tracking
//!
//! Refill reminders are triggered by a change of refill date rather than by
//! the clock. A changed date arms a settle timer; when it fires the current
//! date is checked against the reminder window once.

use chrono::{DateTime, Local, NaiveDate};
use medminder_api::Medication;
use medminder_util::{MedicationId, days_between};
use std::collections::{HashMap, HashSet};

/// Upper bound on suppression keys written by `mark_refilled`
const MAX_SUPPRESSED_DAYS: i64 = 366;

/// Whole days from `today` until `refill_date` (negative once overdue)
pub fn days_until_refill(refill_date: NaiveDate, today: NaiveDate) -> i64 {
    days_between(today, refill_date)
}

/// The window opens `days_before` days ahead of the refill date and stays
/// open past it
pub fn in_reminder_window(days_until: i64, days_before: u32) -> bool {
    days_until <= i64::from(days_before)
}

/// Refill-date changes observed in one pass over the medication list
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RefillChanges {
    /// Date set or moved to another day; a settle timer should be (re)started
    pub armed: Vec<MedicationId>,
    /// Date cleared, medication deactivated or gone; pending timers should stop
    pub cleared: Vec<MedicationId>,
}

/// Refill reminder state
#[derive(Debug, Default)]
pub struct RefillTracker {
    previous_dates: HashMap<MedicationId, NaiveDate>,
    notified: HashSet<(MedicationId, NaiveDate)>,
    snoozed: HashMap<MedicationId, DateTime<Local>>,
}

impl RefillTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare each medication's refill date with the last one seen
    pub fn observe(&mut self, medications: &[Medication]) -> RefillChanges {
        let mut changes = RefillChanges::default();
        let mut seen = HashSet::new();

        for medication in medications {
            let date = medication.refill_date.filter(|_| medication.is_active);
            match date {
                Some(date) => {
                    seen.insert(&medication.id);
                    if self.previous_dates.insert(medication.id.clone(), date) != Some(date) {
                        // A new date starts a new reminder cycle
                        self.notified.retain(|(id, _)| id != &medication.id);
                        changes.armed.push(medication.id.clone());
                    }
                }
                None => {
                    if self.previous_dates.remove(&medication.id).is_some() {
                        changes.cleared.push(medication.id.clone());
                    }
                }
            }
        }

        let gone: Vec<MedicationId> = self
            .previous_dates
            .keys()
            .filter(|id| !seen.contains(id))
            .cloned()
            .collect();
        for id in gone {
            self.previous_dates.remove(&id);
            if !changes.cleared.contains(&id) {
                changes.cleared.push(id);
            }
        }

        changes
    }

    /// Settle-timer evaluation against the medication's current refill date.
    ///
    /// Returns the days until refill when a reminder should be issued.
    pub fn evaluate(
        &mut self,
        medication: &Medication,
        now: DateTime<Local>,
        days_before: u32,
    ) -> Option<i64> {
        if !medication.is_active || self.is_snoozed(&medication.id, now) {
            return None;
        }
        self.snoozed.remove(&medication.id);

        let refill_date = medication.refill_date?;
        let today = now.date_naive();
        let days_until = days_until_refill(refill_date, today);
        if !in_reminder_window(days_until, days_before) {
            return None;
        }

        self.notified
            .insert((medication.id.clone(), today))
            .then_some(days_until)
    }

    pub fn is_snoozed(&self, id: &MedicationId, now: DateTime<Local>) -> bool {
        self.snoozed.get(id).is_some_and(|until| *until > now)
    }

    /// Defer the reminder to the next day
    pub fn snooze(&mut self, id: &MedicationId, today: NaiveDate, until: DateTime<Local>) {
        self.notified.remove(&(id.clone(), today));
        self.snoozed.insert(id.clone(), until);
    }

    /// Suppress reminders from today through the refill date
    pub fn mark_refilled(
        &mut self,
        id: &MedicationId,
        today: NaiveDate,
        refill_date: Option<NaiveDate>,
    ) {
        self.snoozed.remove(id);
        self.notified.insert((id.clone(), today));

        let Some(refill_date) = refill_date else {
            return;
        };
        let span = days_until_refill(refill_date, today).min(MAX_SUPPRESSED_DAYS);
        for offset in 1..=span {
            if let Some(day) = today.checked_add_days(chrono::Days::new(offset as u64)) {
                self.notified.insert((id.clone(), day));
            }
        }
    }

    pub fn was_notified(&self, id: &MedicationId, date: NaiveDate) -> bool {
        self.notified.contains(&(id.clone(), date))
    }

    pub fn previous_date(&self, id: &MedicationId) -> Option<NaiveDate> {
        self.previous_dates.get(id).copied()
    }

    /// Forget everything about a medication
    pub fn forget(&mut self, id: &MedicationId) {
        self.previous_dates.remove(id);
        self.notified.retain(|(key, _)| key != id);
        self.snoozed.remove(id);
    }

    /// Daily reset: notified and snoozed state is cleared, last-seen dates are kept
    pub fn reset(&mut self) -> usize {
        let cleared = self.notified.len() + self.snoozed.len();
        self.notified.clear();
        self.snoozed.clear();
        cleared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use medminder_util::UserId;

    fn at(d: u32, h: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, d, h, 0, 0).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn med_with_refill(d: Option<u32>) -> Medication {
        let mut m = Medication::new(UserId::new("u"), "Metformin", at(1, 8));
        m.refill_date = d.map(day);
        m
    }

    #[test]
    fn window_is_a_lower_bound() {
        assert!(in_reminder_window(3, 3));
        assert!(in_reminder_window(2, 3));
        assert!(in_reminder_window(0, 3));
        assert!(in_reminder_window(-4, 3));
        assert!(!in_reminder_window(5, 3));
        assert!(in_reminder_window(0, 0));
        assert!(!in_reminder_window(1, 0));
    }

    #[test]
    fn observe_arms_on_set_and_change_only() {
        let mut tracker = RefillTracker::new();
        let mut m = med_with_refill(Some(12));

        let changes = tracker.observe(std::slice::from_ref(&m));
        assert_eq!(changes.armed, vec![m.id.clone()]);
        assert_eq!(tracker.previous_date(&m.id), Some(day(12)));

        assert_eq!(tracker.observe(std::slice::from_ref(&m)), RefillChanges::default());

        m.refill_date = Some(day(14));
        assert_eq!(tracker.observe(std::slice::from_ref(&m)).armed, vec![m.id.clone()]);

        m.refill_date = None;
        let changes = tracker.observe(std::slice::from_ref(&m));
        assert_eq!(changes.cleared, vec![m.id.clone()]);
        assert!(tracker.previous_date(&m.id).is_none());
    }

    #[test]
    fn observe_clears_deactivated_and_missing() {
        let mut tracker = RefillTracker::new();
        let mut a = med_with_refill(Some(12));
        let b = med_with_refill(Some(20));
        tracker.observe(&[a.clone(), b.clone()]);

        a.is_active = false;
        let changes = tracker.observe(&[a.clone()]);
        assert_eq!(changes.cleared.len(), 2);
        assert!(changes.cleared.contains(&a.id));
        assert!(changes.cleared.contains(&b.id));
    }

    #[test]
    fn evaluate_respects_window_and_notifies_once_per_day() {
        let mut tracker = RefillTracker::new();
        let near = med_with_refill(Some(12));
        let far = med_with_refill(Some(15));

        assert_eq!(tracker.evaluate(&near, at(10, 9), 3), Some(2));
        assert_eq!(tracker.evaluate(&near, at(10, 10), 3), None);
        assert_eq!(tracker.evaluate(&far, at(10, 9), 3), None);
        assert_eq!(tracker.evaluate(&med_with_refill(None), at(10, 9), 3), None);
    }

    #[test]
    fn snooze_defers_to_next_day() {
        let mut tracker = RefillTracker::new();
        let m = med_with_refill(Some(12));

        assert!(tracker.evaluate(&m, at(10, 9), 3).is_some());
        tracker.snooze(&m.id, day(10), at(11, 0));
        assert!(!tracker.was_notified(&m.id, day(10)));
        assert_eq!(tracker.evaluate(&m, at(10, 12), 3), None);

        assert_eq!(tracker.evaluate(&m, at(11, 0), 3), Some(1));
    }

    #[test]
    fn mark_refilled_suppresses_through_refill_date() {
        let mut tracker = RefillTracker::new();
        let m = med_with_refill(Some(12));

        tracker.mark_refilled(&m.id, day(10), m.refill_date);
        for d in 10..=12 {
            assert!(tracker.was_notified(&m.id, day(d)));
        }
        assert!(!tracker.was_notified(&m.id, day(13)));
        assert_eq!(tracker.evaluate(&m, at(11, 9), 3), None);
    }

    #[test]
    fn changed_date_reopens_reminders() {
        let mut tracker = RefillTracker::new();
        let mut m = med_with_refill(Some(12));
        tracker.observe(std::slice::from_ref(&m));
        tracker.mark_refilled(&m.id, day(10), m.refill_date);

        m.refill_date = Some(day(11));
        tracker.observe(std::slice::from_ref(&m));
        assert_eq!(tracker.evaluate(&m, at(10, 9), 3), Some(1));
    }

    #[test]
    fn reset_keeps_last_seen_dates() {
        let mut tracker = RefillTracker::new();
        let m = med_with_refill(Some(12));
        tracker.observe(std::slice::from_ref(&m));
        tracker.evaluate(&m, at(10, 9), 3);

        assert_eq!(tracker.reset(), 1);
        assert_eq!(tracker.previous_date(&m.id), Some(day(12)));
        assert!(!tracker.was_notified(&m.id, day(10)));
    }
}
