//! Notification engine

use chrono::{DateTime, Local};
use medminder_api::{
    FeedDelta, IntentOutcome, Medication, NotificationEntry, NotificationKind,
    NotificationKindTag, UserPreferences, WriteStatus,
};
use medminder_config::SchedulerSettings;
use medminder_store::{AuditEvent, AuditEventType, Store, StoreResult};
use medminder_util::{
    ClockTime, MedicationId, MedminderError, NotificationId, Result, instant_after,
    next_local_midnight,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::{
    DailyReset, DoseTracker, NotificationFeed, PreferenceReactor, RefillTracker, TimerKey,
    TimerQueue, has_explicit_time, resolve_dose_times,
};

/// Owns all reminder tracking state for one user.
///
/// Driven by [`tick`](Self::tick) with the latest medication list and
/// preferences; user intents act on the feed between ticks. All mutation
/// goes through `&mut self`, so ticks, timers and intents are serialized.
pub struct NotificationEngine {
    settings: SchedulerSettings,
    store: Arc<dyn Store>,
    timers: TimerQueue,
    doses: DoseTracker,
    refills: RefillTracker,
    feed: NotificationFeed,
    reactor: PreferenceReactor,
    daily_reset: DailyReset,
    medications: Vec<Medication>,
    preferences: UserPreferences,
    /// Medications awaiting "no longer taking" confirmation, with the feed
    /// entry to restore if the user backs out
    awaiting_confirmation: HashMap<MedicationId, Option<NotificationEntry>>,
}

impl NotificationEngine {
    /// Create a new engine; the first daily reset is armed for the coming midnight
    pub fn new(settings: SchedulerSettings, store: Arc<dyn Store>, now: DateTime<Local>) -> Self {
        let mut timers = TimerQueue::new();
        let daily_reset = DailyReset::new(now);
        let reset_at = daily_reset.arm(&mut timers, now);

        info!(
            poll_interval_secs = settings.poll_interval.as_secs(),
            settle_delay_secs = settings.settle_delay.as_secs(),
            reset_at = %reset_at,
            "Notification engine initialized"
        );

        Self {
            settings,
            store,
            timers,
            doses: DoseTracker::new(),
            refills: RefillTracker::new(),
            feed: NotificationFeed::new(),
            reactor: PreferenceReactor::new(),
            daily_reset,
            medications: Vec::new(),
            preferences: UserPreferences::default(),
            awaiting_confirmation: HashMap::new(),
        }
    }

    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Pending notifications, oldest first
    pub fn feed(&self) -> &[NotificationEntry] {
        self.feed.entries()
    }

    /// Earliest pending timer, for sleeping until it is due
    pub fn next_deadline(&self) -> Option<DateTime<Local>> {
        self.timers.next_deadline()
    }

    /// Medication list from the most recent tick
    pub fn medications(&self) -> &[Medication] {
        &self.medications
    }

    /// Preferences from the most recent tick
    pub fn preferences(&self) -> &UserPreferences {
        &self.preferences
    }

    pub fn timers(&self) -> &TimerQueue {
        &self.timers
    }

    pub fn dose_tracker(&self) -> &DoseTracker {
        &self.doses
    }

    pub fn refill_tracker(&self) -> &RefillTracker {
        &self.refills
    }

    pub fn daily_reset(&self) -> &DailyReset {
        &self.daily_reset
    }

    /// Times shown next to a medication, resolved exactly as the tracker does
    pub fn dose_times(&self, medication: &Medication) -> Vec<ClockTime> {
        resolve_dose_times(medication, self.preferences.default_time)
    }

    pub fn is_awaiting_confirmation(&self, id: &MedicationId) -> bool {
        self.awaiting_confirmation.contains_key(id)
    }

    /// Run one scheduling pass.
    ///
    /// Order: default-time changes, refill-date changes, due timers (in
    /// deadline order, so a midnight reset precedes the new day's doses),
    /// then dose times matching the current minute.
    pub fn tick(
        &mut self,
        now: DateTime<Local>,
        medications: &[Medication],
        preferences: &UserPreferences,
    ) -> FeedDelta {
        self.medications = medications.to_vec();
        self.preferences = preferences.clone();

        let mut delta = FeedDelta::default();

        self.react_to_default_time(now);
        self.observe_refill_dates(now);

        for key in self.timers.take_due(now) {
            self.fire_timer(key, now, &mut delta);
        }

        self.evaluate_doses(now, &mut delta);

        delta
    }

    fn react_to_default_time(&mut self, now: DateTime<Local>) {
        let Some(change) = self.reactor.observe(self.preferences.default_time) else {
            return;
        };

        let today = now.date_naive();
        let mut invalidated = 0;
        for medication in &self.medications {
            if medication.is_active && !has_explicit_time(medication) {
                invalidated += self.doses.invalidate(&medication.id, today);
            }
        }

        info!(
            from = %change.from,
            to = %change.to,
            invalidated,
            "Default dose time changed"
        );

        self.audit(
            AuditEventType::DefaultTimeChanged {
                from: Some(change.from),
                to: change.to,
                invalidated,
            },
            now,
        );
    }

    fn observe_refill_dates(&mut self, now: DateTime<Local>) {
        let changes = self.refills.observe(&self.medications);

        for id in changes.armed {
            let at = self.timers.schedule_after(
                TimerKey::RefillSettle(id.clone()),
                now,
                self.settings.settle_delay,
            );
            info!(
                medication_id = %id,
                refill_date = ?self.refills.previous_date(&id),
                evaluate_at = %at,
                "Refill date changed, evaluation armed"
            );
        }

        for id in changes.cleared {
            if self.timers.cancel(&TimerKey::RefillSettle(id.clone())) {
                debug!(medication_id = %id, "Pending refill evaluation cancelled");
            }
        }
    }

    fn fire_timer(&mut self, key: TimerKey, now: DateTime<Local>, delta: &mut FeedDelta) {
        match key {
            TimerKey::DailyReset => self.run_daily_reset(now, delta),
            TimerKey::DoseSnooze(id) => self.snooze_elapsed(&id, now, delta),
            TimerKey::RefillSettle(id) => self.evaluate_refill(&id, now, delta),
        }
    }

    fn run_daily_reset(&mut self, now: DateTime<Local>, delta: &mut FeedDelta) {
        let mut cleared = self.doses.reset() + self.refills.reset();
        let snoozes = self.timers.cancel_dose_snoozes();

        let removed = self.feed.clear();
        cleared += removed.len();
        for id in removed {
            match delta.added.iter().position(|e| e.id == id) {
                Some(index) => {
                    delta.added.remove(index);
                }
                None => delta.removed.push(id),
            }
        }

        // Yesterday's entries are not restored if a removal is cancelled
        for parked in self.awaiting_confirmation.values_mut() {
            *parked = None;
        }

        let next = self.daily_reset.fired(&mut self.timers, now);

        info!(
            day = %self.daily_reset.current_day(),
            resets = self.daily_reset.resets(),
            cleared,
            snooze_timers_cancelled = snoozes,
            next_reset = %next,
            "Daily reset"
        );

        self.audit(
            AuditEventType::DailyReset {
                cleared_entries: cleared,
            },
            now,
        );
    }

    fn snooze_elapsed(&mut self, id: &MedicationId, now: DateTime<Local>, delta: &mut FeedDelta) {
        let Some(snooze) = self.doses.clear_snooze(id) else {
            return;
        };

        let today = now.date_naive();
        let entry = self
            .medications
            .iter()
            .find(|m| &m.id == id && m.is_active && !m.has_ended_by(today))
            .map(|m| NotificationEntry::dose(m, snooze.time, now));

        match entry {
            Some(entry) => {
                if self.push(entry, delta) {
                    info!(
                        medication_id = %id,
                        time = %snooze.time,
                        "Snoozed dose reminder returned"
                    );
                }
            }
            None => debug!(medication_id = %id, "Snooze elapsed for inactive medication"),
        }
    }

    fn evaluate_refill(&mut self, id: &MedicationId, now: DateTime<Local>, delta: &mut FeedDelta) {
        let Some(medication) = self.medications.iter().find(|m| &m.id == id) else {
            debug!(medication_id = %id, "Refill evaluation for unknown medication skipped");
            return;
        };

        let days_before = self.preferences.refill_reminder_days_before;
        let fired = self
            .refills
            .evaluate(medication, now, days_before)
            .zip(medication.refill_date);

        let Some((days_until, refill_date)) = fired else {
            debug!(
                medication_id = %id,
                refill_date = ?medication.refill_date,
                days_before,
                "Refill outside reminder window"
            );
            return;
        };

        let entry = NotificationEntry::refill(medication, refill_date, days_until, now);
        self.issue(entry, delta);
        info!(
            medication_id = %id,
            refill_date = %refill_date,
            days_until,
            "Refill reminder issued"
        );
        self.audit(
            AuditEventType::RefillReminderIssued {
                medication_id: id.clone(),
                refill_date,
                days_until,
            },
            now,
        );
    }

    fn evaluate_doses(&mut self, now: DateTime<Local>, delta: &mut FeedDelta) {
        let due: Vec<NotificationEntry> = self
            .doses
            .evaluate(now, &self.medications, self.preferences.default_time)
            .into_iter()
            .map(|(medication, time)| NotificationEntry::dose(medication, time, now))
            .collect();

        for entry in due {
            let time = dose_time(&entry).unwrap_or(self.preferences.default_time);
            let medication_id = entry.medication_id.clone();
            let name = entry.medication_name.clone();
            self.issue(entry, delta);

            info!(
                medication_id = %medication_id,
                name = %name,
                time = %time,
                "Dose reminder issued"
            );
            self.audit(AuditEventType::DoseReminderIssued { medication_id, time }, now);
        }
    }

    /// Add a returning entry unless one of its kind is already pending
    fn push(&mut self, entry: NotificationEntry, delta: &mut FeedDelta) -> bool {
        if !self.feed.push(entry.clone()) {
            return false;
        }
        delta.added.push(entry);
        true
    }

    /// Add a freshly issued entry; a stale pending entry of the same kind for
    /// the medication is replaced
    fn issue(&mut self, entry: NotificationEntry, delta: &mut FeedDelta) {
        if let Some(stale) = self.feed.supersede(entry.clone()) {
            debug!(
                medication_id = %stale.medication_id,
                entry_id = %stale.id,
                "Pending reminder superseded"
            );
            match delta.added.iter().position(|e| e.id == stale.id) {
                Some(index) => {
                    delta.added.remove(index);
                }
                None => delta.removed.push(stale.id),
            }
        }
        delta.added.push(entry);
    }

    // Intents

    /// Remove an entry without snoozing or acknowledging it
    pub fn dismiss(
        &mut self,
        entry_id: NotificationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        let entry = self
            .feed
            .remove(entry_id)
            .ok_or(MedminderError::NotificationNotFound(entry_id))?;

        let id = entry.medication_id;
        match entry.kind.tag() {
            NotificationKindTag::Dose => {
                self.timers.cancel(&TimerKey::DoseSnooze(id.clone()));
                self.doses.clear_snooze(&id);
            }
            NotificationKindTag::Refill => {
                self.timers.cancel(&TimerKey::RefillSettle(id.clone()));
            }
        }

        info!(medication_id = %id, entry_id = %entry_id, at = %now, "Notification dismissed");
        Ok(self.outcome(WriteStatus::NotRequired))
    }

    /// Hide the dose reminder and bring it back after `minutes`
    /// (the user's snooze preference when `None`)
    pub fn snooze_dose(
        &mut self,
        id: &MedicationId,
        minutes: Option<u32>,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        let minutes = minutes.unwrap_or(self.preferences.snooze_minutes);
        if minutes == 0 {
            return Err(MedminderError::validation(
                "snooze duration must be at least one minute",
            ));
        }

        let time = match self.feed.find_for(id, NotificationKindTag::Dose) {
            Some(entry) => dose_time(entry),
            None => self
                .medication(id)
                .and_then(|m| self.dose_times(m).first().copied()),
        }
        .ok_or_else(|| MedminderError::MedicationNotFound(id.clone()))?;

        self.feed.remove_for(id, NotificationKindTag::Dose);

        let until = instant_after(&now, Duration::from_secs(u64::from(minutes) * 60));
        self.doses.snooze(id.clone(), until, time);
        self.timers.schedule(TimerKey::DoseSnooze(id.clone()), until);

        info!(medication_id = %id, minutes, until = %until, "Dose reminder snoozed");
        self.audit(
            AuditEventType::DoseSnoozed {
                medication_id: id.clone(),
                until,
            },
            now,
        );

        Ok(self.outcome(WriteStatus::NotRequired))
    }

    /// Done for today: no further dose reminders until the daily reset
    pub fn mark_taken(&mut self, id: &MedicationId, now: DateTime<Local>) -> Result<IntentOutcome> {
        let mut times = self
            .medication(id)
            .map(|m| self.dose_times(m))
            .unwrap_or_default();
        if let Some(time) = self
            .feed
            .find_for(id, NotificationKindTag::Dose)
            .and_then(dose_time)
            && !times.contains(&time)
        {
            times.push(time);
        }
        if times.is_empty() {
            return Err(MedminderError::MedicationNotFound(id.clone()));
        }

        self.feed.remove_for(id, NotificationKindTag::Dose);
        self.doses.mark_taken(id, now.date_naive(), &times);
        self.timers.cancel(&TimerKey::DoseSnooze(id.clone()));

        info!(medication_id = %id, times = times.len(), "Dose marked as taken");
        self.audit(
            AuditEventType::DoseTaken {
                medication_id: id.clone(),
            },
            now,
        );

        let write = write_status(self.store.record_dose_taken(id, now));
        Ok(self.outcome(write))
    }

    /// Defer the refill reminder to the next day
    pub fn snooze_refill(
        &mut self,
        id: &MedicationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        self.require_known(id, NotificationKindTag::Refill)?;
        self.feed.remove_for(id, NotificationKindTag::Refill);

        let tomorrow = next_local_midnight(&now);
        self.refills.snooze(id, now.date_naive(), tomorrow);
        let evaluate_at = instant_after(&tomorrow, self.settings.settle_delay);
        self.timers
            .schedule(TimerKey::RefillSettle(id.clone()), evaluate_at);

        info!(medication_id = %id, evaluate_at = %evaluate_at, "Refill reminder snoozed");
        self.audit(
            AuditEventType::RefillSnoozed {
                medication_id: id.clone(),
            },
            now,
        );

        Ok(self.outcome(WriteStatus::NotRequired))
    }

    /// Suppress refill reminders until the refill date is changed
    pub fn mark_refilled(
        &mut self,
        id: &MedicationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        self.require_known(id, NotificationKindTag::Refill)?;
        let entry = self.feed.remove_for(id, NotificationKindTag::Refill);

        let refill_date = self
            .medication(id)
            .and_then(|m| m.refill_date)
            .or_else(|| match entry.map(|e| e.kind) {
                Some(NotificationKind::Refill { refill_date, .. }) => Some(refill_date),
                _ => None,
            });

        self.refills.mark_refilled(id, now.date_naive(), refill_date);
        self.timers.cancel(&TimerKey::RefillSettle(id.clone()));

        info!(medication_id = %id, refill_date = ?refill_date, "Medication marked as refilled");
        self.audit(
            AuditEventType::MedicationRefilled {
                medication_id: id.clone(),
            },
            now,
        );

        let write = write_status(self.store.record_refill(id, now));
        Ok(self.outcome(write))
    }

    /// First step of removing a medication: its dose reminder leaves the
    /// feed and is held until the user confirms or cancels
    pub fn no_longer_taking(
        &mut self,
        id: &MedicationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        self.require_known(id, NotificationKindTag::Dose)?;

        let parked = self.feed.remove_for(id, NotificationKindTag::Dose);
        let from_feed = parked.is_some();
        let slot = self.awaiting_confirmation.entry(id.clone()).or_default();
        if parked.is_some() {
            *slot = parked;
        }

        info!(medication_id = %id, from_feed, at = %now, "Awaiting no-longer-taking confirmation");
        Ok(self.outcome(WriteStatus::NotRequired))
    }

    /// Deactivate the medication and forget all of its reminder state
    pub fn confirm_no_longer_taking(
        &mut self,
        id: &MedicationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        if self.awaiting_confirmation.remove(id).is_none() {
            return Err(MedminderError::NothingToConfirm(id.clone()));
        }

        self.doses.forget(id);
        self.refills.forget(id);
        self.timers.cancel_medication(id);
        self.feed.remove_medication(id);
        if let Some(medication) = self.medications.iter_mut().find(|m| &m.id == id) {
            medication.is_active = false;
        }

        info!(medication_id = %id, "Medication deactivated");
        self.audit(
            AuditEventType::MedicationDeactivated {
                medication_id: id.clone(),
            },
            now,
        );

        let write = write_status(self.store.set_medication_active(id, false, now));
        Ok(self.outcome(write))
    }

    /// Back out of removal; a reminder taken off the feed is restored
    pub fn cancel_no_longer_taking(
        &mut self,
        id: &MedicationId,
        now: DateTime<Local>,
    ) -> Result<IntentOutcome> {
        let parked = self
            .awaiting_confirmation
            .remove(id)
            .ok_or_else(|| MedminderError::NothingToConfirm(id.clone()))?;

        let restored = parked.is_some_and(|entry| self.feed.push(entry));

        info!(medication_id = %id, restored, at = %now, "No-longer-taking cancelled");
        Ok(self.outcome(WriteStatus::NotRequired))
    }

    fn medication(&self, id: &MedicationId) -> Option<&Medication> {
        self.medications.iter().find(|m| &m.id == id)
    }

    fn require_known(&self, id: &MedicationId, tag: NotificationKindTag) -> Result<()> {
        if self.medication(id).is_some() || self.feed.find_for(id, tag).is_some() {
            Ok(())
        } else {
            Err(MedminderError::MedicationNotFound(id.clone()))
        }
    }

    fn outcome(&self, write: WriteStatus) -> IntentOutcome {
        IntentOutcome {
            feed: self.feed.entries().to_vec(),
            write,
        }
    }

    fn audit(&self, event: AuditEventType, now: DateTime<Local>) {
        if let Err(e) = self.store.append_audit(AuditEvent::at(event, now)) {
            warn!(error = %e, "Failed to append audit event");
        }
    }
}

fn dose_time(entry: &NotificationEntry) -> Option<ClockTime> {
    match entry.kind {
        NotificationKind::Dose { time } => Some(time),
        NotificationKind::Refill { .. } => None,
    }
}

fn write_status(result: StoreResult<()>) -> WriteStatus {
    match result {
        Ok(()) => WriteStatus::Persisted,
        Err(e) => {
            warn!(error = %e, "Write-through failed; local reminder state kept");
            WriteStatus::Failed {
                message: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use medminder_api::MedicationFilter;
    use medminder_store::{SqliteStore, StoreError};
    use medminder_util::UserId;

    fn at(d: u32, h: u32, m: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, d, h, m, 0).unwrap()
    }

    fn at_s(d: u32, h: u32, m: u32, s: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 3, d, h, m, s).unwrap()
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn settings() -> SchedulerSettings {
        SchedulerSettings {
            poll_interval: Duration::from_secs(5),
            settle_delay: Duration::from_secs(30),
        }
    }

    fn med(name: &str) -> Medication {
        Medication::new(UserId::new("u"), name, at(1, 8, 0))
    }

    fn prefs(default_time: &str, days_before: u32) -> UserPreferences {
        UserPreferences {
            default_time: ClockTime::parse(default_time).unwrap(),
            snooze_minutes: 5,
            refill_reminder_days_before: days_before,
        }
    }

    fn engine(now: DateTime<Local>) -> (NotificationEngine, Arc<SqliteStore>) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        (NotificationEngine::new(settings(), store.clone(), now), store)
    }

    #[test]
    fn implicit_time_fires_once_at_default() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let p = prefs("09:00", 1);

        assert!(engine.tick(at(10, 8, 59), &meds, &p).is_empty());

        let delta = engine.tick(at(10, 9, 0), &meds, &p);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].medication_id, meds[0].id);
        assert_eq!(delta.added[0].title(), "Time to Take Medication");

        assert!(engine.tick(at_s(10, 9, 0, 5), &meds, &p).is_empty());
        assert!(engine.tick(at(10, 9, 1), &meds, &p).is_empty());
        assert_eq!(engine.feed().len(), 1);
    }

    #[test]
    fn list_order_is_preserved_within_a_tick() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("B"), med("A"), med("C")];

        let delta = engine.tick(at(10, 9, 0), &meds, &prefs("09:00", 1));
        let names: Vec<_> = delta.added.iter().map(|e| e.medication_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn snoozed_dose_returns_exactly_once_after_duration() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        let outcome = engine.snooze_dose(&id, Some(10), at_s(10, 9, 0, 20)).unwrap();
        assert!(outcome.feed.is_empty());
        assert_eq!(outcome.write, WriteStatus::NotRequired);

        assert!(engine.tick(at(10, 9, 5), &meds, &p).is_empty());
        assert!(engine.tick(at_s(10, 9, 10, 15), &meds, &p).is_empty());

        let delta = engine.tick(at_s(10, 9, 10, 20), &meds, &p);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(
            delta.added[0].kind,
            NotificationKind::Dose {
                time: ClockTime::from_hm(9, 0)
            }
        );

        assert!(engine.tick(at(10, 9, 11), &meds, &p).is_empty());
        assert!(engine.tick(at(10, 9, 30), &meds, &p).is_empty());
        assert_eq!(engine.feed().len(), 1);
    }

    #[test]
    fn snooze_uses_preference_when_minutes_omitted() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        engine.snooze_dose(&id, None, at(10, 9, 0)).unwrap();
        assert_eq!(
            engine.timers().deadline(&TimerKey::DoseSnooze(id.clone())),
            Some(at(10, 9, 5))
        );
        assert!(matches!(
            engine.snooze_dose(&id, Some(0), at(10, 9, 0)),
            Err(MedminderError::ValidationError(_))
        ));
    }

    #[test]
    fn dismissing_a_returned_snooze_cancels_its_timer() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        engine.snooze_dose(&id, Some(1), at(10, 9, 0)).unwrap();
        engine.tick(at(10, 9, 1), &meds, &p);
        let entry_id = engine.feed()[0].id;

        // Snooze again, but the entry is gone; dismissing must fail cleanly
        engine.snooze_dose(&id, Some(1), at(10, 9, 1)).unwrap();
        assert!(matches!(
            engine.dismiss(entry_id, at(10, 9, 1)),
            Err(MedminderError::NotificationNotFound(_))
        ));

        let delta = engine.tick(at(10, 9, 2), &meds, &p);
        let entry_id = delta.added[0].id;
        let outcome = engine.dismiss(entry_id, at(10, 9, 2)).unwrap();
        assert!(outcome.feed.is_empty());
        assert!(!engine.timers().is_scheduled(&TimerKey::DoseSnooze(id)));
        assert!(engine.tick(at(10, 9, 10), &meds, &p).is_empty());
    }

    #[test]
    fn mark_taken_suppresses_every_time_and_writes_through() {
        let (mut engine, store) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.frequency.specific_times = Some(vec!["08:00".into(), "20:00".into()]);
        store.save_medication(&m).unwrap();
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 8, 0), &meds, &p);
        engine.snooze_dose(&id, Some(5), at(10, 8, 1)).unwrap();
        let outcome = engine.mark_taken(&id, at(10, 8, 2)).unwrap();
        assert!(outcome.feed.is_empty());
        assert_eq!(outcome.write, WriteStatus::Persisted);
        assert!(!engine.timers().is_scheduled(&TimerKey::DoseSnooze(id.clone())));

        assert!(engine.tick(at(10, 8, 6), &meds, &p).is_empty());
        assert!(engine.tick(at(10, 20, 0), &meds, &p).is_empty());
        assert_eq!(store.dose_history(&id, 10).unwrap(), vec![at(10, 8, 2)]);
    }

    #[test]
    fn unknown_medication_is_an_error() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let ghost = MedicationId::new("ghost");

        assert!(matches!(
            engine.mark_taken(&ghost, at(10, 8, 0)),
            Err(MedminderError::MedicationNotFound(_))
        ));
        assert!(matches!(
            engine.snooze_refill(&ghost, at(10, 8, 0)),
            Err(MedminderError::MedicationNotFound(_))
        ));
        assert!(matches!(
            engine.confirm_no_longer_taking(&ghost, at(10, 8, 0)),
            Err(MedminderError::NothingToConfirm(_))
        ));
    }

    #[test]
    fn midnight_reset_reopens_the_next_day() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        assert_eq!(engine.feed().len(), 1);
        let stale_id = engine.feed()[0].id;

        let delta = engine.tick(at_s(11, 0, 0, 2), &meds, &p);
        assert_eq!(delta.removed, vec![stale_id]);
        assert!(engine.feed().is_empty());
        assert_eq!(engine.daily_reset().resets(), 1);
        assert_eq!(
            engine.timers().deadline(&TimerKey::DailyReset),
            Some(at(12, 0, 0))
        );

        let delta = engine.tick(at(11, 9, 0), &meds, &p);
        assert_eq!(delta.added.len(), 1);
    }

    #[test]
    fn reset_cancels_pending_dose_snoozes() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.frequency.specific_times = None;
        m.preferred_time = Some("23:58".into());
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 23, 58), &meds, &p);
        engine.snooze_dose(&id, Some(10), at(10, 23, 58)).unwrap();

        engine.tick(at(11, 0, 0), &meds, &p);
        assert!(!engine.timers().is_scheduled(&TimerKey::DoseSnooze(id)));
        assert!(engine.tick(at(11, 0, 9), &meds, &p).is_empty());
    }

    #[test]
    fn default_time_change_refires_implicit_medications() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let implicit = med("A");
        let mut explicit = med("B");
        explicit.preferred_time = Some("09:00".into());
        let meds = vec![implicit, explicit];

        let delta = engine.tick(at(10, 9, 0), &meds, &prefs("09:00", 1));
        assert_eq!(delta.added.len(), 2);
        for entry in delta.added {
            engine.mark_taken(&entry.medication_id, at(10, 9, 1)).unwrap();
        }

        assert!(engine.tick(at(10, 12, 0), &meds, &prefs("20:00", 1)).is_empty());
        let today = day(10);
        let nine = ClockTime::from_hm(9, 0);
        assert!(!engine.dose_tracker().was_notified(&meds[0].id, today, nine));
        assert!(engine.dose_tracker().was_notified(&meds[1].id, today, nine));

        let delta = engine.tick(at(10, 20, 0), &meds, &prefs("20:00", 1));
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].medication_id, meds[0].id);
    }

    #[test]
    fn default_time_change_replaces_pending_reminder() {
        let (mut engine, store) = engine(at(10, 8, 0));
        let meds = vec![med("A")];

        let delta = engine.tick(at(10, 9, 0), &meds, &prefs("09:00", 1));
        let morning = delta.added[0].id;

        assert!(engine.tick(at(10, 12, 0), &meds, &prefs("20:00", 1)).is_empty());

        let delta = engine.tick(at(10, 20, 0), &meds, &prefs("20:00", 1));
        assert_eq!(delta.added.len(), 1);
        assert_eq!(
            delta.added[0].kind,
            NotificationKind::Dose {
                time: ClockTime::from_hm(20, 0)
            }
        );
        assert_eq!(delta.removed, vec![morning]);
        assert_eq!(engine.feed().len(), 1);
        assert_eq!(engine.feed()[0].id, delta.added[0].id);

        let issued = store
            .get_recent_audits(20)
            .unwrap()
            .into_iter()
            .filter(|e| matches!(e.event, AuditEventType::DoseReminderIssued { .. }))
            .count();
        assert_eq!(issued, 2);
    }

    #[test]
    fn snooze_keeps_the_slot_across_multiple_times() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.frequency.specific_times = Some(vec!["09:00".into(), "09:05".into(), "21:00".into()]);
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("12:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        engine.snooze_dose(&id, Some(10), at(10, 9, 0)).unwrap();

        // The 09:05 slot stays quiet while the medication is snoozed
        assert!(engine.tick(at(10, 9, 5), &meds, &p).is_empty());
        assert!(engine.feed().is_empty());
        assert!(!engine.dose_tracker().was_notified(&id, day(10), ClockTime::from_hm(9, 5)));

        let delta = engine.tick(at(10, 9, 10), &meds, &p);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(
            delta.added[0].kind,
            NotificationKind::Dose {
                time: ClockTime::from_hm(9, 0)
            }
        );
        assert!(engine.tick(at(10, 9, 11), &meds, &p).is_empty());
        assert_eq!(engine.feed().len(), 1);
    }

    #[test]
    fn dismissing_a_refill_cancels_its_pending_settle() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(12));
        let p = prefs("09:00", 3);

        engine.tick(at(10, 10, 0), std::slice::from_ref(&m), &p);
        engine.tick(at_s(10, 10, 0, 30), std::slice::from_ref(&m), &p);
        let entry_id = engine.feed()[0].id;

        // A new date arms another evaluation while the old entry is pending
        m.refill_date = Some(day(13));
        engine.tick(at(10, 10, 1), std::slice::from_ref(&m), &p);
        let settle = TimerKey::RefillSettle(m.id.clone());
        assert!(engine.timers().is_scheduled(&settle));

        let outcome = engine.dismiss(entry_id, at_s(10, 10, 1, 10)).unwrap();
        assert!(outcome.feed.is_empty());
        assert!(!engine.timers().is_scheduled(&settle));

        assert!(engine.tick(at_s(10, 10, 1, 30), std::slice::from_ref(&m), &p).is_empty());
        assert!(engine.tick(at(10, 10, 5), std::slice::from_ref(&m), &p).is_empty());
        assert!(engine.feed().is_empty());
    }

    #[test]
    fn refill_settle_fires_inside_window_only() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut near = med("near");
        near.refill_date = Some(day(12));
        let mut far = med("far");
        far.refill_date = Some(day(15));
        let meds = vec![near, far];
        let p = prefs("09:00", 3);

        assert!(engine.tick(at(10, 10, 0), &meds, &p).is_empty());
        assert!(engine.tick(at_s(10, 10, 0, 29), &meds, &p).is_empty());

        let delta = engine.tick(at_s(10, 10, 0, 30), &meds, &p);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(delta.added[0].medication_id, meds[0].id);
        assert_eq!(
            delta.added[0].kind,
            NotificationKind::Refill {
                refill_date: day(12),
                days_until: 2
            }
        );

        // One-shot: no further evaluation without a date change
        assert!(engine.tick(at(10, 11, 0), &meds, &p).is_empty());
    }

    #[test]
    fn refill_settle_uses_current_date_and_restarts_on_change() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(20));
        let p = prefs("09:00", 3);

        engine.tick(at(10, 10, 0), std::slice::from_ref(&m), &p);
        m.refill_date = Some(day(11));
        engine.tick(at_s(10, 10, 0, 20), std::slice::from_ref(&m), &p);

        // The first timer was superseded at :20 and now fires at :50
        assert!(engine.tick(at_s(10, 10, 0, 30), std::slice::from_ref(&m), &p).is_empty());
        let delta = engine.tick(at_s(10, 10, 0, 50), std::slice::from_ref(&m), &p);
        assert_eq!(delta.added.len(), 1);
    }

    #[test]
    fn clearing_refill_date_cancels_evaluation() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(11));
        let p = prefs("09:00", 3);

        engine.tick(at(10, 10, 0), std::slice::from_ref(&m), &p);
        m.refill_date = None;
        engine.tick(at_s(10, 10, 0, 10), std::slice::from_ref(&m), &p);

        assert!(!engine.timers().is_scheduled(&TimerKey::RefillSettle(m.id.clone())));
        assert!(engine.tick(at(10, 10, 1), std::slice::from_ref(&m), &p).is_empty());
        assert!(engine.refill_tracker().previous_date(&m.id).is_none());
    }

    #[test]
    fn refill_snooze_returns_the_next_day() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(12));
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 3);

        engine.tick(at(10, 10, 0), &meds, &p);
        engine.tick(at(10, 10, 1), &meds, &p);
        assert_eq!(engine.feed().len(), 1);

        let outcome = engine.snooze_refill(&id, at(10, 10, 2)).unwrap();
        assert!(outcome.feed.is_empty());
        assert_eq!(
            engine.timers().deadline(&TimerKey::RefillSettle(id.clone())),
            Some(at_s(11, 0, 0, 30))
        );

        engine.tick(at(11, 0, 0), &meds, &p);
        let delta = engine.tick(at_s(11, 0, 0, 30), &meds, &p);
        assert_eq!(delta.added.len(), 1);
        assert_eq!(
            delta.added[0].kind,
            NotificationKind::Refill {
                refill_date: day(12),
                days_until: 1
            }
        );
    }

    #[test]
    fn mark_refilled_writes_through_and_stops_evaluation() {
        let (mut engine, store) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(12));
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 3);

        engine.tick(at(10, 10, 0), &meds, &p);
        engine.tick(at(10, 10, 1), &meds, &p);
        let outcome = engine.mark_refilled(&id, at(10, 10, 2)).unwrap();
        assert!(outcome.feed.is_empty());
        assert_eq!(outcome.write, WriteStatus::Persisted);
        assert!(engine.refill_tracker().was_notified(&id, day(12)));
        assert_eq!(store.refill_history(&id, 10).unwrap().len(), 1);
    }

    #[test]
    fn no_longer_taking_confirm_deactivates() {
        let (mut engine, store) = engine(at(10, 8, 0));
        let mut m = med("A");
        m.refill_date = Some(day(11));
        store.save_medication(&m).unwrap();
        let meds = vec![m];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 3);

        engine.tick(at(10, 9, 0), &meds, &p);
        let outcome = engine.no_longer_taking(&id, at(10, 9, 1)).unwrap();
        assert!(outcome.feed.is_empty());
        assert!(engine.is_awaiting_confirmation(&id));

        let outcome = engine.confirm_no_longer_taking(&id, at(10, 9, 2)).unwrap();
        assert_eq!(outcome.write, WriteStatus::Persisted);
        assert_eq!(engine.timers().len(), 1);
        assert!(!engine.timers().is_scheduled(&TimerKey::RefillSettle(id.clone())));
        assert!(
            store
                .list_medications(&UserId::new("u"), &MedicationFilter::active_only())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn no_longer_taking_cancel_restores_feed_entry() {
        let (mut engine, _) = engine(at(10, 8, 0));
        let meds = vec![med("A"), med("B")];
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        let original = engine.feed()[0].clone();

        engine.no_longer_taking(&meds[0].id, at(10, 9, 1)).unwrap();
        assert_eq!(engine.feed().len(), 1);

        let outcome = engine.cancel_no_longer_taking(&meds[0].id, at(10, 9, 2)).unwrap();
        assert_eq!(outcome.feed.len(), 2);
        assert!(outcome.feed.contains(&original));

        // Started from browsing: nothing is parked, nothing restored
        engine.mark_taken(&meds[1].id, at(10, 9, 3)).unwrap();
        engine.no_longer_taking(&meds[1].id, at(10, 9, 4)).unwrap();
        let outcome = engine.cancel_no_longer_taking(&meds[1].id, at(10, 9, 5)).unwrap();
        assert_eq!(outcome.feed.len(), 1);
        assert!(matches!(
            engine.cancel_no_longer_taking(&meds[1].id, at(10, 9, 5)),
            Err(MedminderError::NothingToConfirm(_))
        ));
    }

    /// Store whose history writes always fail
    struct OfflineStore(SqliteStore);

    impl Store for OfflineStore {
        fn list_medications(
            &self,
            u: &UserId,
            f: &MedicationFilter,
        ) -> StoreResult<Vec<Medication>> {
            self.0.list_medications(u, f)
        }
        fn get_medication(&self, id: &MedicationId) -> StoreResult<Option<Medication>> {
            self.0.get_medication(id)
        }
        fn save_medication(&self, m: &Medication) -> StoreResult<()> {
            self.0.save_medication(m)
        }
        fn set_medication_active(
            &self,
            id: &MedicationId,
            a: bool,
            now: DateTime<Local>,
        ) -> StoreResult<()> {
            self.0.set_medication_active(id, a, now)
        }
        fn delete_medication(&self, id: &MedicationId) -> StoreResult<()> {
            self.0.delete_medication(id)
        }
        fn get_preferences(&self, u: &UserId) -> StoreResult<Option<UserPreferences>> {
            self.0.get_preferences(u)
        }
        fn save_preferences(&self, u: &UserId, p: &UserPreferences) -> StoreResult<()> {
            self.0.save_preferences(u, p)
        }
        fn record_dose_taken(&self, _: &MedicationId, _: DateTime<Local>) -> StoreResult<()> {
            Err(StoreError::Database("offline".into()))
        }
        fn record_refill(&self, _: &MedicationId, _: DateTime<Local>) -> StoreResult<()> {
            Err(StoreError::Database("offline".into()))
        }
        fn dose_history(
            &self,
            id: &MedicationId,
            limit: usize,
        ) -> StoreResult<Vec<DateTime<Local>>> {
            self.0.dose_history(id, limit)
        }
        fn refill_history(
            &self,
            id: &MedicationId,
            limit: usize,
        ) -> StoreResult<Vec<DateTime<Local>>> {
            self.0.refill_history(id, limit)
        }
        fn append_audit(&self, event: AuditEvent) -> StoreResult<()> {
            self.0.append_audit(event)
        }
        fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>> {
            self.0.get_recent_audits(limit)
        }
        fn is_healthy(&self) -> bool {
            false
        }
    }

    #[test]
    fn failed_write_keeps_local_state() {
        let store = Arc::new(OfflineStore(SqliteStore::in_memory().unwrap()));
        let mut engine = NotificationEngine::new(settings(), store, at(10, 8, 0));
        let meds = vec![med("A")];
        let id = meds[0].id.clone();
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        let outcome = engine.mark_taken(&id, at(10, 9, 1)).unwrap();
        assert!(outcome.write.is_failed());
        assert!(outcome.feed.is_empty());
        assert!(
            engine
                .dose_tracker()
                .was_notified(&id, day(10), ClockTime::from_hm(9, 0))
        );
    }

    #[test]
    fn tracker_events_are_audited() {
        let (mut engine, store) = engine(at(10, 8, 0));
        let meds = vec![med("A")];
        let p = prefs("09:00", 1);

        engine.tick(at(10, 9, 0), &meds, &p);
        engine.mark_taken(&meds[0].id, at(10, 9, 1)).unwrap();

        let events = store.get_recent_audits(10).unwrap();
        assert!(matches!(events[0].event, AuditEventType::DoseTaken { .. }));
        assert!(matches!(
            events[1].event,
            AuditEventType::DoseReminderIssued { .. }
        ));
    }

    #[test]
    fn next_deadline_tracks_earliest_timer() {
        let (mut engine, _) = engine(at(10, 8, 0));
        assert_eq!(engine.next_deadline(), Some(at(11, 0, 0)));

        let meds = vec![med("A")];
        engine.tick(at(10, 9, 0), &meds, &prefs("09:00", 1));
        engine.snooze_dose(&meds[0].id, Some(2), at(10, 9, 0)).unwrap();
        assert_eq!(engine.next_deadline(), Some(at(10, 9, 2)));
    }
}
