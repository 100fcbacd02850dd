//! Notification feed entries and deltas

use chrono::{DateTime, Local, NaiveDate};
use medminder_util::{ClockTime, MedicationId, NotificationId};
use serde::{Deserialize, Serialize};

use crate::Medication;

/// What a feed entry reminds the user about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// Time to take a dose
    Dose {
        /// The resolved time that matched
        time: ClockTime,
    },
    /// Supply due for renewal soon
    Refill {
        refill_date: NaiveDate,
        /// Calendar days until the refill date when the reminder fired
        days_until: i64,
    },
}

/// Tag used to match feed entries without comparing payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKindTag {
    Dose,
    Refill,
}

impl NotificationKind {
    pub fn tag(&self) -> NotificationKindTag {
        match self {
            NotificationKind::Dose { .. } => NotificationKindTag::Dose,
            NotificationKind::Refill { .. } => NotificationKindTag::Refill,
        }
    }
}

/// A pending notification shown to the user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEntry {
    pub id: NotificationId,
    pub medication_id: MedicationId,
    pub medication_name: String,
    pub generic_name: Option<String>,
    /// Human-readable dosage ("1 tablet of 10 mg each")
    pub dosage: String,
    pub instructions: Option<String>,
    pub kind: NotificationKind,
    pub issued_at: DateTime<Local>,
}

impl NotificationEntry {
    fn for_medication(
        medication: &Medication,
        kind: NotificationKind,
        now: DateTime<Local>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            medication_id: medication.id.clone(),
            medication_name: medication.name.clone(),
            generic_name: medication.generic_name.clone(),
            dosage: medication.dosage.to_string(),
            instructions: medication.instructions.clone(),
            kind,
            issued_at: now,
        }
    }

    pub fn dose(medication: &Medication, time: ClockTime, now: DateTime<Local>) -> Self {
        Self::for_medication(medication, NotificationKind::Dose { time }, now)
    }

    pub fn refill(
        medication: &Medication,
        refill_date: NaiveDate,
        days_until: i64,
        now: DateTime<Local>,
    ) -> Self {
        Self::for_medication(
            medication,
            NotificationKind::Refill {
                refill_date,
                days_until,
            },
            now,
        )
    }

    pub fn tag(&self) -> NotificationKindTag {
        self.kind.tag()
    }

    /// Headline shown above the medication name
    pub fn title(&self) -> &'static str {
        match self.kind {
            NotificationKind::Dose { .. } => "Time to Take Medication",
            NotificationKind::Refill { .. } => "Refill Reminder",
        }
    }
}

/// Changes to the feed produced by one tick or intent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeedDelta {
    pub added: Vec<NotificationEntry>,
    pub removed: Vec<NotificationId>,
}

impl FeedDelta {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Result of the write-through call an intent delegated to the store.
///
/// Failures are reported, never rolled back: tracker state has already
/// been updated when the write is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WriteStatus {
    NotRequired,
    Persisted,
    Failed { message: String },
}

impl WriteStatus {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteStatus::Failed { .. })
    }
}

/// Updated feed state returned by every intent handler
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentOutcome {
    pub feed: Vec<NotificationEntry>,
    pub write: WriteStatus,
}
