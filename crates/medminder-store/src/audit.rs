//! Audit event types

use chrono::{DateTime, Local, NaiveDate};
use medminder_util::{ClockTime, MedicationId};
use serde::{Deserialize, Serialize};

/// Types of audit events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuditEventType {
    /// Service started
    ServiceStarted,

    /// Service stopped
    ServiceStopped,

    /// Config loaded
    ConfigLoaded { user_id: String },

    /// Dose reminder pushed to the feed
    DoseReminderIssued {
        medication_id: MedicationId,
        time: ClockTime,
    },

    /// Dose reminder snoozed
    DoseSnoozed {
        medication_id: MedicationId,
        until: DateTime<Local>,
    },

    /// Dose marked as taken
    DoseTaken { medication_id: MedicationId },

    /// Refill reminder pushed to the feed
    RefillReminderIssued {
        medication_id: MedicationId,
        refill_date: NaiveDate,
        days_until: i64,
    },

    /// Refill reminder deferred to the next day
    RefillSnoozed { medication_id: MedicationId },

    /// Medication marked as refilled
    MedicationRefilled { medication_id: MedicationId },

    /// Medication deactivated after "no longer taking" was confirmed
    MedicationDeactivated { medication_id: MedicationId },

    /// Midnight reset cleared tracking state
    DailyReset { cleared_entries: usize },

    /// Global default dose time changed
    DefaultTimeChanged {
        from: Option<ClockTime>,
        to: ClockTime,
        invalidated: usize,
    },
}

/// Full audit event with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Unique event ID
    pub id: i64,

    /// Event timestamp
    pub timestamp: DateTime<Local>,

    /// Event type and details
    pub event: AuditEventType,
}

impl AuditEvent {
    pub fn new(event: AuditEventType) -> Self {
        Self {
            id: 0, // Will be set by store
            timestamp: medminder_util::now(),
            event,
        }
    }

    /// Event stamped with an explicit time
    pub fn at(event: AuditEventType, timestamp: DateTime<Local>) -> Self {
        Self {
            id: 0,
            timestamp,
            event,
        }
    }
}
