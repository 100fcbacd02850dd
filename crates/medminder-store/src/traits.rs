//! Store trait definitions

use chrono::{DateTime, Local};
use medminder_api::{Medication, MedicationFilter, UserPreferences};
use medminder_util::{MedicationId, UserId};

use crate::{AuditEvent, StoreResult};

/// Main store trait
pub trait Store: Send + Sync {
    // Medications

    /// List a user's medications matching `filter`, oldest first
    fn list_medications(
        &self,
        user_id: &UserId,
        filter: &MedicationFilter,
    ) -> StoreResult<Vec<Medication>>;

    /// Get a medication by id
    fn get_medication(&self, id: &MedicationId) -> StoreResult<Option<Medication>>;

    /// Insert or replace a medication document
    fn save_medication(&self, medication: &Medication) -> StoreResult<()>;

    /// Flip the active flag; `MedicationNotFound` if the medication does not exist
    fn set_medication_active(
        &self,
        id: &MedicationId,
        active: bool,
        now: DateTime<Local>,
    ) -> StoreResult<()>;

    /// Delete a medication and its history
    fn delete_medication(&self, id: &MedicationId) -> StoreResult<()>;

    // Preferences

    /// Saved preferences for a user, if any
    fn get_preferences(&self, user_id: &UserId) -> StoreResult<Option<UserPreferences>>;

    /// Save preferences for a user
    fn save_preferences(&self, user_id: &UserId, prefs: &UserPreferences) -> StoreResult<()>;

    // History

    /// Record that a dose was taken
    fn record_dose_taken(&self, id: &MedicationId, at: DateTime<Local>) -> StoreResult<()>;

    /// Record that a medication was refilled
    fn record_refill(&self, id: &MedicationId, at: DateTime<Local>) -> StoreResult<()>;

    /// Most recent doses taken, newest first
    fn dose_history(&self, id: &MedicationId, limit: usize)
    -> StoreResult<Vec<DateTime<Local>>>;

    /// Most recent refills, newest first
    fn refill_history(
        &self,
        id: &MedicationId,
        limit: usize,
    ) -> StoreResult<Vec<DateTime<Local>>>;

    // Audit log

    /// Append an audit event
    fn append_audit(&self, event: AuditEvent) -> StoreResult<()>;

    /// Get recent audit events
    fn get_recent_audits(&self, limit: usize) -> StoreResult<Vec<AuditEvent>>;

    // Health

    /// Check if store is healthy
    fn is_healthy(&self) -> bool;
}
