//! The notification feed

use medminder_api::{NotificationEntry, NotificationKindTag};
use medminder_util::{MedicationId, NotificationId};

/// Pending notifications, oldest first.
///
/// At most one entry per (medication, kind) is ever present.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    entries: Vec<NotificationEntry>,
}

impl NotificationFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry unless one of the same kind is already pending for the
    /// medication. Returns whether the entry was added.
    pub fn push(&mut self, entry: NotificationEntry) -> bool {
        if self.find_for(&entry.medication_id, entry.tag()).is_some() {
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Append an entry, taking out any pending entry of the same kind for the
    /// medication. Returns the entry that was replaced.
    pub fn supersede(&mut self, entry: NotificationEntry) -> Option<NotificationEntry> {
        let replaced = self.remove_for(&entry.medication_id, entry.tag());
        self.entries.push(entry);
        replaced
    }

    pub fn entries(&self) -> &[NotificationEntry] {
        &self.entries
    }

    pub fn find_for(
        &self,
        medication_id: &MedicationId,
        tag: NotificationKindTag,
    ) -> Option<&NotificationEntry> {
        self.entries
            .iter()
            .find(|e| &e.medication_id == medication_id && e.tag() == tag)
    }

    pub fn remove(&mut self, id: NotificationId) -> Option<NotificationEntry> {
        let index = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(index))
    }

    pub fn remove_for(
        &mut self,
        medication_id: &MedicationId,
        tag: NotificationKindTag,
    ) -> Option<NotificationEntry> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.medication_id == medication_id && e.tag() == tag)?;
        Some(self.entries.remove(index))
    }

    /// Remove every entry for a medication
    pub fn remove_medication(&mut self, medication_id: &MedicationId) -> Vec<NotificationEntry> {
        let (removed, kept) = std::mem::take(&mut self.entries)
            .into_iter()
            .partition(|e| &e.medication_id == medication_id);
        self.entries = kept;
        removed
    }

    /// Empty the feed, returning the ids that were removed
    pub fn clear(&mut self) -> Vec<NotificationId> {
        self.entries.drain(..).map(|e| e.id).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
