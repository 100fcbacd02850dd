//! Strongly-typed identifiers for medminder

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a medication document in the store
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MedicationId(String);

impl MedicationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id (used when a medication is first saved)
    pub fn generate() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MedicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MedicationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MedicationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identifier of the user whose medications are tracked
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique identifier for an entry in the notification feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NotificationId(Uuid);

impl NotificationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for NotificationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for NotificationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn medication_id_equality() {
        let id1 = MedicationId::new("med-1");
        let id2 = MedicationId::new("med-1");
        let id3 = MedicationId::new("med-2");

        assert_eq!(id1, id2);
        assert_ne!(id1, id3);
    }

    #[test]
    fn generated_medication_ids_differ() {
        assert_ne!(MedicationId::generate(), MedicationId::generate());
    }

    #[test]
    fn notification_id_uniqueness() {
        let n1 = NotificationId::new();
        let n2 = NotificationId::new();
        assert_ne!(n1, n2);
    }

    #[test]
    fn ids_serialize_as_plain_values() {
        let med_id = MedicationId::new("aspirin");
        let json = serde_json::to_string(&med_id).unwrap();
        assert_eq!(json, "\"aspirin\"");
        let parsed: MedicationId = serde_json::from_str(&json).unwrap();
        assert_eq!(med_id, parsed);

        let notification_id = NotificationId::new();
        let json = serde_json::to_string(&notification_id).unwrap();
        let parsed: NotificationId = serde_json::from_str(&json).unwrap();
        assert_eq!(notification_id, parsed);
    }
}
