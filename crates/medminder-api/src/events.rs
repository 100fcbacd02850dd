//! Event types for service -> client streaming

use chrono::{DateTime, Local};
use medminder_util::NotificationId;
use serde::{Deserialize, Serialize};

use crate::{FeedDelta, NotificationEntry, API_VERSION};

/// Event envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub api_version: u32,
    pub timestamp: DateTime<Local>,
    pub payload: EventPayload,
}

impl Event {
    pub fn new(payload: EventPayload) -> Self {
        Self {
            api_version: API_VERSION,
            timestamp: medminder_util::now(),
            payload,
        }
    }
}

/// All possible events from the service to clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Entries were added to or removed from the feed
    FeedChanged {
        added: Vec<NotificationEntry>,
        removed: Vec<NotificationId>,
    },

    /// Service is shutting down
    Shutdown,
}

impl From<FeedDelta> for EventPayload {
    fn from(delta: FeedDelta) -> Self {
        EventPayload::FeedChanged {
            added: delta.added,
            removed: delta.removed,
        }
    }
}
