//! Command types for the medminder line protocol

use medminder_util::{MedicationId, NotificationId};
use serde::{Deserialize, Serialize};

use crate::{NotificationEntry, UserPreferences, WriteStatus, API_VERSION};

/// Request wrapper with metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Request ID for correlation
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// The command
    pub command: Command,
}

impl Request {
    pub fn new(request_id: u64, command: Command) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            command,
        }
    }
}

/// Response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    /// Corresponding request ID
    pub request_id: u64,
    /// API version
    pub api_version: u32,
    /// Response payload or error
    pub result: ResponseResult,
}

impl Response {
    pub fn success(request_id: u64, payload: ResponsePayload) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Ok(payload),
        }
    }

    pub fn error(request_id: u64, error: ErrorInfo) -> Self {
        Self {
            request_id,
            api_version: API_VERSION,
            result: ResponseResult::Err(error),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseResult {
    Ok(ResponsePayload),
    Err(ErrorInfo),
}

/// Error information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: ErrorCode,
    pub message: String,
}

impl ErrorInfo {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Error codes for the protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    InvalidRequest,
    MedicationNotFound,
    NotificationNotFound,
    NothingToConfirm,
    ValidationFailed,
    StoreError,
    InternalError,
}

/// All possible commands from clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Command {
    /// Current feed contents
    GetFeed,

    /// Close a feed entry without further action
    Dismiss { entry_id: NotificationId },

    /// Snooze a dose reminder; uses the preferred snooze length when omitted
    SnoozeDose {
        medication_id: MedicationId,
        #[serde(default)]
        minutes: Option<u32>,
    },

    /// Dose taken; done for today
    MarkTaken { medication_id: MedicationId },

    /// Defer a refill reminder to tomorrow
    SnoozeRefill { medication_id: MedicationId },

    /// Supply renewed
    MarkRefilled { medication_id: MedicationId },

    /// Start the "no longer taking" flow (awaits confirmation)
    NoLongerTaking { medication_id: MedicationId },

    /// Confirm deactivation
    ConfirmNoLongerTaking { medication_id: MedicationId },

    /// Abandon deactivation; restores the reminder if it came from the feed
    CancelNoLongerTaking { medication_id: MedicationId },

    /// Save new preferences. Values are raw user input and validated
    /// before anything is stored.
    UpdatePreferences {
        default_time: String,
        snooze_minutes: i64,
        refill_reminder_days_before: i64,
    },

    /// Ping for keepalive
    Ping,
}

/// Response payloads
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponsePayload {
    Feed {
        entries: Vec<NotificationEntry>,
        write: WriteStatus,
    },
    PreferencesUpdated {
        preferences: UserPreferences,
    },
    Pong,
}
