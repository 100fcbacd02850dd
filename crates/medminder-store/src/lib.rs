//! Persistence layer for medminder
//!
//! Provides:
//! - Medication documents (per user, filterable)
//! - User preferences
//! - Dose and refill history
//! - Audit log (append-only)

mod audit;
mod sqlite;
mod traits;

pub use audit::*;
pub use sqlite::*;
pub use traits::*;

use medminder_util::{MedicationId, MedminderError};
use thiserror::Error;

/// Store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Malformed stored document: {0}")]
    Document(String),

    #[error("Malformed stored timestamp '{value}'")]
    Timestamp {
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("Medication not found: {0}")]
    MedicationNotFound(MedicationId),

    #[error("Store lock poisoned")]
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Database(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Document(e.to_string())
    }
}

impl From<StoreError> for MedminderError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::MedicationNotFound(id) => MedminderError::MedicationNotFound(id),
            other => MedminderError::store(other.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
