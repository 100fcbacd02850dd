//! Error types for medminder

use thiserror::Error;

use crate::{MedicationId, NotificationId};

/// Core error type for medminder operations
#[derive(Debug, Error)]
pub enum MedminderError {
    #[error("Medication not found: {0}")]
    MedicationNotFound(MedicationId),

    #[error("Notification not found: {0}")]
    NotificationNotFound(NotificationId),

    #[error("Nothing pending confirmation for medication: {0}")]
    NothingToConfirm(MedicationId),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MedminderError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ValidationError(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreError(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MedminderError>;
