//! Shared utilities for medminder
//!
//! This crate provides:
//! - ID types (MedicationId, UserId, NotificationId)
//! - Time utilities (HH:MM clock times, local midnight arithmetic, mockable `now()`)
//! - Error types
//! - Default paths for config, data, and log directories

mod error;
mod ids;
mod paths;
mod time;

pub use error::*;
pub use ids::*;
pub use paths::*;
pub use time::*;
