//! Data model and protocol types for medminder
//!
//! This crate defines the types shared between the scheduling core, the
//! document store, and clients of the service:
//! - Medication records and user preferences
//! - Notification feed entries and deltas
//! - Commands, responses, and events of the line protocol
//! - Versioning

mod commands;
mod events;
mod feed;
mod types;

pub use commands::*;
pub use events::*;
pub use feed::*;
pub use types::*;

/// Current API version
pub const API_VERSION: u32 = 1;
