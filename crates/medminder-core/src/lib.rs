//! Notification scheduling engine for medminder
//!
//! This crate decides when dose and refill reminders are shown:
//! - Dose time resolution (explicit times vs. the user's default)
//! - Dose tracker (Idle -> Notified -> Snoozed -> Notified)
//! - Refill tracker (date change -> settle delay -> window check)
//! - Daily reset at local midnight
//! - Default time change reactor
//! - The notification feed and the intents that act on it

mod dose;
mod engine;
mod feed;
mod prefs;
mod refill;
mod reset;
mod schedule;
mod timers;

pub use dose::*;
pub use engine::*;
pub use feed::*;
pub use prefs::*;
pub use refill::*;
pub use reset::*;
pub use schedule::*;
pub use timers::*;
