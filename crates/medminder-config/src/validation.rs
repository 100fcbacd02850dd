//! Configuration and preference validation

use crate::schema::{RawConfig, RawPreferences};
use medminder_api::UserPreferences;
use medminder_util::ClockTime;
use std::ops::RangeInclusive;
use thiserror::Error;

/// Accepted snooze durations, minutes
pub const SNOOZE_MINUTES_RANGE: RangeInclusive<i64> = 1..=60;

/// Accepted refill lead times, days
pub const REFILL_DAYS_BEFORE_RANGE: RangeInclusive<i64> = 0..=30;

/// Accepted tick cadence, seconds
pub const POLL_INTERVAL_RANGE: RangeInclusive<u64> = 1..=60;

/// Accepted refill settle delay, seconds
pub const SETTLE_DELAY_RANGE: RangeInclusive<u64> = 0..=3600;

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid time format for '{field}': '{value}' (use HH:MM, e.g. 09:00)")]
    InvalidTimeFormat { field: &'static str, value: String },

    #[error("'{field}' must be between {min} and {max}, got {value}")]
    OutOfRange {
        field: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("user_id cannot be empty")]
    EmptyUserId,
}

/// Validate a raw configuration, collecting every error
pub fn validate_config(config: &RawConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if let Some(user_id) = &config.service.user_id
        && user_id.trim().is_empty()
    {
        errors.push(ValidationError::EmptyUserId);
    }

    if let Some(secs) = config.service.poll_interval_seconds {
        check_range_u64(&mut errors, "poll_interval_seconds", secs, &POLL_INTERVAL_RANGE);
    }

    if let Some(secs) = config.service.settle_delay_seconds {
        check_range_u64(&mut errors, "settle_delay_seconds", secs, &SETTLE_DELAY_RANGE);
    }

    if let Some(prefs) = &config.preferences
        && let Err(pref_errors) = validate_preferences(prefs)
    {
        errors.extend(pref_errors);
    }

    errors
}

/// Validate preferences as entered by the user.
///
/// This is the only way to obtain `UserPreferences` from raw input; the
/// scheduler relies on it never seeing out-of-range values.
pub fn validate_preferences(raw: &RawPreferences) -> Result<UserPreferences, Vec<ValidationError>> {
    let mut errors = Vec::new();

    let default_time = match parse_time(&raw.default_time) {
        Ok(t) => Some(t),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    check_range(&mut errors, "snooze_minutes", raw.snooze_minutes, &SNOOZE_MINUTES_RANGE);
    check_range(
        &mut errors,
        "refill_reminder_days_before",
        raw.refill_reminder_days_before,
        &REFILL_DAYS_BEFORE_RANGE,
    );

    match default_time {
        Some(default_time) if errors.is_empty() => Ok(UserPreferences {
            default_time,
            snooze_minutes: raw.snooze_minutes as u32,
            refill_reminder_days_before: raw.refill_reminder_days_before as u32,
        }),
        _ => Err(errors),
    }
}

/// Parse a strict HH:MM default time
pub fn parse_time(s: &str) -> Result<ClockTime, ValidationError> {
    ClockTime::parse(s).ok_or_else(|| ValidationError::InvalidTimeFormat {
        field: "default_time",
        value: s.to_string(),
    })
}

fn check_range(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: i64,
    range: &RangeInclusive<i64>,
) {
    if !range.contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field,
            value,
            min: *range.start(),
            max: *range.end(),
        });
    }
}

fn check_range_u64(
    errors: &mut Vec<ValidationError>,
    field: &'static str,
    value: u64,
    range: &RangeInclusive<u64>,
) {
    if !range.contains(&value) {
        errors.push(ValidationError::OutOfRange {
            field,
            value: value.min(i64::MAX as u64) as i64,
            min: *range.start() as i64,
            max: *range.end() as i64,
        });
    }
}
