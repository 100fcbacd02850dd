//! Time utilities for medminder
//!
//! Dose reminders are scheduled on whole-minute wall-clock times (`HH:MM`)
//! and tracking state is keyed by local calendar date, so everything here
//! works in the host's local timezone.
//!
//! # Mock Time for Development
//!
//! In debug builds, the `MEDMINDER_MOCK_TIME` environment variable can be set
//! to override the system time for all time-sensitive operations. This is useful
//! for checking reminders without waiting for the clock.
//!
//! Format: `YYYY-MM-DD HH:MM:SS` (e.g., `2025-12-25 08:59:30`)
//!
//! Example:
//! ```bash
//! MEDMINDER_MOCK_TIME="2025-12-25 08:59:30" medminderd
//! ```

use chrono::{DateTime, Local, LocalResult, NaiveDate, NaiveDateTime, TimeZone, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Environment variable name for mock time (debug builds only)
pub const MOCK_TIME_ENV_VAR: &str = "MEDMINDER_MOCK_TIME";

/// Cached mock time offset from the real time when the process started.
/// This allows mock time to advance naturally.
static MOCK_TIME_OFFSET: OnceLock<Option<chrono::Duration>> = OnceLock::new();

#[allow(clippy::disallowed_methods)] // This is the internal implementation that wraps Local::now()
fn get_mock_time_offset() -> Option<chrono::Duration> {
    *MOCK_TIME_OFFSET.get_or_init(|| {
        #[cfg(debug_assertions)]
        {
            if let Ok(mock_time_str) = std::env::var(MOCK_TIME_ENV_VAR) {
                match NaiveDateTime::parse_from_str(&mock_time_str, "%Y-%m-%d %H:%M:%S") {
                    Ok(naive_dt) => match Local.from_local_datetime(&naive_dt).single() {
                        Some(mock_dt) => {
                            let offset = mock_dt.signed_duration_since(chrono::Local::now());
                            tracing::info!(
                                mock_time = %mock_time_str,
                                offset_secs = offset.num_seconds(),
                                "Mock time enabled"
                            );
                            return Some(offset);
                        }
                        None => tracing::warn!(
                            mock_time = %mock_time_str,
                            "Failed to convert mock time to local timezone"
                        ),
                    },
                    Err(_) => tracing::warn!(
                        mock_time = %mock_time_str,
                        expected_format = "%Y-%m-%d %H:%M:%S",
                        "Invalid mock time format"
                    ),
                }
            }
            None
        }
        #[cfg(not(debug_assertions))]
        {
            None
        }
    })
}

/// Returns whether mock time is currently active.
pub fn is_mock_time_active() -> bool {
    get_mock_time_offset().is_some()
}

/// Get the current local time, respecting mock time settings in debug builds.
#[allow(clippy::disallowed_methods)] // This is the wrapper that provides mock time support
pub fn now() -> DateTime<Local> {
    let real_now = chrono::Local::now();

    match get_mock_time_offset() {
        Some(offset) => real_now + offset,
        None => real_now,
    }
}

/// Error returned when a string is not a strict `HH:MM` clock time
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid clock time '{value}': expected HH:MM (00:00-23:59)")]
pub struct ClockTimeError {
    pub value: String,
}

/// A whole-minute wall-clock time of day (`HH:MM`).
///
/// Parsing is strict: exactly two hour digits (00-23), a colon, and two
/// minute digits (00-59). `"9:00"` and `"09:00:00"` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

impl ClockTime {
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        if hour < 24 && minute < 60 {
            Some(Self { hour, minute })
        } else {
            None
        }
    }

    /// Compile-time constructor; panics during const evaluation on out-of-range values
    pub const fn from_hm(hour: u8, minute: u8) -> Self {
        assert!(hour < 24 && minute < 60, "clock time out of range");
        Self { hour, minute }
    }

    /// Parse a strict `HH:MM` string, returning `None` for anything malformed
    pub fn parse(s: &str) -> Option<Self> {
        let bytes = s.as_bytes();
        if bytes.len() != 5 || bytes[2] != b':' {
            return None;
        }
        let digit = |b: u8| b.is_ascii_digit().then(|| b - b'0');
        let hour = digit(bytes[0])? * 10 + digit(bytes[1])?;
        let minute = digit(bytes[3])? * 10 + digit(bytes[4])?;
        Self::new(hour, minute)
    }

    /// The minute-resolution clock time of a local instant
    pub fn of(dt: &DateTime<Local>) -> Self {
        Self {
            hour: dt.hour() as u8,
            minute: dt.minute() as u8,
        }
    }

    /// Returns minutes since midnight
    pub fn as_minutes_from_midnight(&self) -> u32 {
        (self.hour as u32) * 60 + self.minute as u32
    }
}

impl PartialOrd for ClockTime {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ClockTime {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.as_minutes_from_midnight()
            .cmp(&other.as_minutes_from_midnight())
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

impl FromStr for ClockTime {
    type Err = ClockTimeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| ClockTimeError {
            value: s.to_string(),
        })
    }
}

impl TryFrom<String> for ClockTime {
    type Error = ClockTimeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ClockTime> for String {
    fn from(time: ClockTime) -> Self {
        time.to_string()
    }
}

/// First instant of the given local calendar day.
///
/// When a DST transition skips local midnight, the first valid instant
/// within the following hour is used instead.
pub fn start_of_local_day(date: NaiveDate) -> Option<DateTime<Local>> {
    let midnight = date.and_hms_opt(0, 0, 0)?;
    match Local.from_local_datetime(&midnight) {
        LocalResult::Single(dt) => Some(dt),
        LocalResult::Ambiguous(earliest, _) => Some(earliest),
        LocalResult::None => Local
            .from_local_datetime(&(midnight + chrono::Duration::hours(1)))
            .earliest(),
    }
}

/// The next local midnight strictly after `now`, recomputed from the
/// wall clock rather than by adding 24 hours.
pub fn next_local_midnight(now: &DateTime<Local>) -> DateTime<Local> {
    now.date_naive()
        .succ_opt()
        .and_then(start_of_local_day)
        .unwrap_or_else(|| *now + chrono::Duration::hours(24))
}

/// `now + delay`, saturating on durations chrono cannot represent
pub fn instant_after(now: &DateTime<Local>, delay: Duration) -> DateTime<Local> {
    let delta = chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(365));
    *now + delta
}

/// Whole calendar days from `from` to `to` (negative when `to` is earlier)
pub fn days_between(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days()
}
