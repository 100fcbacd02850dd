//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Service-level settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Preferences used until the user saves their own
    #[serde(default)]
    pub preferences: Option<RawPreferences>,
}

/// Service-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// User whose medications are tracked (default: "local")
    pub user_id: Option<String>,

    /// Data directory for the store
    pub data_dir: Option<PathBuf>,

    /// Seconds between dose ticks (default: 5)
    pub poll_interval_seconds: Option<u64>,

    /// Seconds to wait after a refill date changes before evaluating it (default: 30)
    pub settle_delay_seconds: Option<u64>,
}

/// Reminder preferences as entered by the user
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawPreferences {
    /// Global default dose time, HH:MM
    #[serde(default = "default_time")]
    pub default_time: String,

    /// Snooze duration in minutes
    #[serde(default = "default_snooze_minutes")]
    pub snooze_minutes: i64,

    /// Days before the refill date to start reminding
    #[serde(default = "default_refill_days")]
    pub refill_reminder_days_before: i64,
}

impl Default for RawPreferences {
    fn default() -> Self {
        Self {
            default_time: default_time(),
            snooze_minutes: default_snooze_minutes(),
            refill_reminder_days_before: default_refill_days(),
        }
    }
}

fn default_time() -> String {
    medminder_api::DEFAULT_DOSE_TIME.to_string()
}

fn default_snooze_minutes() -> i64 {
    medminder_api::DEFAULT_SNOOZE_MINUTES as i64
}

fn default_refill_days() -> i64 {
    medminder_api::DEFAULT_REFILL_REMINDER_DAYS_BEFORE as i64
}
