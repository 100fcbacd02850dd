//! Validated settings structures

use crate::schema::{RawConfig, RawServiceConfig};
use crate::validation::{ValidationError, validate_preferences};
use medminder_api::UserPreferences;
use medminder_util::{UserId, default_data_dir};
use std::path::PathBuf;
use std::time::Duration;

/// User tracked when the config does not name one
pub const DEFAULT_USER_ID: &str = "local";

/// Default seconds between dose ticks
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Default seconds between a refill-date change and its evaluation
pub const DEFAULT_SETTLE_DELAY_SECS: u64 = 30;

/// Validated settings ready for use by the service
#[derive(Debug, Clone)]
pub struct Settings {
    pub service: ServiceConfig,
    pub scheduler: SchedulerSettings,
    /// Seed preferences, used until the store holds saved ones
    pub preferences: UserPreferences,
}

impl Settings {
    /// Convert from raw config
    pub fn from_raw(raw: RawConfig) -> Result<Self, Vec<ValidationError>> {
        let preferences = match &raw.preferences {
            Some(prefs) => validate_preferences(prefs)?,
            None => UserPreferences::default(),
        };

        Ok(Self {
            scheduler: SchedulerSettings::from_raw(&raw.service),
            service: ServiceConfig::from_raw(raw.service),
            preferences,
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            service: ServiceConfig::from_raw(RawServiceConfig::default()),
            scheduler: SchedulerSettings::default(),
            preferences: UserPreferences::default(),
        }
    }
}

/// Service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub user_id: UserId,
    pub data_dir: PathBuf,
}

impl ServiceConfig {
    fn from_raw(raw: RawServiceConfig) -> Self {
        Self {
            user_id: UserId::new(raw.user_id.unwrap_or_else(|| DEFAULT_USER_ID.to_string())),
            data_dir: raw.data_dir.unwrap_or_else(default_data_dir),
        }
    }
}

/// Timing knobs for the scheduling engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// How often dose times are compared against the wall clock
    pub poll_interval: Duration,
    /// Quiet period after a refill date changes before it is evaluated
    pub settle_delay: Duration,
}

impl SchedulerSettings {
    fn from_raw(raw: &RawServiceConfig) -> Self {
        Self {
            poll_interval: Duration::from_secs(
                raw.poll_interval_seconds.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
            settle_delay: Duration::from_secs(
                raw.settle_delay_seconds.unwrap_or(DEFAULT_SETTLE_DELAY_SECS),
            ),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(DEFAULT_POLL_INTERVAL_SECS),
            settle_delay: Duration::from_secs(DEFAULT_SETTLE_DELAY_SECS),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let settings = Settings::default();
        assert_eq!(settings.service.user_id.as_str(), "local");
        assert_eq!(settings.scheduler.poll_interval, Duration::from_secs(5));
        assert_eq!(settings.scheduler.settle_delay, Duration::from_secs(30));
        assert_eq!(settings.preferences, UserPreferences::default());
    }

    #[test]
    fn explicit_data_dir_is_kept() {
        let raw: RawConfig = toml::from_str(
            r#"
            config_version = 1
            [service]
            data_dir = "/srv/medminder"
            "#,
        )
        .unwrap();

        let settings = Settings::from_raw(raw).unwrap();
        assert_eq!(settings.service.data_dir, PathBuf::from("/srv/medminder"));
    }
}
