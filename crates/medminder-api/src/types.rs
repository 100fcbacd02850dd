//! Medication and preference records

use chrono::{DateTime, Local, NaiveDate, Weekday};
use medminder_util::{ClockTime, MedicationId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Global fallback dose time used when a user has not chosen one.
pub const DEFAULT_DOSE_TIME: ClockTime = ClockTime::from_hm(9, 0);

/// Default snooze duration in minutes
pub const DEFAULT_SNOOZE_MINUTES: u32 = 1;

/// Default number of days before a refill date to start reminding
pub const DEFAULT_REFILL_REMINDER_DAYS_BEFORE: u32 = 1;

/// Strength unit of a dose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosageUnit {
    Mg,
    G,
    Ml,
    Tablets,
    Capsules,
    Puffs,
    Units,
}

impl fmt::Display for DosageUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Mg => "mg",
            Self::G => "g",
            Self::Ml => "ml",
            Self::Tablets => "tablets",
            Self::Capsules => "capsules",
            Self::Puffs => "puffs",
            Self::Units => "units",
        };
        f.write_str(s)
    }
}

/// Physical form of a dose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DosageForm {
    Tablet,
    Capsule,
    Liquid,
    Injection,
    Inhaler,
    Patch,
    Cream,
}

impl fmt::Display for DosageForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Tablet => "tablet",
            Self::Capsule => "capsule",
            Self::Liquid => "liquid",
            Self::Injection => "injection",
            Self::Inhaler => "inhaler",
            Self::Patch => "patch",
            Self::Cream => "cream",
        };
        f.write_str(s)
    }
}

/// How much to take per dose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dosage {
    /// Strength per unit
    pub amount: f64,
    pub unit: DosageUnit,
    pub form: DosageForm,
    /// Units to take per dose
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

impl Default for Dosage {
    fn default() -> Self {
        Self {
            amount: 1.0,
            unit: DosageUnit::Mg,
            form: DosageForm::Tablet,
            quantity: 1,
        }
    }
}

impl fmt::Display for Dosage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.quantity > 1 {
            write!(f, "{} {}s", self.quantity, self.form)?;
        } else {
            write!(f, "1 {}", self.form)?;
        }
        write!(f, " of {} {} each", self.amount, self.unit)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl From<DayOfWeek> for Weekday {
    fn from(day: DayOfWeek) -> Self {
        match day {
            DayOfWeek::Monday => Weekday::Mon,
            DayOfWeek::Tuesday => Weekday::Tue,
            DayOfWeek::Wednesday => Weekday::Wed,
            DayOfWeek::Thursday => Weekday::Thu,
            DayOfWeek::Friday => Weekday::Fri,
            DayOfWeek::Saturday => Weekday::Sat,
            DayOfWeek::Sunday => Weekday::Sun,
        }
    }
}

/// Frequency variant of a medication schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrequencyKind {
    Daily {
        times_per_day: u32,
    },
    Weekly {
        days_of_week: Vec<DayOfWeek>,
    },
    AsNeeded,
    Custom {
        /// Hours between doses
        #[serde(default)]
        interval_hours: Option<u32>,
    },
}

/// Frequency descriptor of a medication.
///
/// `specific_times` and `time_of_day` are kept as the raw strings the user
/// entered; malformed values are skipped when dose times are resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frequency {
    #[serde(flatten)]
    pub kind: FrequencyKind,

    /// Explicit dose times (HH:MM)
    #[serde(default)]
    pub specific_times: Option<Vec<String>>,

    /// Authoritative single daily check time (HH:MM)
    #[serde(default)]
    pub time_of_day: Option<String>,
}

impl Default for Frequency {
    /// Once daily with the `["09:00"]` placeholder every new medication starts with
    fn default() -> Self {
        Self {
            kind: FrequencyKind::Daily { times_per_day: 1 },
            specific_times: Some(vec![DEFAULT_DOSE_TIME.to_string()]),
            time_of_day: None,
        }
    }
}

impl Frequency {
    /// Whether doses are due on the given weekday. Only weekly schedules
    /// with at least one listed day are restricted.
    pub fn is_scheduled_on(&self, weekday: Weekday) -> bool {
        match &self.kind {
            FrequencyKind::Weekly { days_of_week } if !days_of_week.is_empty() => days_of_week
                .iter()
                .any(|day| Weekday::from(*day) == weekday),
            _ => true,
        }
    }
}

/// A medication record as held by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Medication {
    pub id: MedicationId,
    pub user_id: UserId,
    pub name: String,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub dosage: Dosage,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub instructions: Option<String>,
    pub start_date: NaiveDate,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub refill_date: Option<NaiveDate>,
    pub is_active: bool,

    /// Explicit per-medication dose time (HH:MM)
    #[serde(default)]
    pub preferred_time: Option<String>,

    /// Legacy per-medication default time. Superseded by the user-level
    /// `UserPreferences::default_time` and never consulted when resolving
    /// dose times.
    #[serde(default)]
    pub default_time: Option<String>,

    pub created_at: DateTime<Local>,
    pub updated_at: DateTime<Local>,
}

impl Medication {
    /// A new active medication with the default dosage and frequency
    pub fn new(user_id: UserId, name: impl Into<String>, now: DateTime<Local>) -> Self {
        Self {
            id: MedicationId::generate(),
            user_id,
            name: name.into(),
            generic_name: None,
            dosage: Dosage::default(),
            frequency: Frequency::default(),
            instructions: None,
            start_date: now.date_naive(),
            end_date: None,
            refill_date: None,
            is_active: true,
            preferred_time: None,
            default_time: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the course ended before `date`
    pub fn has_ended_by(&self, date: NaiveDate) -> bool {
        self.end_date.is_some_and(|end| end < date)
    }

    /// Whether dose reminders apply on `date`
    pub fn takes_doses_on(&self, date: NaiveDate) -> bool {
        use chrono::Datelike;
        self.is_active && !self.has_ended_by(date) && self.frequency.is_scheduled_on(date.weekday())
    }
}

/// Per-user reminder preferences.
///
/// Values are validated where they are saved; holders of this type may
/// assume they are in range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreferences {
    /// Global fallback dose time
    pub default_time: ClockTime,
    /// Dose snooze length in minutes (1-60)
    pub snooze_minutes: u32,
    /// Days before a refill date to start reminding (0-30)
    pub refill_reminder_days_before: u32,
}

impl Default for UserPreferences {
    fn default() -> Self {
        Self {
            default_time: DEFAULT_DOSE_TIME,
            snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            refill_reminder_days_before: DEFAULT_REFILL_REMINDER_DAYS_BEFORE,
        }
    }
}

/// Filter for listing medications
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationFilter {
    #[serde(default)]
    pub active: Option<bool>,
    /// Case-insensitive match on name, generic name, or instructions
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub dosage_form: Option<DosageForm>,
}

impl MedicationFilter {
    pub fn active_only() -> Self {
        Self {
            active: Some(true),
            ..Self::default()
        }
    }

    pub fn matches(&self, medication: &Medication) -> bool {
        if let Some(active) = self.active
            && medication.is_active != active
        {
            return false;
        }

        if let Some(form) = self.dosage_form
            && medication.dosage.form != form
        {
            return false;
        }

        if let Some(term) = &self.search {
            let term = term.to_lowercase();
            let hit = |field: Option<&str>| field.is_some_and(|v| v.to_lowercase().contains(&term));
            if !(hit(Some(&medication.name))
                || hit(medication.generic_name.as_deref())
                || hit(medication.instructions.as_deref()))
            {
                return false;
            }
        }

        true
    }
}
