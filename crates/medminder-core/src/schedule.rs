//! Dose time resolution
//!
//! Decides which clock times a medication is checked against each day. The
//! tracker and any display code must both go through [`resolve_dose_times`]
//! so a medication never shows one time and fires at another.

use medminder_api::Medication;
use medminder_util::ClockTime;

/// Value every new medication carries in `frequency.specific_times`.
///
/// A lone `"09:00"` with neither `preferred_time` nor `time_of_day` set is
/// read as "never configured", so the user's default time applies instead.
/// A user who deliberately picks 09:00 as their only specific time is
/// indistinguishable from one who never touched the field; that quirk is
/// kept on purpose.
pub const UNSET_SPECIFIC_TIMES_SENTINEL: &str = "09:00";

/// Clock times at which `medication` is due today, in priority order:
///
/// 1. `frequency.time_of_day`
/// 2. `frequency.specific_times`, unless it is the unset sentinel
/// 3. `medication.preferred_time`
/// 4. `user_default_time`
///
/// Malformed strings are skipped and resolution falls through to the next
/// source. The per-medication legacy `default_time` is never consulted.
/// The result is never empty.
pub fn resolve_dose_times(medication: &Medication, user_default_time: ClockTime) -> Vec<ClockTime> {
    explicit_dose_times(medication).unwrap_or_else(|| vec![user_default_time])
}

/// Whether any of the medication's own time sources resolves, i.e. the
/// user default does not apply to it
pub fn has_explicit_time(medication: &Medication) -> bool {
    explicit_dose_times(medication).is_some()
}

fn explicit_dose_times(medication: &Medication) -> Option<Vec<ClockTime>> {
    let frequency = &medication.frequency;

    if let Some(time) = frequency.time_of_day.as_deref().and_then(ClockTime::parse) {
        return Some(vec![time]);
    }

    if let Some(times) = &frequency.specific_times {
        let mut parsed: Vec<ClockTime> = Vec::with_capacity(times.len());
        for time in times.iter().filter_map(|s| ClockTime::parse(s)) {
            if !parsed.contains(&time) {
                parsed.push(time);
            }
        }
        if !parsed.is_empty() && !is_unset_sentinel(medication, &parsed) {
            return Some(parsed);
        }
    }

    medication
        .preferred_time
        .as_deref()
        .and_then(ClockTime::parse)
        .map(|time| vec![time])
}

fn is_unset_sentinel(medication: &Medication, times: &[ClockTime]) -> bool {
    matches!(times, [only] if only.to_string() == UNSET_SPECIFIC_TIMES_SENTINEL)
        && is_blank(medication.preferred_time.as_deref())
        && is_blank(medication.frequency.time_of_day.as_deref())
}

fn is_blank(value: Option<&str>) -> bool {
    value.is_none_or(str::is_empty)
}
