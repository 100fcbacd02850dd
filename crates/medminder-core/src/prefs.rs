//! Default dose time change detection

use medminder_util::ClockTime;

/// A change of the user's global default time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultTimeChange {
    pub from: ClockTime,
    pub to: ClockTime,
}

/// Remembers the last default time seen so a change can take effect the
/// same day.
///
/// The first observation only records the value.
#[derive(Debug, Default)]
pub struct PreferenceReactor {
    previous_default_time: Option<ClockTime>,
}

impl PreferenceReactor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, default_time: ClockTime) -> Option<DefaultTimeChange> {
        let previous = self.previous_default_time.replace(default_time)?;
        (previous != default_time).then_some(DefaultTimeChange {
            from: previous,
            to: default_time,
        })
    }

    pub fn previous_default_time(&self) -> Option<ClockTime> {
        self.previous_default_time
    }
}
