use std::fmt;

use serde::{Deserialize, Serialize};

use super::CourtId;

/// Where a strategy's window starts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartHour {
    /// Exactly this hour; no substitution.
    At(u32),
    /// The latest fully bookable window of the day.
    Latest,
}

/// Immutable resource preference, consumed in configured priority order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservationStrategy {
    pub name: String,
    pub start: StartHour,
    /// Number of consecutive one-hour slots.
    pub slot_count: usize,
    /// Court priority; earlier wins.
    pub preferred_courts: Vec<CourtId>,
}

impl ReservationStrategy {
    pub fn fixed(
        name: impl Into<String>,
        hour: u32,
        slot_count: usize,
        courts: &[u32],
    ) -> Self {
        Self {
            name: name.into(),
            start: StartHour::At(hour),
            slot_count,
            preferred_courts: CourtId::list(courts),
        }
    }

    pub fn latest(name: impl Into<String>, slot_count: usize, courts: &[u32]) -> Self {
        Self {
            name: name.into(),
            start: StartHour::Latest,
            slot_count,
            preferred_courts: CourtId::list(courts),
        }
    }

    pub fn auto_find_latest(&self) -> bool {
        matches!(self.start, StartHour::Latest)
    }
}

impl fmt::Display for ReservationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.start {
            StartHour::At(h) => write!(
                f,
                "{} ({:02}:00-{:02}:00, {} courts)",
                self.name,
                h,
                h as usize + self.slot_count,
                self.preferred_courts.len()
            ),
            StartHour::Latest => write!(
                f,
                "{} (latest {}h, {} courts)",
                self.name,
                self.slot_count,
                self.preferred_courts.len()
            ),
        }
    }
}
