use std::collections::{BTreeSet, HashSet};

use super::CourtId;

/// Per-slot court availability for one window, as reported by a probe.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CourtAvailability {
    /// (slot start hour, courts free in that slot)
    pub per_slot: Vec<(u32, BTreeSet<CourtId>)>,
}

impl CourtAvailability {
    /// Same court set reported for every hour, used when the portal only
    /// exposes joint availability for the selected window.
    pub fn joint(hours: impl IntoIterator<Item = u32>, courts: &[CourtId]) -> Self {
        let set: BTreeSet<CourtId> = courts.iter().copied().collect();
        Self {
            per_slot: hours.into_iter().map(|h| (h, set.clone())).collect(),
        }
    }
}

/// Courts bookable across the *entire* window, in strategy priority order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CourtAvailabilitySet {
    courts: Vec<CourtId>,
}

impl CourtAvailabilitySet {
    /// Intersects the per-slot sets and orders the result by `priority`.
    ///
    /// Courts absent from `priority` are dropped; an availability with no
    /// slots yields an empty set.
    pub fn from_availability(availability: &CourtAvailability, priority: &[CourtId]) -> Self {
        if availability.per_slot.is_empty() {
            return Self::default();
        }

        let mut seen = HashSet::new();
        let courts = priority
            .iter()
            .copied()
            .filter(|c| seen.insert(*c))
            .filter(|c| availability.per_slot.iter().all(|(_, set)| set.contains(c)))
            .collect();

        Self { courts }
    }

    pub fn without(&self, excluded: &HashSet<CourtId>) -> Self {
        Self {
            courts: self
                .courts
                .iter()
                .copied()
                .filter(|c| !excluded.contains(c))
                .collect(),
        }
    }

    pub fn as_slice(&self) -> &[CourtId] {
        &self.courts
    }

    pub fn iter(&self) -> impl Iterator<Item = CourtId> + '_ {
        self.courts.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.courts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.courts.is_empty()
    }
}
