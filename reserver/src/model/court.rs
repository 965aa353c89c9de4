use std::fmt;

use serde::{Deserialize, Serialize};

/// Indoor courts close at 21:00.
pub const INDOOR_COURTS: [u32; 4] = [5, 6, 7, 8];
pub const OUTDOOR_COURTS: [u32; 14] = [19, 18, 2, 13, 17, 16, 15, 14, 12, 11, 10, 9, 4, 3];
pub const ALL_COURTS: [u32; 18] = [
    5, 6, 7, 8, 19, 18, 2, 13, 17, 16, 15, 14, 12, 11, 10, 9, 4, 3,
];

/// Court number as used by the portal (`court_no`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CourtId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CourtKind {
    Indoor,
    Outdoor,
}

impl CourtId {
    pub fn number(self) -> u32 {
        self.0
    }

    pub fn kind(self) -> CourtKind {
        if INDOOR_COURTS.contains(&self.0) {
            CourtKind::Indoor
        } else {
            CourtKind::Outdoor
        }
    }

    pub fn list(numbers: &[u32]) -> Vec<CourtId> {
        numbers.iter().copied().map(CourtId).collect()
    }
}

impl fmt::Display for CourtId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CourtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CourtKind::Indoor => f.write_str("indoor"),
            CourtKind::Outdoor => f.write_str("outdoor"),
        }
    }
}
