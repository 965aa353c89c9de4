use super::CourtId;

/// One bookable one-hour unit on a date, as reported by the slot listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotState {
    /// "HH:MM"
    pub start: String,
    /// "HH:MM"
    pub end: String,
    pub total: i64,
    pub ended: i64,
    pub in_progress: i64,
    pub others: i64,
    /// Portal-side "applicable" flag. Closed slots are never bookable,
    /// whatever the counters say.
    pub open: bool,
}

impl SlotState {
    pub fn remaining_capacity(&self) -> i64 {
        self.total - self.ended - self.in_progress - self.others
    }

    pub fn is_bookable(&self) -> bool {
        self.open && self.remaining_capacity() > 0
    }

    pub fn start_hour(&self) -> Option<u32> {
        parse_hour(&self.start)
    }
}

fn parse_hour(hhmm: &str) -> Option<u32> {
    let (h, _) = hhmm.split_once(':').unwrap_or((hhmm, ""));
    h.trim().parse().ok()
}

/// A contiguous run of slots requested as a single reservation.
///
/// Only constructed through [`TimeWindow::from_slots`], so every value is a
/// valid candidate at the moment it was built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TimeWindow {
    start_hour: u32,
    slots: Vec<SlotState>,
}

impl TimeWindow {
    /// Builds a window if `slots` are non-empty, hour-consecutive and all
    /// bookable.
    pub fn from_slots(slots: &[SlotState]) -> Option<Self> {
        let first = slots.first()?.start_hour()?;

        for (i, s) in slots.iter().enumerate() {
            if s.start_hour()? != first + i as u32 || !s.is_bookable() {
                return None;
            }
        }

        Some(Self {
            start_hour: first,
            slots: slots.to_vec(),
        })
    }

    pub fn start_hour(&self) -> u32 {
        self.start_hour
    }

    pub fn end_hour(&self) -> u32 {
        self.start_hour + self.slots.len() as u32
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn slots(&self) -> &[SlotState] {
        &self.slots
    }

    pub fn hours(&self) -> impl Iterator<Item = u32> + '_ {
        let start = self.start_hour;
        (0..self.slots.len() as u32).map(move |i| start + i)
    }

    pub fn start_times(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.start.clone()).collect()
    }

    pub fn end_times(&self) -> Vec<String> {
        self.slots.iter().map(|s| s.end.clone()).collect()
    }

    /// "19:00~21:00"
    pub fn label(&self) -> String {
        match (self.slots.first(), self.slots.last()) {
            (Some(a), Some(b)) => format!("{}~{}", a.start, b.end),
            _ => String::new(),
        }
    }
}

/// A date the calendar listing marks as reservable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReservableDate {
    /// As listed by the portal, "YYYY-MM-DD" or "YYYYMMDD".
    pub day: String,
    /// Opaque per-date token the slot listing and basket calls require.
    pub token: String,
}

impl ReservableDate {
    /// "YYYYMMDD"
    pub fn compact(&self) -> String {
        self.day.replace('-', "")
    }
}

/// One (window, court) pairing handed to the executor.
#[derive(Clone, Debug)]
pub struct BookingCandidate {
    pub date: ReservableDate,
    pub window: TimeWindow,
    pub court: CourtId,
}

#[cfg(test)]
pub(crate) fn slot(hour: u32, total: i64, taken: i64) -> SlotState {
    SlotState {
        start: format!("{hour:02}:00"),
        end: format!("{:02}:00", hour + 1),
        total,
        ended: taken,
        in_progress: 0,
        others: 0,
        open: true,
    }
}
