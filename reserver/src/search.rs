//! Window search within one strategy.

use std::collections::BTreeSet;

use tracing::debug;

use crate::model::{ReservationStrategy, SlotState, StartHour, TimeWindow};

/// The window starting exactly at `hour`, if every slot in it is bookable.
pub fn window_at(slots: &[SlotState], hour: u32, count: usize) -> Option<TimeWindow> {
    if count == 0 {
        return None;
    }
    let start = slots.iter().position(|s| s.start_hour() == Some(hour))?;
    let run = slots.get(start..start + count)?;
    TimeWindow::from_slots(run)
}

/// The latest fully bookable window whose start hour is not in `excluded`.
pub fn latest_window(
    slots: &[SlotState],
    count: usize,
    excluded: &BTreeSet<u32>,
) -> Option<TimeWindow> {
    if count == 0 || slots.len() < count {
        return None;
    }

    (0..=slots.len() - count).rev().find_map(|i| {
        let run = &slots[i..i + count];
        match run[0].start_hour() {
            Some(h) if excluded.contains(&h) => None,
            _ => TimeWindow::from_slots(run),
        }
    })
}

/// Yields the windows one strategy is allowed to try, in order.
///
/// A fixed-hour strategy yields its window at most once. An auto-find
/// strategy yields the latest window not yet yielded, scanning the slot data
/// it is given on each call, so later calls see fresh availability.
#[derive(Debug)]
pub struct WindowCursor<'a> {
    strategy: &'a ReservationStrategy,
    tried_hours: BTreeSet<u32>,
    fixed_done: bool,
}

impl<'a> WindowCursor<'a> {
    pub fn new(strategy: &'a ReservationStrategy) -> Self {
        Self {
            strategy,
            tried_hours: BTreeSet::new(),
            fixed_done: false,
        }
    }

    pub fn next_window(&mut self, slots: &[SlotState]) -> Option<TimeWindow> {
        let count = self.strategy.slot_count;
        let window = match self.strategy.start {
            StartHour::At(hour) => {
                if self.fixed_done {
                    return None;
                }
                self.fixed_done = true;
                window_at(slots, hour, count)
            }
            StartHour::Latest => latest_window(slots, count, &self.tried_hours),
        };

        match &window {
            Some(w) => {
                self.tried_hours.insert(w.start_hour());
                debug!(strategy = %self.strategy.name, window = %w.label(), "window chosen");
            }
            None => debug!(strategy = %self.strategy.name, "no window left"),
        }
        window
    }

    /// True once nothing more can be yielded whatever the slot data says, so
    /// callers can skip fetching it.
    pub fn is_exhausted(&self) -> bool {
        matches!(self.strategy.start, StartHour::At(_)) && self.fixed_done
    }

    pub fn tried_hours(&self) -> &BTreeSet<u32> {
        &self.tried_hours
    }
}
