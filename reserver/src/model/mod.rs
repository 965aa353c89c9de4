pub mod availability;
pub mod court;
pub mod result;
pub mod slot;
pub mod strategy;

pub use availability::{CourtAvailability, CourtAvailabilitySet};
pub use court::{ALL_COURTS, CourtId, CourtKind, INDOOR_COURTS, OUTDOOR_COURTS};
pub use result::{AttemptOutcome, AttemptRecord, ReservationResult};
pub use slot::{BookingCandidate, ReservableDate, SlotState, TimeWindow};
pub use strategy::{ReservationStrategy, StartHour};
