pub mod executor;

pub use executor::{BookingExecutor, CandidateOutcome, ExecutorSettings};
