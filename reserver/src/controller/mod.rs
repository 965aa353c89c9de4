pub mod classifier;
pub mod phase;
pub mod retry;

pub use classifier::{Verdict, classify};
pub use phase::{Phase, PhaseTracker};
pub use retry::{RetryController, RetrySettings};
