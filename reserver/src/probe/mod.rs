//! Availability probing.
//!
//! A probe answers two questions about a date: which slots are bookable, and
//! which courts are free for a given window. How it answers the second one is
//! the difference between the two implementations.

pub mod direct;
pub mod speculative;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::browser::{LiveSession, SessionError, SessionHandle};
use crate::model::{CourtAvailability, CourtId, ReservableDate, SlotState, TimeWindow};
use crate::portal::PortalError;

pub use direct::DirectProbe;
pub use speculative::SpeculativeProbe;

/// Upper bound for one probe call.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("portal error: {0}")]
    Portal(#[from] PortalError),

    #[error("live session error: {0}")]
    Session(#[from] SessionError),

    #[error("{0} timed out")]
    Timeout(&'static str),
}

#[async_trait]
pub trait StateProbe<S: LiveSession>: Send + Sync {
    async fn slot_states(&self, date: &ReservableDate) -> Result<Vec<SlotState>, ProbeError>;

    /// Per-slot free courts among `courts` for `window`.
    async fn court_availability(
        &self,
        session: &mut SessionHandle<S>,
        date: &ReservableDate,
        window: &TimeWindow,
        courts: &[CourtId],
    ) -> Result<CourtAvailability, ProbeError>;
}

/// Runs `fut` under [`PROBE_TIMEOUT`].
pub(crate) async fn bounded<T, E>(
    step: &'static str,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, ProbeError>
where
    ProbeError: From<E>,
{
    match tokio::time::timeout(PROBE_TIMEOUT, fut).await {
        Ok(r) => r.map_err(ProbeError::from),
        Err(_) => Err(ProbeError::Timeout(step)),
    }
}
