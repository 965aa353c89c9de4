use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::browser::{LiveSession, SessionHandle};
use crate::model::{CourtAvailability, CourtId, ReservableDate, SlotState, TimeWindow};
use crate::portal::PortalApi;
use crate::probe::{ProbeError, StateProbe, bounded};

/// Reads court availability by selecting the window in the live session and
/// inspecting the court markers the page renders for it.
///
/// The page only shows joint availability for the whole selection, so the
/// same court set is reported for every slot. The window stays selected
/// afterwards, which saves the executor a re-selection.
pub struct SpeculativeProbe<P> {
    portal: Arc<P>,
}

impl<P: PortalApi> SpeculativeProbe<P> {
    pub fn new(portal: Arc<P>) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl<S: LiveSession, P: PortalApi> StateProbe<S> for SpeculativeProbe<P> {
    async fn slot_states(&self, date: &ReservableDate) -> Result<Vec<SlotState>, ProbeError> {
        bounded("slot listing", self.portal.time_list(date, None)).await
    }

    #[instrument(skip_all, fields(window = %window.label(), courts = courts.len()))]
    async fn court_availability(
        &self,
        session: &mut SessionHandle<S>,
        _date: &ReservableDate,
        window: &TimeWindow,
        courts: &[CourtId],
    ) -> Result<CourtAvailability, ProbeError> {
        if session.try_dismiss_prompt().await {
            debug!("stale prompt dismissed before probing");
        }

        bounded("window selection", session.ensure_window(window)).await?;
        let free = bounded("court markers", session.read_courts(courts)).await?;

        debug!(free = ?free, "courts free for selection");
        Ok(CourtAvailability::joint(window.hours(), &free))
    }
}
