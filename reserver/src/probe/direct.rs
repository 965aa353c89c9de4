use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::browser::{LiveSession, SessionHandle};
use crate::model::{CourtAvailability, CourtId, ReservableDate, SlotState, TimeWindow};
use crate::portal::PortalApi;
use crate::probe::{ProbeError, StateProbe, bounded};

/// Reads court availability from per-court slot listings.
///
/// One listing call per court yields true per-slot court sets. The live
/// session is never touched.
pub struct DirectProbe<P> {
    portal: Arc<P>,
}

impl<P: PortalApi> DirectProbe<P> {
    pub fn new(portal: Arc<P>) -> Self {
        Self { portal }
    }
}

#[async_trait]
impl<S: LiveSession, P: PortalApi> StateProbe<S> for DirectProbe<P> {
    async fn slot_states(&self, date: &ReservableDate) -> Result<Vec<SlotState>, ProbeError> {
        bounded("slot listing", self.portal.time_list(date, None)).await
    }

    #[instrument(skip_all, fields(window = %window.label(), courts = courts.len()))]
    async fn court_availability(
        &self,
        _session: &mut SessionHandle<S>,
        date: &ReservableDate,
        window: &TimeWindow,
        courts: &[CourtId],
    ) -> Result<CourtAvailability, ProbeError> {
        let mut per_slot: Vec<(u32, BTreeSet<CourtId>)> =
            window.hours().map(|h| (h, BTreeSet::new())).collect();

        for &court in courts {
            let slots = bounded("court slot listing", self.portal.time_list(date, Some(court))).await?;

            for (hour, free) in per_slot.iter_mut() {
                let bookable = slots
                    .iter()
                    .any(|s| s.start_hour() == Some(*hour) && s.is_bookable());
                if bookable {
                    free.insert(court);
                }
            }
        }

        debug!(?per_slot, "per-court availability");
        Ok(CourtAvailability { per_slot })
    }
}
