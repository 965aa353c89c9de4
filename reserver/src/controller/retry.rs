//! Retry controller.
//!
//! Walks the search space in priority order: strategies as configured,
//! windows as the strategy's cursor yields them, courts by the strategy's
//! court priority. Each candidate goes to the executor and its outcome is
//! classified into continue-or-stop.
//!
//! Invariants:
//! - total candidate attempts never exceed `max_attempts`
//! - a court excluded for a window is never offered again for that window
//! - the first terminal verdict ends the run
//! - a rejected portal session ends the run as a gate failure

use std::collections::{HashMap, HashSet};

use common::logger::annotate_span;
use tokio::time::Instant;
use tracing::{error, field, info, instrument, warn};

use crate::browser::{LiveSession, SessionHandle};
use crate::captcha::CaptchaSolver;
use crate::controller::classifier::{Verdict, classify};
use crate::controller::phase::{Phase, PhaseTracker};
use crate::error::RunError;
use crate::execution::BookingExecutor;
use crate::model::{
    AttemptRecord, BookingCandidate, CourtAvailabilitySet, CourtId, ReservableDate,
    ReservationResult, ReservationStrategy,
};
use crate::portal::{PortalApi, PortalError};
use crate::probe::{ProbeError, StateProbe};
use crate::search::WindowCursor;

#[derive(Clone, Copy, Debug)]
pub struct RetrySettings {
    /// Global ceiling on candidate attempts for the run.
    pub max_attempts: u32,
}

/// (start hour, slot count)
type WindowKey = (u32, usize);

/// The portal no longer accepts the handed-off cookies; no later request
/// can succeed either.
fn session_lost(e: &ProbeError) -> bool {
    matches!(e, ProbeError::Portal(PortalError::SessionRejected { .. }))
}

pub struct RetryController<'a, S, P, C> {
    probe: &'a dyn StateProbe<S>,
    executor: &'a BookingExecutor<P, C>,
    settings: RetrySettings,
}

impl<'a, S, P, C> RetryController<'a, S, P, C>
where
    S: LiveSession,
    P: PortalApi,
    C: CaptchaSolver,
{
    pub fn new(
        probe: &'a dyn StateProbe<S>,
        executor: &'a BookingExecutor<P, C>,
        settings: RetrySettings,
    ) -> Self {
        Self {
            probe,
            executor,
            settings,
        }
    }

    /// Tries every strategy against `date` until one candidate is booked.
    ///
    /// `result` is filled in as the search goes, whatever the outcome.
    #[instrument(
        skip_all,
        fields(component = "controller", day = %date.day, strategy = field::Empty, court = field::Empty)
    )]
    pub async fn run(
        &self,
        session: &mut SessionHandle<S>,
        date: &ReservableDate,
        strategies: &[ReservationStrategy],
        result: &mut ReservationResult,
    ) -> Result<(), RunError> {
        let started = Instant::now();
        let max = self.settings.max_attempts;
        let mut phases = PhaseTracker::default();
        let mut excluded: HashMap<WindowKey, HashSet<CourtId>> = HashMap::new();
        let no_exclusions = HashSet::new();
        let mut attempts: u32 = 0;

        result.date = Some(date.day.clone());

        for strategy in strategies {
            phases.enter(Phase::SearchingStrategy);
            result.tried_strategies.push(strategy.name.clone());
            annotate_span(&strategy.name, None);
            info!(strategy = %strategy, "trying strategy");

            let mut cursor = WindowCursor::new(strategy);

            loop {
                if cursor.is_exhausted() {
                    info!(strategy = %strategy.name, "fixed window already tried");
                    break;
                }

                let slots = match self.probe.slot_states(date).await {
                    Ok(s) => s,
                    Err(e) if session_lost(&e) => {
                        phases.enter(Phase::TerminalFailure);
                        error!(strategy = %strategy.name, error = %e, "portal session lost");
                        return Err(RunError::Gate(e.to_string()));
                    }
                    Err(e) => {
                        warn!(strategy = %strategy.name, error = %e, "slot listing failed, next strategy");
                        break;
                    }
                };

                let Some(window) = cursor.next_window(&slots) else {
                    info!(strategy = %strategy.name, "no bookable window left for strategy");
                    break;
                };
                let key = (window.start_hour(), window.len());

                let availability = match self
                    .probe
                    .court_availability(session, date, &window, &strategy.preferred_courts)
                    .await
                {
                    Ok(a) => a,
                    Err(e) if session_lost(&e) => {
                        phases.enter(Phase::TerminalFailure);
                        error!(window = %window.label(), error = %e, "portal session lost");
                        return Err(RunError::Gate(e.to_string()));
                    }
                    Err(e) => {
                        warn!(window = %window.label(), error = %e, "court probe failed, next window");
                        continue;
                    }
                };

                let courts = CourtAvailabilitySet::from_availability(
                    &availability,
                    &strategy.preferred_courts,
                )
                .without(excluded.get(&key).unwrap_or(&no_exclusions));

                if courts.is_empty() {
                    info!(window = %window.label(), "no free court for window");
                    continue;
                }
                info!(
                    window = %window.label(),
                    courts = ?courts.as_slice().iter().map(|c| c.number()).collect::<Vec<_>>(),
                    "candidate courts"
                );

                for court in courts.iter() {
                    if attempts >= max {
                        phases.enter(Phase::TerminalFailure);
                        error!(attempts, max, "attempt ceiling reached");
                        return Err(RunError::Terminal(format!(
                            "attempt ceiling reached ({max} attempts)"
                        )));
                    }
                    attempts += 1;
                    annotate_span(&strategy.name, Some(court.number()));

                    let candidate = BookingCandidate {
                        date: date.clone(),
                        window: window.clone(),
                        court,
                    };
                    let outcome = self.executor.attempt(session, &candidate, &mut phases).await;
                    let verdict = classify(&outcome);

                    result.attempts.push(AttemptRecord {
                        seq: attempts,
                        strategy: strategy.name.clone(),
                        window: window.label(),
                        court,
                        outcome: verdict.attempt_outcome(),
                        message: verdict.message().to_string(),
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    });

                    if verdict.excludes_court() {
                        excluded.entry(key).or_default().insert(court);
                    }

                    match verdict {
                        Verdict::Success => {
                            phases.enter(Phase::Success);
                            result.success = true;
                            result.time_slot = Some(window.label());
                            result.court = Some(court);
                            result.strategy_name = Some(strategy.name.clone());
                            result.error_message = None;
                            info!(
                                court = court.number(),
                                window = %window.label(),
                                attempts,
                                transitions = phases.history().len(),
                                elapsed_ms = started.elapsed().as_millis() as u64,
                                "reservation placed in basket"
                            );
                            return Ok(());
                        }
                        Verdict::RetryableConflict(message) => {
                            phases.enter(Phase::RetryableConflict);
                            warn!(
                                court = court.number(),
                                window = %window.label(),
                                retries = result.retries(),
                                %message,
                                "contention on court, retrying with next candidate"
                            );
                        }
                        Verdict::CandidateFailure(outcome, message) => {
                            warn!(
                                court = court.number(),
                                window = %window.label(),
                                %outcome,
                                %message,
                                "candidate failed, moving on"
                            );
                        }
                        Verdict::TerminalFailure(message) => {
                            phases.enter(Phase::TerminalFailure);
                            error!(
                                court = court.number(),
                                window = %window.label(),
                                %message,
                                "terminal rejection"
                            );
                            return Err(RunError::Terminal(message));
                        }
                    }
                }
            }
        }

        warn!(attempts, "every strategy exhausted");
        Err(RunError::NoSlots(format!(
            "all strategies exhausted after {attempts} attempts"
        )))
    }
}
