//! Booking attempt execution for a single candidate.
//!
//! Drives one (date, window, court) candidate through court selection, the
//! verification challenge and basket submission.
//!
//! Guarantees:
//! - at most `captcha_attempts` submissions per candidate
//! - the challenge is refreshed before every retry
//! - every exit path dismisses prompts and clears the live selection
//!
//! Retry decisions across candidates belong to the controller; this module
//! only reports what happened.

use std::sync::Arc;
use std::time::Duration;

use common::logger::warn_if_slow;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::browser::{CourtSelection, LiveSession, SessionHandle};
use crate::captcha::{CaptchaSolver, normalize_code};
use crate::controller::{Phase, PhaseTracker};
use crate::model::BookingCandidate;
use crate::portal::{BasketOutcome, BasketRequest, PortalApi};

/// Submission latency above which a warning is logged.
const SLOW_SUBMIT: Duration = Duration::from_millis(1_500);

/// What happened to one candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CandidateOutcome {
    /// The portal gave a verdict on the submission.
    Submitted(BasketOutcome),
    /// The page refused the court; carries the prompt text.
    CourtUnavailable(String),
    /// Every verification try failed; carries the number of tries.
    VerificationExhausted(u32),
    /// A step failed before the portal could give a verdict.
    Transport(String),
}

#[derive(Clone, Copy, Debug)]
pub struct ExecutorSettings {
    pub captcha_attempts: u32,
    pub captcha_timeout: Duration,
}

pub struct BookingExecutor<P, C> {
    portal: Arc<P>,
    solver: Arc<C>,
    settings: ExecutorSettings,
}

impl<P: PortalApi, C: CaptchaSolver> BookingExecutor<P, C> {
    pub fn new(portal: Arc<P>, solver: Arc<C>, settings: ExecutorSettings) -> Self {
        Self {
            portal,
            solver,
            settings: ExecutorSettings {
                captcha_attempts: settings.captcha_attempts.max(1),
                ..settings
            },
        }
    }

    pub async fn attempt<S: LiveSession>(
        &self,
        session: &mut SessionHandle<S>,
        candidate: &BookingCandidate,
        phases: &mut PhaseTracker,
    ) -> CandidateOutcome {
        let span = info_span!(
            "candidate",
            window = %candidate.window.label(),
            court = candidate.court.number()
        );

        async {
            let outcome = self.drive(session, candidate, phases).await;
            session.reset().await;
            outcome
        }
        .instrument(span)
        .await
    }

    async fn drive<S: LiveSession>(
        &self,
        session: &mut SessionHandle<S>,
        candidate: &BookingCandidate,
        phases: &mut PhaseTracker,
    ) -> CandidateOutcome {
        if let Err(e) = session.ensure_window(&candidate.window).await {
            return CandidateOutcome::Transport(format!("window selection failed: {e}"));
        }
        phases.enter(Phase::WindowSelected);

        match session.select_court(candidate.court).await {
            Ok(CourtSelection::Selected) => {}
            Ok(CourtSelection::Unavailable(text)) => {
                info!(prompt = %text, "court refused by the page");
                return CandidateOutcome::CourtUnavailable(text);
            }
            Err(e) => return CandidateOutcome::Transport(format!("court selection failed: {e}")),
        }
        phases.enter(Phase::CourtSelected);

        let max = self.settings.captcha_attempts;
        for attempt in 1..=max {
            phases.enter(Phase::Verifying);
            debug!(attempt, max, "verification attempt");

            let Some(code) = self.read_code(session).await else {
                self.refresh_challenge(session, attempt, max).await;
                continue;
            };

            phases.enter(Phase::Submitted);
            let request = BasketRequest::new(
                &candidate.date,
                &candidate.window,
                candidate.court,
                &code,
            );

            let submitted = warn_if_slow(
                "basket_submit",
                SLOW_SUBMIT,
                self.portal.add_to_basket(&request),
            )
            .await;

            match submitted {
                Ok(BasketOutcome::VerificationRejected(msg)) => {
                    warn!(attempt, message = %msg, "verification code rejected");
                    self.refresh_challenge(session, attempt, max).await;
                }
                Ok(outcome) => return CandidateOutcome::Submitted(outcome),
                Err(e) => {
                    warn!(error = %e, "basket submission failed");
                    return CandidateOutcome::Transport(e.to_string());
                }
            }
        }

        CandidateOutcome::VerificationExhausted(max)
    }

    /// Captures and solves the challenge. `None` on any failure.
    async fn read_code<S: LiveSession>(&self, session: &mut SessionHandle<S>) -> Option<String> {
        let image = match session.captcha_image(self.settings.captcha_timeout).await {
            Ok(Some(img)) => img,
            Ok(None) => {
                warn!("challenge image did not appear");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "challenge image capture failed");
                return None;
            }
        };

        let raw = match self.solver.solve(&image).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "ocr failed");
                return None;
            }
        };

        let code = normalize_code(&raw);
        if code.is_none() {
            warn!(raw = %raw, "ocr result is not a 3 or 4 digit code");
        }
        code
    }

    async fn refresh_challenge<S: LiveSession>(
        &self,
        session: &mut SessionHandle<S>,
        attempt: u32,
        max: u32,
    ) {
        if attempt >= max {
            return;
        }
        session.try_dismiss_prompt().await;
        if let Err(e) = session.refresh_captcha().await {
            warn!(error = %e, "challenge refresh failed");
        }
    }
}
