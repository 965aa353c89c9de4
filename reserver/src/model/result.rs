use std::fmt;

use super::{CourtId, CourtKind};

/// How a single candidate attempt ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    /// Contention reported by the server; only this court is excluded.
    Conflict,
    /// The live session refused the court selection (already reserved).
    CourtUnavailable,
    /// Verification attempts exhausted for this candidate.
    VerificationFailed,
    /// Submission never reached a verdict (network or protocol error).
    TransportError,
    Terminal,
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AttemptOutcome::Success => "success",
            AttemptOutcome::Conflict => "conflict",
            AttemptOutcome::CourtUnavailable => "court-unavailable",
            AttemptOutcome::VerificationFailed => "verification-failed",
            AttemptOutcome::TransportError => "transport-error",
            AttemptOutcome::Terminal => "terminal",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AttemptRecord {
    /// 1-based, run-wide.
    pub seq: u32,
    pub strategy: String,
    pub window: String,
    pub court: CourtId,
    pub outcome: AttemptOutcome,
    pub message: String,
    /// Milliseconds since the search started.
    pub elapsed_ms: u64,
}

impl fmt::Display for AttemptRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} +{}ms [{}] {} court {} -> {}",
            self.seq, self.elapsed_ms, self.strategy, self.window, self.court, self.outcome
        )?;
        if !self.message.is_empty() {
            write!(f, " ({})", self.message)?;
        }
        Ok(())
    }
}

/// Accumulator for one run. Written by the retry controller, read by the
/// reporter; never shared across runs.
#[derive(Clone, Debug, Default)]
pub struct ReservationResult {
    pub success: bool,
    pub date: Option<String>,
    pub time_slot: Option<String>,
    pub court: Option<CourtId>,
    pub strategy_name: Option<String>,
    pub tried_strategies: Vec<String>,
    pub attempts: Vec<AttemptRecord>,
    pub error_message: Option<String>,
}

impl ReservationResult {
    pub fn court_kind(&self) -> Option<CourtKind> {
        self.court.map(CourtId::kind)
    }

    /// Number of contention retries, i.e. attempts the server answered with a
    /// conflict.
    pub fn retries(&self) -> usize {
        self.attempts
            .iter()
            .filter(|a| a.outcome == AttemptOutcome::Conflict)
            .count()
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.success = false;
        self.error_message = Some(message.into());
    }
}
