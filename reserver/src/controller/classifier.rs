//! Maps candidate outcomes onto retry decisions.

use crate::execution::CandidateOutcome;
use crate::model::AttemptOutcome;
use crate::portal::BasketOutcome;

/// `validity_no` codes that mean someone else got (or is getting) the court.
const CONFLICT_CODES: [i64; 3] = [5, 6, 9];

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    Success,
    /// Contention on this court; exclude it for this window and move on.
    RetryableConflict(String),
    /// This candidate cannot be booked; move on without excluding anything
    /// beyond what the outcome implies.
    CandidateFailure(AttemptOutcome, String),
    /// Stop the run. Carries the message to report, verbatim.
    TerminalFailure(String),
}

impl Verdict {
    pub fn attempt_outcome(&self) -> AttemptOutcome {
        match self {
            Verdict::Success => AttemptOutcome::Success,
            Verdict::RetryableConflict(_) => AttemptOutcome::Conflict,
            Verdict::CandidateFailure(o, _) => *o,
            Verdict::TerminalFailure(_) => AttemptOutcome::Terminal,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Verdict::Success => "",
            Verdict::RetryableConflict(m)
            | Verdict::CandidateFailure(_, m)
            | Verdict::TerminalFailure(m) => m,
        }
    }

    /// Whether the court must not be offered again for the same window.
    pub fn excludes_court(&self) -> bool {
        matches!(
            self,
            Verdict::RetryableConflict(_)
                | Verdict::CandidateFailure(AttemptOutcome::CourtUnavailable, _)
        )
    }
}

pub fn classify(outcome: &CandidateOutcome) -> Verdict {
    match outcome {
        CandidateOutcome::Submitted(b) => classify_basket(b),
        CandidateOutcome::CourtUnavailable(text) => {
            Verdict::CandidateFailure(AttemptOutcome::CourtUnavailable, text.clone())
        }
        CandidateOutcome::VerificationExhausted(tries) => Verdict::CandidateFailure(
            AttemptOutcome::VerificationFailed,
            format!("verification failed {tries} times"),
        ),
        CandidateOutcome::Transport(e) => {
            Verdict::CandidateFailure(AttemptOutcome::TransportError, e.clone())
        }
    }
}

fn classify_basket(outcome: &BasketOutcome) -> Verdict {
    match outcome {
        BasketOutcome::Inserted => Verdict::Success,
        BasketOutcome::Rejected { code, message } if CONFLICT_CODES.contains(code) => {
            Verdict::RetryableConflict(message.clone())
        }
        BasketOutcome::Rejected { message, .. } => Verdict::TerminalFailure(message.clone()),
        BasketOutcome::VerificationRejected(m) => {
            Verdict::CandidateFailure(AttemptOutcome::VerificationFailed, m.clone())
        }
        BasketOutcome::TransferFailed => Verdict::TerminalFailure("basket transfer failed".into()),
        BasketOutcome::LoginRequired => Verdict::TerminalFailure("login required".into()),
        BasketOutcome::Unexpected(body) => Verdict::TerminalFailure(body.clone()),
    }
}
