use std::fmt;

use tracing::debug;

/// Where the controller is within one candidate's lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    SearchingStrategy,
    WindowSelected,
    CourtSelected,
    Verifying,
    Submitted,
    Success,
    RetryableConflict,
    TerminalFailure,
}

impl Phase {
    pub fn is_final(self) -> bool {
        matches!(self, Phase::Success | Phase::TerminalFailure)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::SearchingStrategy => "searching-strategy",
            Phase::WindowSelected => "window-selected",
            Phase::CourtSelected => "court-selected",
            Phase::Verifying => "verifying",
            Phase::Submitted => "submitted",
            Phase::Success => "success",
            Phase::RetryableConflict => "retryable-conflict",
            Phase::TerminalFailure => "terminal-failure",
        };
        f.write_str(s)
    }
}

/// Records phase transitions for the run.
#[derive(Debug)]
pub struct PhaseTracker {
    current: Phase,
    history: Vec<Phase>,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self {
            current: Phase::SearchingStrategy,
            history: vec![Phase::SearchingStrategy],
        }
    }
}

impl PhaseTracker {
    /// Final phases are sticky.
    pub fn enter(&mut self, next: Phase) {
        if next == self.current || self.current.is_final() {
            return;
        }
        debug!(from = %self.current, to = %next, "phase");
        self.current = next;
        self.history.push(next);
    }

    pub fn current(&self) -> Phase {
        self.current
    }

    pub fn history(&self) -> &[Phase] {
        &self.history
    }
}
