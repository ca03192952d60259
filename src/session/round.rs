//! Per-round results returned by `Session::tick`.

use crate::dispatch::PendingCall;
use crate::types::{Response, ToolOutput};

/// What the session will do after this round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Tool outputs are queued; the next tick issues another round.
    Continue,
    /// Calls remain that only the caller can answer with
    /// `Session::submit_tool_outputs`.
    AwaitingToolOutputs,
    /// No unresolved calls remain.
    Completed,
}

/// Result of one round.
#[derive(Debug, Clone)]
pub struct RoundOutcome {
    pub round: usize,
    pub response: Response,
    /// Answers produced by registered handlers, queued for the next round.
    pub tool_outputs: Vec<ToolOutput>,
    /// Post-processing results of hosted calls.
    pub hosted_results: Vec<ToolOutput>,
    /// Client calls left for the caller.
    pub pending_calls: Vec<PendingCall>,
    pub next: NextStep,
}

impl RoundOutcome {
    pub fn is_completed(&self) -> bool {
        self.next == NextStep::Completed
    }
}
