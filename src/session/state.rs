//! Session lifecycle states.

use serde::{Deserialize, Serialize};
use strum::Display;

/// Fine-grained controller state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionState {
    Idle,
    RoundInFlight,
    /// Between rounds: the last response is being (or has been) evaluated.
    EvaluatingOutputs,
    Completed,
    Failed,
    Cancelled,
}

/// Coarse status reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    InRound,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn status(self) -> SessionStatus {
        match self {
            Self::Idle => SessionStatus::Idle,
            Self::RoundInFlight | Self::EvaluatingOutputs => SessionStatus::InRound,
            Self::Completed => SessionStatus::Completed,
            Self::Failed => SessionStatus::Failed,
            Self::Cancelled => SessionStatus::Cancelled,
        }
    }
}
