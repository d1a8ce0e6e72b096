//! Pipeline lifecycle state machine.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Where a pipeline run is in its lifecycle.
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    Planning,
    Optimizing,
    PredictingPue,
    Financing,
    Sensitivity,
    /// Sensitivity was not requested.
    Skipped,
    Completed,
    Failed,
}

/// Attempted move the state machine does not allow.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("illegal pipeline transition {from} -> {to}")]
pub struct TransitionError {
    pub from: PipelineState,
    pub to: PipelineState,
}

impl PipelineState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Whether `self -> next` is a legal transition.
    pub fn can_advance(self, next: PipelineState) -> bool {
        use PipelineState::*;
        match (self, next) {
            (s, Failed) => !s.is_terminal(),
            (Pending, Planning)
            | (Planning, Optimizing)
            | (Optimizing, PredictingPue)
            | (PredictingPue, Financing)
            | (Financing, Sensitivity | Skipped)
            | (Sensitivity | Skipped, Completed) => true,
            _ => false,
        }
    }

    /// Moves to `next`.
    ///
    /// # Errors
    ///
    /// Returns a `TransitionError` if the move is not allowed.
    pub fn advance(self, next: PipelineState) -> Result<PipelineState, TransitionError> {
        if self.can_advance(next) {
            Ok(next)
        } else {
            Err(TransitionError {
                from: self,
                to: next,
            })
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Planning => "planning",
            Self::Optimizing => "optimizing",
            Self::PredictingPue => "predicting_pue",
            Self::Financing => "financing",
            Self::Sensitivity => "sensitivity",
            Self::Skipped => "skipped",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}
