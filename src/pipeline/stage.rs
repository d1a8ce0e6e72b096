//! Per-stage outcomes and error records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::StageError;

/// The five computation stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planner,
    Optimizer,
    Pue,
    Financial,
    Sensitivity,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planner => "planner",
            Self::Optimizer => "optimizer",
            Self::Pue => "pue",
            Self::Financial => "financial",
            Self::Sensitivity => "sensitivity",
        })
    }
}

/// Result of one stage, tagged by `status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StageOutcome<T> {
    Success {
        payload: T,
        elapsed_ms: f64,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        caveats: Vec<String>,
    },
    Failed {
        error: String,
        recoverable: bool,
        elapsed_ms: f64,
    },
    Skipped {
        reason: String,
    },
}

impl<T> StageOutcome<T> {
    pub fn success(payload: T, elapsed_ms: f64, caveats: Vec<String>) -> Self {
        Self::Success {
            payload,
            elapsed_ms,
            caveats,
        }
    }

    pub fn failed(error: &StageError, elapsed_ms: f64) -> Self {
        Self::Failed {
            error: error.to_string(),
            recoverable: error.is_recoverable(),
            elapsed_ms,
        }
    }

    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    /// The payload of a successful stage.
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Short status word for reports.
    pub fn status(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::Failed { .. } => "failed",
            Self::Skipped { .. } => "skipped",
        }
    }
}

/// One entry in the result's error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub stage: Stage,
    pub message: String,
    pub recoverable: bool,
}

impl ErrorRecord {
    pub fn new(stage: Stage, error: &StageError) -> Self {
        Self {
            stage,
            message: error.to_string(),
            recoverable: error.is_recoverable(),
        }
    }
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.recoverable { "recoverable" } else { "fatal" };
        write!(f, "[{}] {kind}: {}", self.stage, self.message)
    }
}
