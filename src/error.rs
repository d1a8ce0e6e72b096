//! Error types shared across the pipeline stages.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::pipeline::TransitionError;

/// A single field-level validation failure.
///
/// Used both for request validation and for configuration validation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationError {
    /// Dotted field path (e.g., `"constraints.budget"`).
    pub field: String,
    /// Human-readable constraint description.
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Errors raised before any pipeline stage runs.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("invalid request ({} problem(s)): {}", .0.len(), join(.0))]
    Invalid(Vec<ValidationError>),
    #[error("malformed request JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read request \"{path}\": {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unknown preset \"{name}\", available: {available}")]
    UnknownPreset { name: String, available: String },
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failures of the external weather source.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("request timed out")]
    Timeout,
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("solar and wind channels are absent or uniformly zero")]
    EmptyChannels,
    #[error("no external source configured")]
    Offline,
}

impl From<reqwest::Error> for ResourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if let Some(status) = err.status() {
            Self::Status(status.as_u16())
        } else if err.is_decode() {
            Self::Parse(err.to_string())
        } else {
            Self::Connection(err.to_string())
        }
    }
}

/// Cache backend failures. Always swallowed by callers.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("cache backend unavailable: {0}")]
    Unavailable(String),
    #[error("cached value could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures raised inside a pipeline stage.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StageError {
    #[error("malformed intermediate data: {0}")]
    MalformedData(String),
    #[error("numeric domain violation: {what} = {value}")]
    NumericDomain { what: &'static str, value: f64 },
    #[error("VPPA analysis failed: {0}")]
    Vppa(String),
    #[error("no Monte Carlo trial produced a finite outcome")]
    NoFiniteTrials,
    #[error("upstream data degraded: {0}")]
    Degraded(String),
    #[error("optimization infeasible: {0}")]
    Infeasible(String),
}

impl StageError {
    /// Whether the pipeline may continue past this error.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::MalformedData(_) | Self::NumericDomain { .. } => false,
            Self::Vppa(_) | Self::NoFiniteTrials | Self::Degraded(_) | Self::Infeasible(_) => true,
        }
    }
}

/// Returns `value` if finite, otherwise a [`StageError::NumericDomain`].
pub(crate) fn ensure_finite(what: &'static str, value: f64) -> Result<f64, StageError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(StageError::NumericDomain { what, value })
    }
}

/// Failures that stop a pipeline run from producing a result.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error(transparent)]
    Transition(#[from] TransitionError),
}

/// CSV/JSON export failures.
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_and_malformed_errors_are_fatal() {
        assert!(!StageError::MalformedData("x".into()).is_recoverable());
        assert!(
            !StageError::NumericDomain {
                what: "npv",
                value: f64::NAN
            }
            .is_recoverable()
        );
        assert!(StageError::Vppa("x".into()).is_recoverable());
        assert!(StageError::NoFiniteTrials.is_recoverable());
    }

    #[test]
    fn ensure_finite_rejects_infinity() {
        assert_eq!(ensure_finite("x", 2.0), Ok(2.0));
        assert!(matches!(
            ensure_finite("savings", f64::INFINITY),
            Err(StageError::NumericDomain {
                what: "savings",
                ..
            })
        ));
    }

    #[test]
    fn invalid_request_lists_every_field() {
        let err = RequestError::Invalid(vec![
            ValidationError::new("constraints.budget", "must be > 0"),
            ValidationError::new("coordinates.latitude", "must be within [-90, 90]"),
        ]);
        let msg = err.to_string();
        assert!(msg.contains("2 problem(s)"));
        assert!(msg.contains("constraints.budget: must be > 0"));
        assert!(msg.contains("coordinates.latitude"));
    }
}
