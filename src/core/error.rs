use thiserror::Error;

use super::types::OutcomeKind;

/// Rejected input, raised before any state is touched.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("{field} must be a finite number (got {value})")]
    NonFinite { field: &'static str, value: f64 },
    #[error("{field} must be > 0 (got {value})")]
    NotPositive { field: &'static str, value: f64 },
    #[error("{field} must be >= 0 (got {value})")]
    Negative { field: &'static str, value: f64 },
    #[error("time horizon must be at least one year")]
    ZeroHorizon,
    #[error("inflation choice {0:?} must be \"random\" or a percentage")]
    InflationChoice(String),
}

#[derive(Debug, Error, PartialEq)]
pub enum GameError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("game has already ended ({0}); start a new game")]
    InvalidStateTransition(OutcomeKind),
}
