//! Fit-level errors.

use crate::control::ControlError;
use crate::data::DataError;
use crate::fit::FitResult;

/// Errors surfaced by [`fit`](crate::fit()).
///
/// Configuration problems (`InvalidMethod`, `InvalidParams`, `Control`,
/// `BadFoldAssignment`) are reported before any data is processed.
/// `NoSplits` is the distinct degenerate outcome: the root could not be
/// split under the stopping rules, and the root-only result is attached for
/// inspection rather than returned as a silent success.
#[derive(Debug, thiserror::Error)]
pub enum FitError {
    /// Unknown method selector code.
    #[error("invalid value {0} for 'method'")]
    InvalidMethod(i32),

    /// Malformed data or family hyperparameters.
    #[error("invalid parameters: {0}")]
    InvalidParams(String),

    /// Control parameter validation failure.
    #[error(transparent)]
    Control(#[from] ControlError),

    /// Dataset validation failure.
    #[error(transparent)]
    Data(#[from] DataError),

    /// Supplied fold assignment is unusable.
    #[error("bad fold assignment: {0}")]
    BadFoldAssignment(String),

    /// The root node could not be split; the root-only fit is attached.
    #[error("no splits could be created")]
    NoSplits(Box<FitResult>),
}
