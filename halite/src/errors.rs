//! Solver errors.
use thiserror::Error;

/// Errors surfaced through the public API.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Error)]
pub enum SolverError {
    /// The clause arena ran out of encodable segments.
    ///
    /// This is fatal; the solver cannot continue and `solve` reports `Unknown`.
    #[error("clause storage exhausted the segment encoding limit")]
    ArenaExhausted,
    /// A clause used a variable that was never declared via `new_var`.
    #[error("clause uses a variable that was never declared")]
    InvalidInput,
}

impl SolverError {
    /// Whether the solver is unable to continue after this error.
    pub fn is_fatal(&self) -> bool {
        match self {
            SolverError::ArenaExhausted => true,
            SolverError::InvalidInput => false,
        }
    }
}
