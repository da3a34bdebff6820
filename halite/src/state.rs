//! Miscellaneous solver state.
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::errors::SolverError;

/// Satisfiability state.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SatState {
    Unknown,
    Sat,
    Unsat,
    UnsatUnderAssumptions,
}

impl Default for SatState {
    fn default() -> SatState {
        SatState::Unknown
    }
}

/// Search statistics.
#[derive(Copy, Clone, Default, Debug)]
pub struct SolverStats {
    pub conflicts: u64,
    pub decisions: u64,
    pub propagations: u64,
    pub restarts: u64,
    pub reductions: u64,
    pub consolidations: u64,
}

/// Miscellaneous solver state.
///
/// Anything larger or any larger group of related state variables should be moved into a separate
/// part of [`Context`](crate::context::Context).
#[derive(Default)]
pub struct SolverState {
    pub sat_state: SatState,
    /// Sticky error; a fatal error makes `solve` report `Unknown`.
    pub error: Option<SolverError>,
    /// Externally owned flag for cooperative cancellation.
    pub abort_flag: Option<Arc<AtomicBool>>,
    pub stats: SolverStats,
}

impl SolverState {
    /// Whether the external abort flag was raised.
    ///
    /// Only observed at the top of the search loop; propagation and analysis are never
    /// interrupted.
    pub fn abort_requested(&self) -> bool {
        self.abort_flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Relaxed))
            .unwrap_or(false)
    }
}
