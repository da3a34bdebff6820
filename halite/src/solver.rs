//! Boolean satisfiability solver.
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use partial_ref::{IntoPartialRefMut, PartialRef};

use halite_formula::{CnfFormula, Lit, Var};

use crate::clause::ClauseRef;
use crate::config::SolverConfig;
use crate::context::{config_changed, parts::*, set_var_count, var_count, Context};
use crate::errors::SolverError;
use crate::incremental::set_assumptions;
use crate::inprocess::{self, DetachedClauses};
use crate::load::load_clause;
use crate::schedule::schedule_step;
use crate::state::{SatState, SolverStats};
use crate::sync;
use crate::xor::add_xor_clause;

/// Result of a solve call.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum SolverResult {
    Sat,
    Unsat,
    /// The search was aborted or a fatal error occurred, see [`Solver::error`].
    Unknown,
}

/// A boolean satisfiability solver.
#[derive(Default)]
pub struct Solver {
    ctx: Box<Context>,
}

impl Solver {
    /// Create a new solver.
    pub fn new() -> Solver {
        Solver::default()
    }

    /// Create a new solver with the given configuration.
    pub fn with_config(config: SolverConfig) -> Solver {
        let mut solver = Solver::default();
        solver.set_config(config);
        solver
    }

    /// Replace the solver configuration.
    pub fn set_config(&mut self, config: SolverConfig) {
        self.ctx.config = config;
        let mut ctx = self.ctx.into_partial_ref_mut();
        config_changed(ctx.borrow());
    }

    /// Add a new variable and return it.
    pub fn new_var(&mut self) -> Var {
        let mut ctx = self.ctx.into_partial_ref_mut();
        let count = var_count(ctx.borrow());
        set_var_count(ctx.borrow(), count + 1);
        Var::from_index(count)
    }

    /// Number of declared variables.
    pub fn var_count(&self) -> usize {
        self.ctx.assignment.var_count()
    }

    /// Add a clause over already declared variables to the formula.
    pub fn add_clause(&mut self, lits: &[Lit]) -> Result<(), SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        load_clause(ctx.borrow(), lits)
    }

    /// Add a formula, declaring its variables as needed.
    pub fn add_formula(&mut self, formula: &CnfFormula) -> Result<(), SolverError> {
        {
            let mut ctx = self.ctx.into_partial_ref_mut();
            if formula.var_count() > var_count(ctx.borrow()) {
                set_var_count(ctx.borrow(), formula.var_count());
            }
        }
        for clause in formula.iter() {
            self.add_clause(clause)?;
        }
        Ok(())
    }

    /// Add a parity constraint over already declared variables to the formula.
    ///
    /// Requires the xor of the given literals to equal `rhs`. Auxiliary variables are declared
    /// when the constraint is longer than the configured cut limit.
    pub fn add_xor_clause(&mut self, lits: &[Lit], rhs: bool) -> Result<(), SolverError> {
        let mut ctx = self.ctx.into_partial_ref_mut();
        add_xor_clause(ctx.borrow(), lits, rhs)
    }

    /// Check the satisfiability of the formula under the given assumptions.
    ///
    /// An empty slice solves the unconditional formula. `Unknown` is only returned after an abort
    /// or a fatal error; the solver state survives an abort, so a later call continues the
    /// search.
    pub fn solve(&mut self, assumptions: &[Lit]) -> SolverResult {
        let mut ctx = self.ctx.into_partial_ref_mut();

        if ctx.part(SolverStateP).error.is_some() {
            return SolverResult::Unknown;
        }

        set_assumptions(ctx.borrow(), assumptions);

        loop {
            if ctx.part(SolverStateP).abort_requested() {
                return SolverResult::Unknown;
            }

            match schedule_step(ctx.borrow()) {
                Ok(true) => continue,
                Ok(false) => break,
                Err(error) => {
                    ctx.part_mut(SolverStateP).error = Some(error);
                    return SolverResult::Unknown;
                }
            }
        }

        match ctx.part(SolverStateP).sat_state {
            SatState::Unknown => SolverResult::Unknown,
            SatState::Sat => SolverResult::Sat,
            SatState::Unsat | SatState::UnsatUnderAssumptions => SolverResult::Unsat,
        }
    }

    /// The satisfying assignment of the last `solve` call.
    ///
    /// Indexed by variable index. Only valid directly after a `solve` call returned `Sat`.
    pub fn model(&self) -> Option<Vec<bool>> {
        if self.ctx.solver_state.sat_state != SatState::Sat {
            return None;
        }

        let assignment = &self.ctx.assignment;
        Some(
            (0..assignment.var_count())
                .map(|index| {
                    assignment
                        .var_value(Var::from_index(index))
                        .unwrap_or(false)
                })
                .collect(),
        )
    }

    /// Subset of the assumptions responsible for the last `Unsat` result.
    ///
    /// Only valid directly after a `solve` call with assumptions returned `Unsat`.
    pub fn failed_assumptions(&self) -> &[Lit] {
        self.ctx.incremental.failed_core()
    }

    /// Install an externally owned flag for cooperative cancellation.
    ///
    /// The flag is checked between conflicts; raising it makes `solve` return `Unknown` without
    /// losing any solver state.
    pub fn set_abort_flag(&mut self, flag: Arc<AtomicBool>) {
        self.ctx.solver_state.abort_flag = Some(flag);
    }

    /// The sticky error that made `solve` report `Unknown`, if any.
    pub fn error(&self) -> Option<SolverError> {
        self.ctx.solver_state.error
    }

    /// Search statistics.
    pub fn stats(&self) -> SolverStats {
        self.ctx.solver_state.stats
    }

    /// Add a unit clause discovered by another solver.
    ///
    /// Must only be called between solve iterations.
    pub fn inject_learnt_unit(&mut self, lit: Lit) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        sync::inject_learnt_unit(ctx.borrow(), lit);
    }

    /// Add a binary clause discovered by another solver.
    ///
    /// Must only be called between solve iterations.
    pub fn inject_learnt_binary(&mut self, lit_0: Lit, lit_1: Lit) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        sync::inject_learnt_binary(ctx.borrow(), [lit_0, lit_1]);
    }

    /// Register a callback fired for every learnt binary clause, e.g. to share it with other
    /// solvers.
    pub fn on_new_learnt_binary(&mut self, callback: impl FnMut(Lit, Lit) + 'static) {
        self.ctx
            .sync
            .set_new_learnt_binary_callback(callback);
    }

    /// Flush all watch lists for an inprocessing pass.
    ///
    /// The returned clauses must be passed back to [`reattach_all`](Solver::reattach_all) before
    /// the next `solve` call.
    pub fn detach_all(&mut self) -> DetachedClauses {
        let mut ctx = self.ctx.into_partial_ref_mut();
        inprocess::detach_all(ctx.borrow())
    }

    /// Rebuild all watch lists after an inprocessing pass, optionally applying a variable
    /// renumbering to the whole solver state.
    pub fn reattach_all(
        &mut self,
        detached: DetachedClauses,
        renumber: Option<&dyn Fn(Lit) -> Lit>,
    ) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        inprocess::reattach_all(ctx.borrow(), detached, renumber);
    }

    /// Ordered iteration over all stored long clauses with mutable access to their literals.
    ///
    /// After mutating literals the caller must detach and reattach to rebuild the watch lists.
    pub fn arena_iter_mut(&mut self, f: impl FnMut(ClauseRef, &mut [Lit])) {
        let mut ctx = self.ctx.into_partial_ref_mut();
        inprocess::arena_iter_mut(ctx.borrow(), f);
    }

    /// Visit every original clause of the current formula.
    pub fn for_each_original(&self, f: impl FnMut(&[Lit])) {
        inprocess::for_each_original(&self.ctx, f);
    }

    /// Visit every redundant (learnt) clause currently retained.
    pub fn for_each_redundant(&self, f: impl FnMut(&[Lit])) {
        inprocess::for_each_redundant(&self.ctx, f);
    }

    /// The literals fixed at the top level, in propagation order.
    pub fn root_level_units(&self) -> &[Lit] {
        inprocess::root_level_units(&self.ctx)
    }

    /// Remove an attached binary clause, e.g. when an inprocessing pass subsumed it.
    ///
    /// The clause must currently be attached.
    pub fn remove_binary(&mut self, lits: [Lit; 2]) {
        self.ctx.watches.detach_binary(lits);
        self.ctx.clause_db.note_binary_removed();
    }

    /// Remove an attached ternary clause, e.g. when an inprocessing pass subsumed it.
    ///
    /// The clause must currently be attached.
    pub fn remove_ternary(&mut self, lits: [Lit; 3]) {
        self.ctx.watches.detach_ternary(lits);
        self.ctx.clause_db.note_ternary_removed();
    }

    /// Drop the watch lists of all literals matched by the predicate.
    ///
    /// Used by inprocessing passes after eliminating variables; the caller is responsible for the
    /// clauses those lists referred to.
    pub fn free_unused_watches(&mut self, pred: impl Fn(Lit) -> bool) {
        self.ctx.watches.free_unused(pred);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::Ordering;

    use proptest::prelude::*;

    use halite_formula::{lits, test::*};

    #[test]
    fn tiny_sat() {
        let mut solver = Solver::new();
        for _ in 0..3 {
            solver.new_var();
        }

        solver.add_clause(&lits![1, 2]).unwrap();
        solver.add_clause(&lits![-1, 3]).unwrap();
        solver.add_clause(&lits![-2, -3]).unwrap();

        assert_eq!(solver.solve(&[]), SolverResult::Sat);

        let model = solver.model().unwrap();
        assert!(model[0] || model[1]);
        assert!(!model[0] || model[2]);
        assert!(!model[1] || !model[2]);
    }

    #[test]
    fn tiny_unsat() {
        let mut solver = Solver::new();
        for _ in 0..2 {
            solver.new_var();
        }

        solver.add_clause(&lits![1]).unwrap();
        solver.add_clause(&lits![2]).unwrap();
        solver.add_clause(&lits![-1, -2]).unwrap();

        assert_eq!(solver.solve(&[]), SolverResult::Unsat);
        assert_eq!(solver.model(), None);
    }

    #[test]
    fn propagation_chain_needs_no_decisions() {
        let mut solver = Solver::new();
        for _ in 0..5 {
            solver.new_var();
        }

        solver.add_clause(&lits![1]).unwrap();
        solver.add_clause(&lits![-1, 2]).unwrap();
        solver.add_clause(&lits![-2, 3]).unwrap();
        solver.add_clause(&lits![-3, 4]).unwrap();
        solver.add_clause(&lits![-4, 5]).unwrap();

        assert_eq!(solver.solve(&[]), SolverResult::Sat);
        assert_eq!(solver.model().unwrap(), vec![true; 5]);

        // The whole chain is implied at the top level.
        assert_eq!(solver.root_level_units().len(), 5);
        assert_eq!(solver.stats().decisions, 0);
    }

    #[test]
    fn assumption_unsat_with_failed_core() {
        let mut solver = Solver::new();
        for _ in 0..2 {
            solver.new_var();
        }

        solver.add_clause(&lits![1, 2]).unwrap();

        assert_eq!(solver.solve(&lits![-1, -2]), SolverResult::Unsat);

        let mut failed = solver.failed_assumptions().to_vec();
        failed.sort();
        let mut expected = lits![-1, -2];
        expected.sort();
        assert_eq!(failed, expected);

        // Without assumptions the formula is satisfiable.
        assert_eq!(solver.solve(&[]), SolverResult::Sat);
    }

    #[test]
    fn xor_clause_models() {
        for assignment in 0..8u32 {
            let mut solver = Solver::new();
            for _ in 0..3 {
                solver.new_var();
            }

            solver.add_xor_clause(&lits![1, 2, 3], true).unwrap();

            let assumptions: Vec<Lit> = (0..3)
                .map(|index| Lit::from_index(index, assignment & (1 << index) != 0))
                .collect();

            let expected = if assignment.count_ones() & 1 == 1 {
                SolverResult::Sat
            } else {
                SolverResult::Unsat
            };

            assert_eq!(solver.solve(&assumptions), expected, "assignment {:b}", assignment);
        }
    }

    #[test]
    fn abort_flag_preserves_state() {
        let mut solver = Solver::new();
        for _ in 0..3 {
            solver.new_var();
        }
        solver.add_clause(&lits![1, 2, 3]).unwrap();

        let abort = Arc::new(AtomicBool::new(true));
        solver.set_abort_flag(abort.clone());

        assert_eq!(solver.solve(&[]), SolverResult::Unknown);
        assert_eq!(solver.error(), None);

        abort.store(false, Ordering::Relaxed);
        assert_eq!(solver.solve(&[]), SolverResult::Sat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut solver = Solver::new();
            solver.add_formula(&formula).unwrap();
            prop_assert_eq!(solver.solve(&[]), SolverResult::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut solver = Solver::new();
            solver.add_formula(&formula).unwrap();
            prop_assert_eq!(solver.solve(&[]), SolverResult::Sat);

            let model = solver.model().unwrap();
            for clause in formula.iter() {
                let clause_satisfied = clause
                    .iter()
                    .any(|lit| model[lit.index()] == lit.is_positive());
                prop_assert!(clause_satisfied);
            }
        }

        #[test]
        fn pigeon_hole_unsat_assumption_core(
            (enable_row, _holes, formula) in conditional_pigeon_hole(1..5usize, 0..3usize),
        ) {
            let mut solver = Solver::new();
            solver.add_formula(&formula).unwrap();

            // Without assumptions all pigeons can be disabled.
            prop_assert_eq!(solver.solve(&[]), SolverResult::Sat);

            // Enabling more pigeons than holes is unsat.
            prop_assert_eq!(solver.solve(&enable_row), SolverResult::Unsat);

            let failed = solver.failed_assumptions().to_vec();
            prop_assert!(!failed.is_empty());
            for lit in failed.iter() {
                prop_assert!(enable_row.contains(lit));
            }

            // The failed core is itself unsat under the formula.
            let mut core_solver = Solver::new();
            core_solver.add_formula(&formula).unwrap();
            prop_assert_eq!(core_solver.solve(&failed), SolverResult::Unsat);
        }
    }
}
