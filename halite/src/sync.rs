//! Boundary for external clause sharing.
//!
//! Multi-solver setups exchange short learnt clauses. The solver itself only provides the
//! boundary: a callback fired for every learnt binary clause and entry points to inject clauses
//! discovered elsewhere. The sharing policy lives outside the core.
use partial_ref::{partial, PartialRef};

use halite_formula::Lit;

use crate::context::{
    AssignmentP, ClauseDbP, Context, ImplGraphP, SolverStateP, SyncP, TrailP, WatchesP,
};
use crate::prop::{enqueue_assignment, Reason};
use crate::state::SatState;

/// Callback registration for external clause sharing.
#[derive(Default)]
pub struct ClauseSync {
    on_new_learnt_binary: Option<Box<dyn FnMut(Lit, Lit)>>,
}

impl ClauseSync {
    /// Register a callback fired for every learnt binary clause.
    pub fn set_new_learnt_binary_callback(&mut self, callback: impl FnMut(Lit, Lit) + 'static) {
        self.on_new_learnt_binary = Some(Box::new(callback));
    }
}

/// Report a learnt binary clause to the registered callback.
pub fn notify_new_learnt_binary(mut ctx: partial!(Context, mut SyncP), lits: [Lit; 2]) {
    if let Some(callback) = &mut ctx.part_mut(SyncP).on_new_learnt_binary {
        callback(lits[0], lits[1]);
    }
}

/// Add a unit clause discovered by another solver.
///
/// Must only be called at decision level 0, i.e. between solve iterations.
pub fn inject_learnt_unit(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
    ),
    lit: Lit,
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    match ctx.part(AssignmentP).lit_value(lit) {
        Some(true) => (),
        Some(false) => ctx.part_mut(SolverStateP).sat_state = SatState::Unsat,
        None => enqueue_assignment(ctx.borrow(), lit, Reason::Decision),
    }
}

/// Add a binary clause discovered by another solver.
///
/// Must only be called at decision level 0, i.e. between solve iterations. The clause is attached
/// as redundant and takes part in propagation from the next solve iteration on.
pub fn inject_learnt_binary(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
        mut WatchesP,
    ),
    lits: [Lit; 2],
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    let assignment = ctx.part(AssignmentP);
    if assignment.lit_is_true(lits[0]) || assignment.lit_is_true(lits[1]) {
        return;
    }

    if assignment.lit_is_false(lits[0]) {
        inject_learnt_unit(ctx.borrow(), lits[1]);
        return;
    }
    if assignment.lit_is_false(lits[1]) {
        inject_learnt_unit(ctx.borrow(), lits[0]);
        return;
    }

    ctx.part_mut(WatchesP).attach_binary(lits, true);
    ctx.part_mut(ClauseDbP).note_binary_added();
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::cell::RefCell;
    use std::rc::Rc;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::{lit, lits};

    use crate::context::set_var_count;

    #[test]
    fn learnt_binary_callback_is_invoked() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 3);

        let shared = Rc::new(RefCell::new(vec![]));
        let sink = shared.clone();
        ctx.part_mut(SyncP)
            .set_new_learnt_binary_callback(move |a, b| sink.borrow_mut().push((a, b)));

        notify_new_learnt_binary(ctx.borrow(), lits![1, -2]);

        assert_eq!(shared.borrow()[..], [(lit!(1), lit!(-2))]);
    }

    #[test]
    fn injected_clauses_respect_existing_assignment() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 4);

        inject_learnt_unit(ctx.borrow(), lit!(1));
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(1)));

        // A binary with one falsified literal degenerates to a unit.
        inject_learnt_binary(ctx.borrow(), lits![-1, 2]);
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(2)));

        // A binary over unassigned variables is attached.
        inject_learnt_binary(ctx.borrow(), lits![3, 4]);
        assert_eq!(ctx.part(ClauseDbP).count_binary(), 1);

        // A contradicting unit makes the formula unsat.
        inject_learnt_unit(ctx.borrow(), lit!(-1));
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }
}
