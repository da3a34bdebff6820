//! Conflict driven clause learning.
use partial_ref::{partial, PartialRef};

use crate::analyze::analyze_conflict;
use crate::clause::{bump_clause_activity, db, decay_clause_activities, ClauseHeader};
use crate::context::{parts::*, Context};
use crate::decision::make_decision;
use crate::errors::SolverError;
use crate::glue::compute_glue;
use crate::incremental::{enqueue_assumption, EnqueueAssumption};
use crate::prop::{backtrack, enqueue_assignment, propagate, Conflict, Reason};
use crate::state::SatState;
use crate::sync::notify_new_learnt_binary;

/// Find a conflict, learn a clause and backtrack.
pub fn conflict_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
        mut ArenaP,
        mut AssignmentP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut RngP,
        mut ScheduleP,
        mut SolverStateP,
        mut SyncP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchesP,
        ConfigP,
    ),
) -> Result<(), SolverError> {
    let conflict = find_conflict(ctx.borrow());

    let conflict = match conflict {
        Ok(()) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Sat;
            return Ok(());
        }
        Err(FoundConflict::Assumption) => {
            ctx.part_mut(SolverStateP).sat_state = SatState::UnsatUnderAssumptions;
            return Ok(());
        }
        Err(FoundConflict::Conflict(conflict)) => conflict,
    };

    ctx.part_mut(SolverStateP).stats.conflicts += 1;

    let backtrack_to = analyze_conflict(ctx.borrow(), conflict);

    let (analyze, mut ctx) = ctx.split_part(AnalyzeP);

    for &cref in analyze.involved() {
        bump_clause_activity(ctx.borrow(), cref);
    }

    decay_clause_activities(ctx.borrow());

    let clause = analyze.clause();

    // The glue is computed before backtracking, while the levels of all clause literals are
    // still in place.
    let glue = compute_glue(ctx.borrow(), clause);
    let trail_size = ctx.part(TrailP).trail().len();
    let (schedule, mut ctx) = ctx.split_part_mut(ScheduleP);
    schedule.note_conflict(glue, trail_size, ctx.part(ConfigP));

    backtrack(ctx.borrow(), backtrack_to);

    let reason = match *clause {
        [] => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
            return Ok(());
        }
        [_lit] => Reason::Decision,
        [lit_0, lit_1] => {
            ctx.part_mut(WatchesP).attach_binary([lit_0, lit_1], true);
            ctx.part_mut(ClauseDbP).note_binary_added();
            notify_new_learnt_binary(ctx.borrow(), [lit_0, lit_1]);
            Reason::Binary([lit_1])
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchesP)
                .attach_ternary([lit_0, lit_1, lit_2], true);
            ctx.part_mut(ClauseDbP).note_ternary_added();
            Reason::Ternary([lit_1, lit_2])
        }
        _ => {
            let mut header = ClauseHeader::new();
            header.set_redundant(true);
            header.set_glue(glue);
            header.set_introduced_at(ctx.part(SolverStateP).stats.conflicts);

            let cref = db::add_clause(ctx.borrow(), header, clause)?;
            Reason::Long(cref)
        }
    };

    enqueue_assignment(ctx.borrow(), clause[0], reason);

    Ok(())
}

/// Return type of [`find_conflict`].
///
/// Specifies whether a conflict was found during propagation or while enqueuing assumptions.
enum FoundConflict {
    Conflict(Conflict),
    Assumption,
}

impl From<Conflict> for FoundConflict {
    fn from(conflict: Conflict) -> FoundConflict {
        FoundConflict::Conflict(conflict)
    }
}

/// Find a conflict.
///
/// Returns `Err` if a conflict was found and `Ok` if a satisfying assignment was found instead.
fn find_conflict(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ImplGraphP,
        mut IncrementalP,
        mut RngP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchesP,
        ConfigP,
    ),
) -> Result<(), FoundConflict> {
    loop {
        propagate(ctx.borrow())?;

        match enqueue_assumption(ctx.borrow()) {
            EnqueueAssumption::Enqueued => continue,
            EnqueueAssumption::Conflict => return Err(FoundConflict::Assumption),
            EnqueueAssumption::Done => (),
        }

        if !make_decision(ctx.borrow()) {
            return Ok(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use proptest::prelude::*;

    use halite_formula::{cnf_formula, test::*, Lit};

    use crate::context::set_var_count;
    use crate::load::load_clause;

    fn solve_loaded(ctx: &mut Context) -> SatState {
        let mut ctx = ctx.into_partial_ref_mut();
        while ctx.part(SolverStateP).sat_state == SatState::Unknown {
            conflict_step(ctx.borrow()).unwrap();
        }
        ctx.part(SolverStateP).sat_state
    }

    #[test]
    fn level_0_unsat() {
        let mut ctx = Context::default();

        let formula = cnf_formula![
            1, 2, 3;
            -1;
            1, -2;
            2, -3;
        ];

        {
            let mut ctx = ctx.into_partial_ref_mut();
            set_var_count(ctx.borrow(), formula.var_count());
            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause).unwrap();
            }
        }

        assert_eq!(solve_loaded(&mut ctx), SatState::Unsat);
    }

    proptest! {
        #[test]
        fn sgen_unsat(formula in sgen_unsat_formula(1..7usize)) {
            let mut ctx = Context::default();

            {
                let mut ctx = ctx.into_partial_ref_mut();
                set_var_count(ctx.borrow(), formula.var_count());
                for clause in formula.iter() {
                    load_clause(ctx.borrow(), clause).unwrap();
                }
            }

            prop_assert_eq!(solve_loaded(&mut ctx), SatState::Unsat);
        }

        #[test]
        fn sat(formula in sat_formula(4..20usize, 10..100usize, 0.05..0.2, 0.9..1.0)) {
            let mut ctx = Context::default();

            {
                let mut ctx = ctx.into_partial_ref_mut();
                set_var_count(ctx.borrow(), formula.var_count());
                for clause in formula.iter() {
                    load_clause(ctx.borrow(), clause).unwrap();
                }
            }

            prop_assert_eq!(solve_loaded(&mut ctx), SatState::Sat);

            let mut ctx = ctx.into_partial_ref_mut();
            for clause in formula.iter() {
                prop_assert!(clause
                    .iter()
                    .any(|&lit| ctx.part(AssignmentP).lit_is_true(lit)));
            }
        }

        /// After propagation no clause of the formula may be unit or falsified.
        #[test]
        fn propagation_is_maximal(formula in sat_formula(4..15usize, 10..60usize, 0.1..0.3, 0.5..1.0)) {
            let mut ctx = Context::default();
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), formula.var_count());
            for clause in formula.iter() {
                load_clause(ctx.borrow(), clause).unwrap();
            }

            let propagated = propagate(ctx.borrow());
            prop_assert!(propagated.is_ok());

            for clause in formula.iter() {
                let satisfied = clause
                    .iter()
                    .any(|&lit| ctx.part(AssignmentP).lit_is_true(lit));
                let unassigned: Vec<Lit> = clause
                    .iter()
                    .cloned()
                    .filter(|&lit| ctx.part(AssignmentP).lit_is_unk(lit))
                    .collect();

                prop_assert!(
                    satisfied || unassigned.len() >= 2,
                    "clause {:?} is unit or falsified",
                    clause
                );
            }
        }
    }
}
