//! Loading clauses into the solver.
use partial_ref::{partial, PartialRef};

use halite_formula::Lit;

use crate::clause::{db, ClauseHeader};
use crate::context::{parts::*, var_count, Context};
use crate::errors::SolverError;
use crate::prop::{full_restart, Reason};
use crate::state::SatState;

/// Adds a clause to the current formula.
///
/// Removes duplicated literals, ignores tautological clauses (eg. x v -x v y), handles empty
/// clauses and dispatches among unit, binary, ternary and long clauses. Any search in progress is
/// fully restarted, so this always takes place at decision level 0.
///
/// Rejects clauses over variables that were never declared.
pub fn load_clause(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut SolverStateP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchesP,
    ),
    lits: &[Lit],
) -> Result<(), SolverError> {
    if lits
        .iter()
        .any(|&lit| lit.index() >= var_count(ctx.borrow()))
    {
        return Err(SolverError::InvalidInput);
    }

    match ctx.part(SolverStateP).sat_state {
        SatState::Unsat => return Ok(()),
        SatState::Sat | SatState::UnsatUnderAssumptions => {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unknown;
        }
        SatState::Unknown => (),
    }

    // Restart the search when the user adds new clauses.
    full_restart(ctx.borrow());

    let (tmp_data, mut ctx) = ctx.split_part_mut(TmpDataP);

    tmp_data.lits.clear();
    tmp_data.lits.extend_from_slice(lits);
    let lits = &mut tmp_data.lits;

    lits.sort_unstable();
    lits.dedup();

    // Detect tautological clauses
    let mut last = None;

    for &lit in lits.iter() {
        if last == Some(!lit) {
            return Ok(());
        }
        last = Some(lit);
    }

    // Remove false literals and drop satisfied clauses
    let simplified_lits = &mut tmp_data.lits_2;
    simplified_lits.clear();

    for &lit in lits.iter() {
        match ctx.part(AssignmentP).lit_value(lit) {
            Some(true) => return Ok(()),
            Some(false) => (),
            None => simplified_lits.push(lit),
        }
    }

    match simplified_lits[..] {
        [] => ctx.part_mut(SolverStateP).sat_state = SatState::Unsat,
        [lit] => crate::prop::enqueue_assignment(ctx.borrow(), lit, Reason::Decision),
        [lit_0, lit_1] => {
            ctx.part_mut(WatchesP).attach_binary([lit_0, lit_1], false);
            ctx.part_mut(ClauseDbP).note_binary_added();
        }
        [lit_0, lit_1, lit_2] => {
            ctx.part_mut(WatchesP)
                .attach_ternary([lit_0, lit_1, lit_2], false);
            ctx.part_mut(ClauseDbP).note_ternary_added();
        }
        _ => {
            db::add_clause(ctx.borrow(), ClauseHeader::new(), simplified_lits)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::lits;

    use crate::context::set_var_count;

    #[test]
    fn unsat_on_empty_clause() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &[]).unwrap();

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn undeclared_variable_is_rejected() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 2);

        assert_eq!(
            load_clause(ctx.borrow(), &lits![1, 5]),
            Err(SolverError::InvalidInput)
        );
        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn unit_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1]).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        load_clause(ctx.borrow(), &lits![3, -3]).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 1);

        load_clause(ctx.borrow(), &lits![-2]).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        load_clause(ctx.borrow(), &lits![1, 1]).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);

        load_clause(ctx.borrow(), &lits![2]).unwrap();
        assert_eq!(ctx.part(TrailP).trail().len(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unsat);
    }

    #[test]
    fn binary_and_ternary_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_binary(), 1);

        load_clause(ctx.borrow(), &lits![-1, 3, 3]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_binary(), 2);

        load_clause(ctx.borrow(), &lits![4, -4]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_binary(), 2);

        load_clause(ctx.borrow(), &lits![4, 5, 6]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_ternary(), 1);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }

    #[test]
    fn long_clauses() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 10);

        load_clause(ctx.borrow(), &lits![1, 2, 3, 7]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_original(), 1);

        load_clause(ctx.borrow(), &lits![-2, 3, 3, 4, 5]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_original(), 2);

        load_clause(ctx.borrow(), &lits![4, -5, 5, 2]).unwrap();
        assert_eq!(ctx.part(ClauseDbP).count_original(), 2);

        assert_eq!(ctx.part(SolverStateP).sat_state, SatState::Unknown);
    }
}
