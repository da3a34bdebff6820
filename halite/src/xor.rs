//! Parity constraints.
//!
//! A parity (xor) constraint over k variables has no compact CNF representation: the direct
//! encoding needs 2^(k-1) clauses. Long constraints are therefore cut into short chunks that are
//! chained together through fresh auxiliary variables, so each chunk stays below the configured
//! cut limit.
use partial_ref::{partial, PartialRef};

use rustc_hash::FxHashSet;

use halite_formula::{Lit, Var};

use crate::context::{parts::*, set_var_count, var_count, Context};
use crate::errors::SolverError;
use crate::load::load_clause;
use crate::state::SatState;

/// Adds a parity constraint over the given literals to the current formula.
///
/// The constraint requires the xor over all literals to equal `rhs`. Duplicate variables cancel
/// and negations fold into `rhs`, so the constraint is first normalized to a set of distinct
/// variables.
pub fn add_xor_clause(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
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
        ConfigP,
    ),
    lits: &[Lit],
    rhs: bool,
) -> Result<(), SolverError> {
    if lits
        .iter()
        .any(|&lit| lit.index() >= var_count(ctx.borrow()))
    {
        return Err(SolverError::InvalidInput);
    }

    let mut rhs = rhs;
    let mut vars: FxHashSet<Var> = FxHashSet::default();

    for &lit in lits.iter() {
        rhs ^= lit.is_negative();
        if !vars.insert(lit.var()) {
            vars.remove(&lit.var());
        }
    }

    let mut pending: Vec<Lit> = vars.into_iter().map(|var| var.positive()).collect();
    pending.sort_unstable();

    if pending.is_empty() {
        if rhs {
            ctx.part_mut(SolverStateP).sat_state = SatState::Unsat;
        }
        return Ok(());
    }

    let cut = ctx.part(ConfigP).xor_cut_limit.max(3);

    while pending.len() > cut {
        let rest = pending.split_off(cut - 1);

        let aux = add_aux_var(ctx.borrow());

        let mut chunk = pending;
        chunk.push(aux.positive());

        // The auxiliary variable is defined as the parity of the chunk.
        encode_xor_cnf(ctx.borrow(), &chunk, false)?;

        pending = rest;
        pending.insert(0, aux.positive());
    }

    encode_xor_cnf(ctx.borrow(), &pending, rhs)
}

/// Add a fresh variable for use in a constraint encoding.
fn add_aux_var(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VsidsP,
        mut WatchesP,
    ),
) -> Var {
    let count = var_count(ctx.borrow());
    set_var_count(ctx.borrow(), count + 1);
    Var::from_index(count)
}

/// Emit the direct CNF encoding of a short xor constraint.
///
/// One clause is generated per assignment violating the constraint, i.e. 2^(k-1) clauses.
fn encode_xor_cnf(
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
    rhs: bool,
) -> Result<(), SolverError> {
    assert!(lits.len() < 24, "xor chunk too large for direct encoding");

    let mut clause = Vec::with_capacity(lits.len());

    for forbidden in 0u32..(1 << lits.len()) {
        if (forbidden.count_ones() & 1 == 1) == rhs {
            continue;
        }

        clause.clear();
        for (index, &lit) in lits.iter().enumerate() {
            clause.push(lit ^ (forbidden & (1 << index) != 0));
        }

        load_clause(ctx.borrow(), &clause)?;
    }

    Ok(())
}
