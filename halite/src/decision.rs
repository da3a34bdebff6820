//! Decision heuristics.
use partial_ref::{partial, PartialRef};

use rand::{rngs::SmallRng, Rng, SeedableRng};

use halite_formula::{Lit, Var};

use crate::context::{
    AssignmentP, ConfigP, Context, ImplGraphP, RngP, SolverStateP, TrailP, VsidsP,
};
use crate::prop::{enqueue_assignment, Reason};

pub mod vsids;

/// Pseudo random number generator used for random decisions.
///
/// Seeded with a fixed constant so runs are reproducible.
pub struct SolverRng {
    pub rng: SmallRng,
}

impl Default for SolverRng {
    fn default() -> SolverRng {
        SolverRng {
            rng: SmallRng::seed_from_u64(0x0123_4567_89ab_cdef),
        }
    }
}

/// Make a decision and enqueue it.
///
/// The decided variable is the unassigned variable with the highest activity, or occasionally a
/// uniformly random unassigned variable. The decided polarity is the saved phase of the variable.
///
/// Returns `false` if no decision was made because all variables are assigned.
pub fn make_decision(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut ImplGraphP,
        mut RngP,
        mut SolverStateP,
        mut TrailP,
        mut VsidsP,
        ConfigP,
    ),
) -> bool {
    let var = match pick_branching_variable(ctx.borrow()) {
        Some(var) => var,
        None => return false,
    };

    let polarity = ctx.part(AssignmentP).saved_phase(var);
    let decision = Lit::from_var(var, polarity);

    ctx.part_mut(TrailP).new_decision_level();
    enqueue_assignment(ctx.borrow(), decision, Reason::Decision);

    ctx.part_mut(SolverStateP).stats.decisions += 1;

    true
}

/// Select the next variable to branch on.
fn pick_branching_variable(
    mut ctx: partial!(
        Context,
        mut RngP,
        mut VsidsP,
        AssignmentP,
        ConfigP,
    ),
) -> Option<Var> {
    let random_var_freq = ctx.part(ConfigP).random_var_freq;

    if random_var_freq > 0.0 {
        let var_count = ctx.part(AssignmentP).var_count();
        let rng = &mut ctx.part_mut(RngP).rng;
        if var_count > 0 && rng.gen_bool(random_var_freq) {
            let var = Var::from_index(rng.gen_range(0, var_count));
            if ctx.part(AssignmentP).var_value(var).is_none() {
                // The variable stays in the activity heap; it is skipped when it comes up while
                // still assigned.
                return Some(var);
            }
        }
    }

    // Assigned variables stay in the heap and are skipped here.
    while let Some(var) = ctx.part_mut(VsidsP).next() {
        if ctx.part(AssignmentP).var_value(var).is_none() {
            return Some(var);
        }
    }

    None
}

/// Make a variable available for decisions.
pub fn make_available(mut ctx: partial!(Context, mut VsidsP), var: Var) {
    ctx.part_mut(VsidsP).make_available(var);
}
