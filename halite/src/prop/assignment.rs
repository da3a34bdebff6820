//! Partial assignment, trail and backtracking.
use partial_ref::{partial, PartialRef};

use halite_formula::lit::{Lit, LitIdx, Var};

use crate::context::{AssignmentP, Context, ImplGraphP, IncrementalP, TrailP, VsidsP};
use crate::decision::make_available;

use super::Reason;

/// Current partial assignment.
///
/// The value table is indexed by literal code, storing each variable's value twice. This makes
/// literal evaluation branchless at the cost of writing two entries per assignment.
#[derive(Default)]
pub struct Assignment {
    /// Indexed by literal code; `values[l]` and `values[!l]` are kept consistent.
    values: Vec<Option<bool>>,
    /// Saved phase per variable.
    phase: Vec<bool>,
    /// Phase used for variables that were never assigned.
    default_phase: bool,
}

/// This compares two `Option<bool>` values as bytes. Workaround for bad code generation.
pub fn fast_option_eq(a: Option<bool>, b: Option<bool>) -> bool {
    unsafe { std::mem::transmute::<_, u8>(a) == std::mem::transmute::<_, u8>(b) }
}

impl Assignment {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.values.resize(count * 2, None);
        let default_phase = self.default_phase;
        self.phase.resize(count, default_phase);
    }

    /// Number of variables in the assignment.
    pub fn var_count(&self) -> usize {
        self.values.len() / 2
    }

    /// The value table, indexed by literal code.
    pub fn lit_values(&self) -> &[Option<bool>] {
        &self.values
    }

    /// Value assigned to a variable.
    pub fn var_value(&self, var: Var) -> Option<bool> {
        self.values[var.positive().code()]
    }

    /// Value assigned to a literal.
    pub fn lit_value(&self, lit: Lit) -> Option<bool> {
        self.values[lit.code()]
    }

    pub fn lit_is_true(&self, lit: Lit) -> bool {
        fast_option_eq(self.values[lit.code()], Some(true))
    }

    pub fn lit_is_false(&self, lit: Lit) -> bool {
        fast_option_eq(self.values[lit.code()], Some(false))
    }

    pub fn lit_is_unk(&self, lit: Lit) -> bool {
        fast_option_eq(self.values[lit.code()], None)
    }

    pub fn assign_lit(&mut self, lit: Lit) {
        self.values[lit.code()] = Some(true);
        self.values[(!lit).code()] = Some(false);
    }

    pub fn unassign_lit(&mut self, lit: Lit) {
        self.values[lit.code()] = None;
        self.values[(!lit).code()] = None;
    }

    /// Phase to use when deciding on the given variable.
    ///
    /// This is the value of the last assignment of the variable, or the default phase when the
    /// variable was never assigned.
    pub fn saved_phase(&self, var: Var) -> bool {
        self.phase[var.index()]
    }

    /// Store the phase of a variable that is about to be unassigned.
    pub fn save_phase(&mut self, lit: Lit) {
        self.phase[lit.index()] = lit.is_positive();
    }

    /// Change the phase used for never assigned variables.
    ///
    /// Only affects variables added after the change.
    pub fn set_default_phase(&mut self, default_phase: bool) {
        self.default_phase = default_phase;
    }

    /// Rewrite the assignment under a variable renumbering.
    ///
    /// The map must be a bijection on the declared literals that commutes with negation.
    pub fn rename(&mut self, map: impl Fn(Lit) -> Lit) {
        let count = self.var_count();
        let mut new_values = vec![None; count * 2];
        let mut new_phase = vec![self.default_phase; count];

        for index in 0..count {
            let old_lit = Lit::from_index(index, true);
            let new_lit = map(old_lit);
            new_values[new_lit.code()] = self.values[old_lit.code()];
            new_values[(!new_lit).code()] = self.values[(!old_lit).code()];
            new_phase[new_lit.index()] = self.phase[index] ^ new_lit.is_negative();
        }

        self.values = new_values;
        self.phase = new_phase;
    }
}

/// Decision and propagation history.
#[derive(Default)]
pub struct Trail {
    /// Stack of all propagated and all enqueued assignments.
    trail: Vec<Lit>,
    /// Next assignment in trail to propagate.
    queue_head_pos: usize,
    /// Decision levels as trail indices.
    decisions: Vec<LitIdx>,
}

impl Trail {
    /// Return the next assigned literal to propagate and remove it from the queue.
    pub fn pop_queue(&mut self) -> Option<Lit> {
        let head = self.trail.get(self.queue_head_pos).cloned();
        if head.is_some() {
            self.queue_head_pos += 1;
        }
        head
    }

    /// Re-enqueue all assigned literals.
    pub fn reset_queue(&mut self) {
        self.queue_head_pos = 0;
    }

    /// Assigned literals in assignment order.
    pub fn trail(&self) -> &[Lit] {
        &self.trail
    }

    /// Start a new decision level.
    ///
    /// Does not enqueue the decision itself.
    pub fn new_decision_level(&mut self) {
        self.decisions.push(self.trail.len() as LitIdx)
    }

    /// Current decision level.
    pub fn current_level(&self) -> usize {
        self.decisions.len()
    }

    /// The top level assignments, i.e. variables fixed by unit clauses.
    pub fn top_level_assignments(&self) -> &[Lit] {
        let end = self
            .decisions
            .first()
            .map(|&len| len as usize)
            .unwrap_or(self.trail.len());
        &self.trail[..end]
    }

    /// Whether all assignments are processed.
    pub fn fully_propagated(&self) -> bool {
        self.queue_head_pos == self.trail.len()
    }

    pub(crate) fn push_assignment(&mut self, lit: Lit) {
        self.trail.push(lit)
    }

    pub(crate) fn decisions(&self) -> &[LitIdx] {
        &self.decisions
    }

    pub(crate) fn rename_lits(&mut self, map: impl Fn(Lit) -> Lit) {
        for lit in self.trail.iter_mut() {
            *lit = map(*lit);
        }
    }
}

/// Enqueues the assignment of true to a literal.
///
/// This updates the assignment and trail, but does not perform any propagation. The literal has
/// to be unassigned when calling this.
pub fn enqueue_assignment(
    mut ctx: partial!(Context, mut AssignmentP, mut ImplGraphP, mut TrailP),
    lit: Lit,
    reason: Reason,
) {
    let assignment = ctx.part_mut(AssignmentP);
    debug_assert!(assignment.lit_value(lit) == None);

    assignment.assign_lit(lit);

    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    trail.push_assignment(lit);

    let node = &mut ctx.part_mut(ImplGraphP).nodes[lit.index()];
    node.reason = reason;
    node.level = trail.current_level() as LitIdx;
}

/// Undo all assignments in decision levels deeper than the given level.
///
/// The last value of every unassigned variable is saved as its phase.
pub fn backtrack(
    mut ctx: partial!(Context, mut AssignmentP, mut TrailP, mut VsidsP),
    level: usize,
) {
    let (assignment, mut ctx) = ctx.split_part_mut(AssignmentP);
    let (trail, mut ctx) = ctx.split_part_mut(TrailP);

    // A backjump below the assumptions can leave the recorded assumption level above the current
    // decision level; there is nothing to undo in that case.
    if level >= trail.decisions.len() {
        return;
    }

    let new_trail_len = trail.decisions[level] as usize;

    trail.queue_head_pos = new_trail_len;
    trail.decisions.truncate(level);

    let trail_end = &trail.trail[new_trail_len..];
    for &lit in trail_end {
        make_available(ctx.borrow(), lit.var());
        assignment.save_phase(lit);
        assignment.unassign_lit(lit);
    }
    trail.trail.truncate(new_trail_len);
}

/// Undo all decisions and assumptions.
pub fn full_restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut IncrementalP,
        mut TrailP,
        mut VsidsP,
    ),
) {
    ctx.part_mut(IncrementalP).full_restart();
    backtrack(ctx.borrow(), 0);
}

/// Undo all decisions, but keep assumptions.
pub fn restart(
    mut ctx: partial!(
        Context,
        mut AssignmentP,
        mut TrailP,
        mut VsidsP,
        IncrementalP
    ),
) {
    let level = ctx.part(IncrementalP).assumption_levels();
    backtrack(ctx.borrow(), level);
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::{lit, lits};

    use crate::context::set_var_count;

    #[test]
    fn backtrack_restores_previous_levels_and_saves_phases() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 5);

        for &lit in lits![1, -2].iter() {
            enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
        }

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(3), Reason::Decision);
        enqueue_assignment(ctx.borrow(), lit!(-4), Reason::Binary([lit!(-3)]));

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(5), Reason::Decision);

        assert_eq!(ctx.part(TrailP).current_level(), 2);
        assert_eq!(ctx.part(ImplGraphP).level(lit!(5).var()), 2);

        backtrack(ctx.borrow(), 1);

        let assignment = ctx.part(AssignmentP);
        assert_eq!(assignment.lit_value(lit!(5)), None);
        assert_eq!(assignment.lit_value(lit!(3)), Some(true));
        assert_eq!(assignment.lit_value(lit!(-4)), Some(true));
        assert_eq!(assignment.lit_value(lit!(4)), Some(false));
        assert!(assignment.saved_phase(lit!(5).var()));

        backtrack(ctx.borrow(), 0);

        let assignment = ctx.part(AssignmentP);
        assert_eq!(assignment.lit_value(lit!(3)), None);
        assert!(!assignment.saved_phase(lit!(4).var()));
        assert_eq!(assignment.lit_value(lit!(1)), Some(true));
        assert_eq!(ctx.part(TrailP).top_level_assignments(), &lits![1, -2][..]);
    }

    #[test]
    fn queue_is_fifo() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 3);

        for &lit in lits![1, 2, -3].iter() {
            enqueue_assignment(ctx.borrow(), lit, Reason::Decision);
        }

        let trail = ctx.part_mut(TrailP);
        assert_eq!(trail.pop_queue(), Some(lit!(1)));
        assert_eq!(trail.pop_queue(), Some(lit!(2)));
        assert_eq!(trail.pop_queue(), Some(lit!(-3)));
        assert_eq!(trail.pop_queue(), None);
        assert!(trail.fully_propagated());
    }
}
