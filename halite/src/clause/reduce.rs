//! Clause database reduction.
use std::cmp::Reverse;

use ordered_float::OrderedFloat;

use partial_ref::{partial, PartialRef};

use crate::context::{
    ArenaP, AssignmentP, ClauseDbP, ConfigP, Context, ImplGraphP, SolverStateP, WatchesP,
};

use super::db::{is_locked, try_delete_clause};

/// Delete half of the deletable redundant clauses.
///
/// A redundant clause survives reduction when it has a low glue level (with the default
/// configuration), was involved in a conflict since the last reduction, was learnt too recently
/// to have proven itself, or is currently locked as a reason. The remaining clauses are ranked by
/// glue and activity and the worse half is deleted.
pub fn reduce_db(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut ClauseDbP,
        mut SolverStateP,
        mut WatchesP,
        AssignmentP,
        ConfigP,
        ImplGraphP,
    ),
) {
    let protect_low_glue = ctx.part(ConfigP).protect_low_glue;
    let protect_glue = ctx.part(ConfigP).protect_glue;
    let protect_young = ctx.part(ConfigP).protect_young_conflicts;
    let conflicts = ctx.part(SolverStateP).stats.conflicts;

    let learnts = ctx.part_mut(ClauseDbP).take_redundant();

    let mut kept = vec![];
    let mut deletable = vec![];

    for &cref in learnts.iter() {
        if ctx.part(ArenaP).header(cref).freed() {
            continue;
        }

        let locked = is_locked(ctx.borrow(), cref);

        let header = ctx.part_mut(ArenaP).header_mut(cref);
        let used = header.used();
        header.set_used(false);

        let young = conflicts.saturating_sub(header.introduced_at()) < protect_young;

        let protected = (protect_low_glue && header.glue() <= protect_glue as usize)
            || used
            || young
            || locked;

        if protected {
            kept.push(cref);
        } else {
            deletable.push(cref);
        }
    }

    let arena = ctx.part(ArenaP);
    deletable.sort_unstable_by_key(|&cref| {
        let header = arena.header(cref);
        (header.glue(), Reverse(OrderedFloat(header.activity())))
    });

    let keep_count = deletable.len() - deletable.len() / 2;

    for &cref in deletable[keep_count..].iter() {
        // Locked clauses were partitioned into `kept` above and nothing propagated since.
        let deleted = try_delete_clause(ctx.borrow(), cref);
        debug_assert!(deleted);
    }

    kept.extend_from_slice(&deletable[..keep_count]);
    ctx.part_mut(ClauseDbP).set_redundant(kept);

    ctx.part_mut(SolverStateP).stats.reductions += 1;
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::Lit;

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;
    use crate::prop::{enqueue_assignment, Reason};

    fn learnt_header(glue: usize, activity: f32) -> ClauseHeader {
        let mut header = ClauseHeader::new();
        header.set_redundant(true);
        header.set_glue(glue);
        header.set_activity(activity);
        header
    }

    fn clause_lits(base: usize) -> [Lit; 3] {
        [
            Lit::from_index(base, true),
            Lit::from_index(base + 1, false),
            Lit::from_index(base + 2, true),
        ]
    }

    #[test]
    fn low_glue_used_young_and_locked_clauses_survive() {
        let mut ctx = Context::default();
        let mut ctx = ctx.into_partial_ref_mut();

        set_var_count(ctx.borrow(), 45);

        // All clauses below were learnt at conflict 0 unless marked otherwise, long before the
        // reduction takes place.
        ctx.part_mut(SolverStateP).stats.conflicts = 10_000;

        // A low glue clause, a used clause, a young clause, a locked clause and many deletable
        // ones.
        let low_glue = db::add_clause(ctx.borrow(), learnt_header(2, 0.0), &clause_lits(0)).unwrap();
        let used = {
            let mut header = learnt_header(10, 0.0);
            header.set_used(true);
            db::add_clause(ctx.borrow(), header, &clause_lits(3)).unwrap()
        };
        let young = {
            let mut header = learnt_header(10, 0.0);
            header.set_introduced_at(9_500);
            db::add_clause(ctx.borrow(), header, &clause_lits(6)).unwrap()
        };
        let locked = db::add_clause(ctx.borrow(), learnt_header(10, 0.0), &clause_lits(9)).unwrap();
        enqueue_assignment(ctx.borrow(), clause_lits(9)[0], Reason::Long(locked));

        let mut deletable = vec![];
        for i in 0..8 {
            let header = learnt_header(5 + i, i as f32);
            deletable.push(
                db::add_clause(ctx.borrow(), header, &clause_lits(12 + i * 3)).unwrap(),
            );
        }

        assert_eq!(ctx.part(ClauseDbP).count_redundant(), 12);

        reduce_db(ctx.borrow());

        // 8 deletable clauses, the worse half of which was deleted.
        assert_eq!(ctx.part(ClauseDbP).count_redundant(), 8);

        for &cref in &[low_glue, used, young, locked] {
            assert!(!ctx.part(ArenaP).header(cref).freed());
        }

        // The used mark is consumed by the reduction.
        assert!(!ctx.part(ArenaP).header(used).used());

        // The worst clauses (highest glue) were deleted.
        for &cref in deletable[..4].iter() {
            assert!(!ctx.part(ArenaP).header(cref).freed());
        }
        for &cref in deletable[4..].iter() {
            assert!(ctx.part(ArenaP).header(cref).freed());
        }

        assert_eq!(ctx.part(SolverStateP).stats.reductions, 1);
    }
}
