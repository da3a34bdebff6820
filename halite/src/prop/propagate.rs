//! Watched-literal boolean constraint propagation.
use partial_ref::{partial, PartialRef};

use halite_formula::Lit;

use crate::context::{
    ArenaP, AssignmentP, Context, ImplGraphP, SolverStateP, TrailP, WatchesP,
};
use crate::watch::Watcher;

use super::assignment::fast_option_eq;
use super::enqueue_assignment;
use super::{Conflict, Reason};

/// Propagate all enqueued assignments to a fixed point or a conflict.
///
/// Assignments are processed in FIFO order. On conflict the offending watcher is left in place
/// and the falsified clause is returned; the propagation queue keeps its remaining entries, which
/// are discarded by the following backtrack.
pub fn propagate(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ImplGraphP,
        mut SolverStateP,
        mut TrailP,
        mut WatchesP,
    ),
) -> Result<(), Conflict> {
    while let Some(lit) = ctx.part_mut(TrailP).pop_queue() {
        ctx.part_mut(SolverStateP).stats.propagations += 1;
        propagate_assigned(ctx.borrow(), lit)?;
    }
    Ok(())
}

/// Process all watchers of a newly assigned literal.
///
/// `lit` was assigned true, so the lists of `!lit` are scanned: those watchers belong to clauses
/// that contain the now falsified literal.
fn propagate_assigned(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ImplGraphP,
        mut TrailP,
        mut WatchesP,
    ),
    lit: Lit,
) -> Result<(), Conflict> {
    // The code below is heavily optimized and replaces a much nicer but sadly slower version.
    // Nevertheless it still performs full bound checks. Therefore this function is safe to call
    // even when some other code violated invariants of for example the clause db.
    unsafe {
        let (watches, mut ctx) = ctx.split_part_mut(WatchesP);
        let (arena, mut ctx) = ctx.split_part_mut(ArenaP);

        let false_lit = !lit;

        let watch_begin;
        let watch_end;
        {
            let watch_list = watches.watched_by_mut(false_lit);
            watch_begin = watch_list.as_mut_ptr();
            watch_end = watch_begin.add(watch_list.len());
        }
        let mut watch_ptr = watch_begin;
        let mut watch_write = watch_begin;

        let value_limit = ctx.part(AssignmentP).lit_values().len();
        let value_ptr = ctx.part(AssignmentP).lit_values().as_ptr();

        let is_true = |lit: Lit| {
            assert!(lit.code() < value_limit);
            fast_option_eq(*value_ptr.add(lit.code()), Some(true))
        };

        let is_false = |lit: Lit| {
            assert!(lit.code() < value_limit);
            fast_option_eq(*value_ptr.add(lit.code()), Some(false))
        };

        let mut conflict = None;

        'watchers: while watch_ptr != watch_end {
            let watch = *watch_ptr;
            watch_ptr = watch_ptr.add(1);

            match watch {
                Watcher::Binary { other, .. } => {
                    // The clause is `{false_lit, other}` and all watchers are kept as they are.
                    *watch_write = watch;
                    watch_write = watch_write.add(1);

                    if is_true(other) {
                        continue;
                    }
                    if is_false(other) {
                        conflict = Some(Conflict::Binary([false_lit, other]));
                        break 'watchers;
                    }
                    enqueue_assignment(ctx.borrow(), other, Reason::Binary([false_lit]));
                }
                Watcher::Ternary { other: [a, b], .. } => {
                    // The clause is `{false_lit, a, b}`; the two co-literals double as blockers.
                    *watch_write = watch;
                    watch_write = watch_write.add(1);

                    if is_true(a) || is_true(b) {
                        continue;
                    }

                    match (is_false(a), is_false(b)) {
                        (true, true) => {
                            conflict = Some(Conflict::Ternary([false_lit, a, b]));
                            break 'watchers;
                        }
                        (false, true) => {
                            enqueue_assignment(ctx.borrow(), a, Reason::Ternary([false_lit, b]));
                        }
                        (true, false) => {
                            enqueue_assignment(ctx.borrow(), b, Reason::Ternary([false_lit, a]));
                        }
                        (false, false) => (),
                    }
                }
                Watcher::Long { cref, blocking } => {
                    // If the blocking literal (which is part of the watched clause) is already
                    // true, the watched clause is satisfied and we don't even have to look at it.
                    if is_true(blocking) {
                        *watch_write = watch;
                        watch_write = watch_write.add(1);
                        continue;
                    }

                    // Make sure we can access at least 3 lits
                    arena.check_bounds(cref, 3);

                    let clause_ptr = arena.lits_ptr_mut_unchecked(cref);
                    let header = *arena.header_unchecked(cref);

                    // First we ensure that the falsified literal is in position 1. This prepares
                    // the literal order for further propagations, as the propagating literal has
                    // to be in position 0. Doing this here also avoids a similar check later
                    // should the clause be satisfied by a non-watched literal, as we can just
                    // move that literal to position 1.
                    let mut first = *clause_ptr.add(0);
                    if first == false_lit {
                        let c1 = *clause_ptr.add(1);
                        first = c1;
                        *clause_ptr.add(0) = c1;
                        *clause_ptr.add(1) = false_lit;
                    }

                    // We create a new watch with the other watched literal as blocking literal.
                    // This will either replace the currently processed watch or be added to
                    // another literal's watch list.
                    let new_watch = Watcher::Long {
                        cref,
                        blocking: first,
                    };

                    // If the other watched literal (now in position 0) isn't the blocking
                    // literal, check whether that one is true. If so nothing else needs to be
                    // done.
                    if first != blocking && is_true(first) {
                        *watch_write = new_watch;
                        watch_write = watch_write.add(1);
                        continue;
                    }

                    // At this point we try to find a non-false unwatched literal to replace the
                    // falsified literal as the watched literal.
                    let clause_len = header.len();
                    let mut lit_ptr = clause_ptr.add(2);
                    let lit_end = clause_ptr.add(clause_len);

                    // Make sure we can access all clause literals.
                    arena.check_bounds(cref, clause_len);

                    while lit_ptr != lit_end {
                        let rest_lit = *lit_ptr;
                        if !is_false(rest_lit) {
                            // We found a non-false literal and make it a watched literal by
                            // reordering the literals and adding the watch to the corresponding
                            // watchlist.
                            *clause_ptr.add(1) = rest_lit;
                            *lit_ptr = false_lit;

                            // We're currently using unsafe to modify the watchlist of false_lit,
                            // so make extra sure we're not aliasing.
                            assert_ne!(rest_lit, false_lit);
                            watches.add_watch(rest_lit, new_watch);
                            continue 'watchers;
                        }
                        lit_ptr = lit_ptr.add(1);
                    }

                    // We didn't find a non-false unwatched literal, so either we're propagating
                    // or we have a conflict.
                    *watch_write = new_watch;
                    watch_write = watch_write.add(1);

                    // If the other watched literal is false we have a conflict.
                    if is_false(first) {
                        conflict = Some(Conflict::Long(cref));
                        break 'watchers;
                    }

                    // Otherwise we enqueue a new propagation.
                    enqueue_assignment(ctx.borrow(), first, Reason::Long(cref));
                }
            }
        }

        // We move all unprocessed watches and resize the current watchlist.
        while watch_ptr != watch_end {
            *watch_write = *watch_ptr;
            watch_write = watch_write.add(1);
            watch_ptr = watch_ptr.add(1);
        }

        let out_size =
            ((watch_write as usize) - (watch_begin as usize)) / std::mem::size_of::<Watcher>();

        watches.watched_by_mut(false_lit).truncate(out_size);

        match conflict {
            None => Ok(()),
            Some(conflict) => Err(conflict),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::{lit, lits};

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;
    use crate::prop::backtrack;

    fn prepare(var_count: usize) -> Box<Context> {
        let mut ctx = Box::new(Context::default());
        {
            let mut ctx_ref = ctx.into_partial_ref_mut();
            set_var_count(ctx_ref.borrow(), var_count);
        }
        ctx
    }

    #[test]
    fn binary_chain_propagates_in_order() {
        let mut ctx = prepare(5);
        let mut ctx = ctx.into_partial_ref_mut();

        for window in lits![1, 2, 3, 4, 5].windows(2) {
            ctx.part_mut(WatchesP)
                .attach_binary([!window[0], window[1]], false);
        }

        enqueue_assignment(ctx.borrow(), lit!(1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        assert_eq!(ctx.part(TrailP).trail(), &lits![1, 2, 3, 4, 5][..]);
        assert!(ctx.part(TrailP).fully_propagated());
        assert_eq!(
            ctx.part(ImplGraphP).reason(lit!(3).var()),
            &Reason::Binary([lit!(-2)])
        );
    }

    #[test]
    fn ternary_propagation_and_conflict() {
        let mut ctx = prepare(3);
        let mut ctx = ctx.into_partial_ref_mut();

        ctx.part_mut(WatchesP)
            .attach_ternary(lits![1, 2, 3], false);

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        assert!(ctx.part(AssignmentP).lit_is_true(lit!(3)));
        match ctx.part(ImplGraphP).reason(lit!(3).var()) {
            // The reason stores the two falsified clause literals.
            Reason::Ternary(lits) => {
                assert!(lits.contains(&lit!(1)) && lits.contains(&lit!(2)))
            }
            reason => panic!("unexpected reason {:?}", reason),
        }

        backtrack(ctx.borrow(), 0);

        ctx.part_mut(WatchesP)
            .attach_ternary(lits![1, -2, 3], false);
        ctx.part_mut(WatchesP)
            .attach_ternary(lits![1, -2, -3], false);

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(2), Reason::Decision);
        let result = propagate(ctx.borrow());

        match result {
            Err(Conflict::Ternary(mut lits)) => {
                lits.sort();
                let mut expected = lits![1, -2, -3];
                expected.sort();
                assert_eq!(lits, expected);
            }
            other => panic!("expected ternary conflict, got {:?}", other),
        }
    }

    #[test]
    fn long_clause_watch_relocation() {
        let mut ctx = prepare(5);
        let mut ctx = ctx.into_partial_ref_mut();

        let mut header = ClauseHeader::new();
        header.set_redundant(false);
        let cref = db::add_clause(ctx.borrow(), header, &lits![1, 2, 3, 4]).unwrap();

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        ctx.part_mut(TrailP).new_decision_level();
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Decision);
        assert!(propagate(ctx.borrow()).is_ok());

        // The clause became unit and propagated its remaining literal.
        assert!(ctx.part(AssignmentP).lit_is_true(lit!(4)));
        assert_eq!(ctx.part(ImplGraphP).reason(lit!(4).var()), &Reason::Long(cref));
        // The implied literal was moved into position 0.
        assert_eq!(ctx.part(ArenaP).clause(cref).lits()[0], lit!(4));
    }

    #[test]
    fn long_clause_conflict_at_level_zero() {
        let mut ctx = prepare(3);
        let mut ctx = ctx.into_partial_ref_mut();

        let cref = db::add_clause(ctx.borrow(), ClauseHeader::new(), &lits![1, 2, 3]).unwrap();

        enqueue_assignment(ctx.borrow(), lit!(-1), Reason::Decision);
        enqueue_assignment(ctx.borrow(), lit!(-2), Reason::Decision);
        enqueue_assignment(ctx.borrow(), lit!(-3), Reason::Decision);

        assert_eq!(propagate(ctx.borrow()), Err(Conflict::Long(cref)));
    }
}
