//! Hooks for external inprocessing passes.
//!
//! Inprocessing itself lives outside the solver core. What the core provides is the machinery
//! such passes need: detaching and rebuilding all watch lists, iterating over the stored clauses
//! with mutable access, rewriting all literals under a variable renumbering and reading the top
//! level facts.
use partial_ref::{partial, PartialRef};

use halite_formula::Lit;

use crate::clause::ClauseRef;
use crate::context::{
    ArenaP, AssignmentP, ClauseDbP, Context, ImplGraphP, TrailP, VsidsP, WatchesP,
};
use crate::watch::Watcher;

/// Binary and ternary clauses extracted from the watch lists by [`detach_all`].
///
/// These clauses have no other storage, so they are handed to the caller by value and restored by
/// [`reattach_all`].
pub struct DetachedClauses {
    binary: Vec<([Lit; 2], bool)>,
    ternary: Vec<([Lit; 3], bool)>,
}

impl DetachedClauses {
    /// The detached binary clauses with their redundancy flag.
    pub fn binary(&self) -> &[([Lit; 2], bool)] {
        &self.binary
    }

    /// The detached ternary clauses with their redundancy flag.
    pub fn ternary(&self) -> &[([Lit; 3], bool)] {
        &self.ternary
    }
}

/// Flush all watch lists.
///
/// Long clauses stay in the arena; binary and ternary clauses are returned to the caller. Until
/// [`reattach_all`] is called, propagation must not run.
pub fn detach_all(mut ctx: partial!(Context, mut WatchesP)) -> DetachedClauses {
    let mut detached = DetachedClauses {
        binary: vec![],
        ternary: vec![],
    };

    for (lit, watchers) in ctx.part(WatchesP).iter() {
        for watch in watchers.iter() {
            match *watch {
                // Each binary clause is kept in two lists; collect it at its smaller literal.
                Watcher::Binary { other, redundant } => {
                    if lit < other {
                        detached.binary.push(([lit, other], redundant));
                    }
                }
                // Each ternary clause is kept in three lists; collect it at its smallest literal.
                Watcher::Ternary { other, redundant } => {
                    if lit < other[0] && lit < other[1] {
                        detached.ternary.push(([lit, other[0], other[1]], redundant));
                    }
                }
                Watcher::Long { .. } => (),
            }
        }
    }

    ctx.part_mut(WatchesP).clear();

    detached
}

/// Rebuild all watch lists after inprocessing.
///
/// When a renumbering is given, every literal of the formula and of the solver state is rewritten
/// first: arena clauses, the detached short clauses, the trail, the assignment, the implication
/// graph and the decision heuristic. The map must be a bijection on the declared literals that
/// commutes with negation.
///
/// The propagation queue is reset, so all assignments are re-propagated with the rebuilt watch
/// lists.
pub fn reattach_all(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut TrailP,
        mut VsidsP,
        mut WatchesP,
    ),
    mut detached: DetachedClauses,
    renumber: Option<&dyn Fn(Lit) -> Lit>,
) {
    debug_assert_eq!(ctx.part(TrailP).current_level(), 0);

    if let Some(map) = renumber {
        let arena = ctx.part_mut(ArenaP);
        let refs: Vec<ClauseRef> = arena.refs().collect();
        for cref in refs {
            for lit in arena.clause_mut(cref).lits_mut() {
                *lit = map(*lit);
            }
        }

        for (lits, _) in detached.binary.iter_mut() {
            for lit in lits.iter_mut() {
                *lit = map(*lit);
            }
        }
        for (lits, _) in detached.ternary.iter_mut() {
            for lit in lits.iter_mut() {
                *lit = map(*lit);
            }
        }

        ctx.part_mut(TrailP).rename_lits(|lit| map(lit));
        ctx.part_mut(AssignmentP).rename(|lit| map(lit));
        ctx.part_mut(ImplGraphP).rename(|lit| map(lit));
        ctx.part_mut(VsidsP).rename(|var| map(var.positive()).var());
    }

    ctx.part_mut(WatchesP).clear();

    let (watches, mut ctx) = ctx.split_part_mut(WatchesP);

    for &(lits, redundant) in detached.binary.iter() {
        watches.attach_binary(lits, redundant);
    }
    for &(lits, redundant) in detached.ternary.iter() {
        watches.attach_ternary(lits, redundant);
    }

    ctx.part_mut(ClauseDbP)
        .reset_short_counts(detached.binary.len(), detached.ternary.len());

    let (arena, mut ctx) = ctx.split_part_mut(ArenaP);
    for cref in arena.refs() {
        let lits = arena.clause(cref).lits();
        watches.attach_long(cref, [lits[0], lits[1]]);
    }

    ctx.part_mut(TrailP).reset_queue();
}

/// Ordered iteration over all live long clauses with mutable access to their literals.
///
/// After mutating literals the watch lists are stale; callers must run [`detach_all`] /
/// [`reattach_all`] to restore them.
pub fn arena_iter_mut(
    mut ctx: partial!(Context, mut ArenaP),
    mut f: impl FnMut(ClauseRef, &mut [Lit]),
) {
    let arena = ctx.part_mut(ArenaP);
    let refs: Vec<ClauseRef> = arena.refs().collect();
    for cref in refs {
        f(cref, arena.clause_mut(cref).lits_mut());
    }
}

/// Visit every original clause, including the binary and ternary ones.
pub fn for_each_original(context: &Context, f: impl FnMut(&[Lit])) {
    for_each_clause(context, false, f)
}

/// Visit every redundant clause, including the binary and ternary ones.
pub fn for_each_redundant(context: &Context, f: impl FnMut(&[Lit])) {
    for_each_clause(context, true, f)
}

fn for_each_clause(context: &Context, redundant: bool, mut f: impl FnMut(&[Lit])) {
    for (lit, watchers) in context.watches.iter() {
        for watch in watchers.iter() {
            match *watch {
                Watcher::Binary {
                    other,
                    redundant: watch_redundant,
                } => {
                    if watch_redundant == redundant && lit < other {
                        f(&[lit, other]);
                    }
                }
                Watcher::Ternary {
                    other,
                    redundant: watch_redundant,
                } => {
                    if watch_redundant == redundant && lit < other[0] && lit < other[1] {
                        f(&[lit, other[0], other[1]]);
                    }
                }
                Watcher::Long { .. } => (),
            }
        }
    }

    let list = if redundant {
        context.clause_db.redundant()
    } else {
        context.clause_db.original()
    };

    for &cref in list.iter() {
        let clause = context.arena.clause(cref);
        if !clause.header().freed() {
            f(clause.lits());
        }
    }
}

/// The literals fixed at the top level, in propagation order.
pub fn root_level_units(context: &Context) -> &[Lit] {
    context.trail.top_level_assignments()
}

#[cfg(test)]
mod tests {
    use super::*;

    use partial_ref::IntoPartialRefMut;

    use halite_formula::{lit, lits, Var};

    use crate::clause::{db, ClauseHeader};
    use crate::context::set_var_count;
    use crate::load::load_clause;
    use crate::prop::propagate;

    #[test]
    fn detach_reattach_roundtrip() {
        let mut ctx = Context::default();

        {
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), 6);

            load_clause(ctx.borrow(), &lits![1, 2]).unwrap();
            load_clause(ctx.borrow(), &lits![-2, 3, 4]).unwrap();
            load_clause(ctx.borrow(), &lits![3, -4, 5, 6]).unwrap();

            let detached = detach_all(ctx.borrow());

            assert_eq!(detached.binary().len(), 1);
            assert_eq!(detached.ternary().len(), 1);
            assert!(ctx
                .part(WatchesP)
                .iter()
                .all(|(_, watchers)| watchers.is_empty()));

            reattach_all(ctx.borrow(), detached, None);
        }

        let mut originals = vec![];
        for_each_original(&ctx, |clause| originals.push(clause.to_vec()));
        originals.sort();

        let mut expected = vec![
            lits![1, 2].to_vec(),
            lits![-2, 3, 4].to_vec(),
            lits![3, -4, 5, 6].to_vec(),
        ];
        expected.sort();

        assert_eq!(originals, expected);
    }

    #[test]
    fn renumbering_rewrites_the_whole_state() {
        let mut ctx = Context::default();

        {
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), 4);

            load_clause(ctx.borrow(), &lits![1, 2, 3, 4]).unwrap();
            load_clause(ctx.borrow(), &lits![1]).unwrap();
            assert!(propagate(ctx.borrow()).is_ok());

            let detached = detach_all(ctx.borrow());

            // Swap variables 1 and 2 and flip the polarity of 3.
            let map = |lit: Lit| -> Lit {
                let mapped_var = match lit.index() {
                    0 => Var::from_index(1),
                    1 => Var::from_index(0),
                    index => Var::from_index(index),
                };
                let flip = lit.index() == 2;
                Lit::from_var(mapped_var, lit.is_positive() ^ flip)
            };

            reattach_all(ctx.borrow(), detached, Some(&map));

            assert!(ctx.part(AssignmentP).lit_is_true(lit!(2)));
            assert_eq!(ctx.part(TrailP).trail(), &lits![2][..]);

            // Propagation from scratch works on the rebuilt watch lists.
            assert!(propagate(ctx.borrow()).is_ok());
        }

        assert_eq!(root_level_units(&ctx), &lits![2][..]);

        let mut originals = vec![];
        for_each_original(&ctx, |clause| originals.push(clause.to_vec()));
        assert_eq!(originals, vec![lits![2, 1, -3, 4].to_vec()]);
    }

    #[test]
    fn arena_iteration_allows_literal_rewrites() {
        let mut ctx = Context::default();

        {
            let mut ctx = ctx.into_partial_ref_mut();

            set_var_count(ctx.borrow(), 5);

            db::add_clause(ctx.borrow(), ClauseHeader::new(), &lits![1, 2, 3, 4]).unwrap();

            let detached = detach_all(ctx.borrow());

            arena_iter_mut(ctx.borrow(), |_cref, lits| {
                for lit in lits.iter_mut() {
                    *lit = !*lit;
                }
            });

            reattach_all(ctx.borrow(), detached, None);
        }

        let mut originals = vec![];
        for_each_original(&ctx, |clause| originals.push(clause.to_vec()));
        assert_eq!(originals, vec![lits![-1, -2, -3, -4].to_vec()]);
    }
}
