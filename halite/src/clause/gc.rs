//! Consolidation of the clause arena.
use partial_ref::{partial, PartialRef};

use crate::context::{
    ArenaP, ClauseDbP, Context, ImplGraphP, SolverStateP, TrailP, WatchesP,
};
use crate::prop::Reason;

/// Consolidate the clause arena when it is worth doing so.
///
/// This is the case when enough freed storage accumulated or when the arena is about to run out
/// of encodable segments.
pub fn collect_garbage(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchesP,
        TrailP,
    ),
) {
    if ctx.part(ArenaP).should_consolidate() {
        collect_garbage_now(ctx.borrow());
    }
}

/// Unconditionally consolidate the clause arena.
///
/// All live clauses are compacted into fresh segments. Every outstanding clause reference (watch
/// lists, implication reasons and the clause database lists) is rewritten using the forwarding
/// records the arena leaves behind.
pub fn collect_garbage_now(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut SolverStateP,
        mut WatchesP,
        TrailP,
    ),
) {
    let (arena, mut ctx) = ctx.split_part_mut(ArenaP);
    let (watches, mut ctx) = ctx.split_part_mut(WatchesP);
    let (impl_graph, mut ctx) = ctx.split_part_mut(ImplGraphP);
    let (db, mut ctx) = ctx.split_part_mut(ClauseDbP);
    let trail = ctx.part(TrailP);

    arena.consolidate(|map| {
        watches.rewrite_refs(|cref| map.forward(cref));

        for &lit in trail.trail().iter() {
            if let &Reason::Long(cref) = impl_graph.reason(lit.var()) {
                impl_graph.update_reason(lit.var(), Reason::Long(map.forward(cref)));
            }
        }

        db.rewrite_refs(map);
    });

    ctx.part_mut(SolverStateP).stats.consolidations += 1;
}
