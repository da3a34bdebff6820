//! Database of long clauses.
use partial_ref::{partial, PartialRef};

use halite_formula::Lit;

use crate::context::{ArenaP, AssignmentP, ClauseDbP, Context, ImplGraphP, WatchesP};
use crate::errors::SolverError;
use crate::prop::Reason;

use super::{ClauseHeader, ClauseRef, ClauseRefMap};

/// Database of long clauses.
///
/// Removal of clauses from the `original` and `redundant` lists can be delayed. The clause
/// header's freed flag needs to be checked when iterating over these. The counts are always up to
/// date.
///
/// Binary and ternary clauses have no backing storage, they live entirely in the watch lists.
/// Only their counts are tracked here.
#[derive(Default)]
pub struct ClauseDb {
    /// May contain freed clauses, see above.
    original: Vec<ClauseRef>,
    /// May contain freed clauses, see above.
    redundant: Vec<ClauseRef>,
    count_original: usize,
    count_redundant: usize,
    count_binary: usize,
    count_ternary: usize,
}

impl ClauseDb {
    /// The number of long original clauses.
    pub fn count_original(&self) -> usize {
        self.count_original
    }

    /// The number of long redundant clauses.
    pub fn count_redundant(&self) -> usize {
        self.count_redundant
    }

    /// The number of binary clauses.
    pub fn count_binary(&self) -> usize {
        self.count_binary
    }

    /// The number of ternary clauses.
    pub fn count_ternary(&self) -> usize {
        self.count_ternary
    }

    /// Record that a binary clause was attached.
    pub fn note_binary_added(&mut self) {
        self.count_binary += 1;
    }

    /// Record that a ternary clause was attached.
    pub fn note_ternary_added(&mut self) {
        self.count_ternary += 1;
    }

    /// Record that a binary clause was detached.
    pub fn note_binary_removed(&mut self) {
        self.count_binary -= 1;
    }

    /// Record that a ternary clause was detached.
    pub fn note_ternary_removed(&mut self) {
        self.count_ternary -= 1;
    }

    /// Record that all binary and ternary clauses were dropped from the watch lists.
    pub fn reset_short_counts(&mut self, binary: usize, ternary: usize) {
        self.count_binary = binary;
        self.count_ternary = ternary;
    }

    /// Clause references of the original long clauses, may contain freed entries.
    pub(crate) fn original(&self) -> &[ClauseRef] {
        &self.original
    }

    /// Clause references of the redundant long clauses, may contain freed entries.
    pub(crate) fn redundant(&self) -> &[ClauseRef] {
        &self.redundant
    }

    pub(crate) fn take_redundant(&mut self) -> Vec<ClauseRef> {
        std::mem::replace(&mut self.redundant, vec![])
    }

    pub(crate) fn set_redundant(&mut self, redundant: Vec<ClauseRef>) {
        self.redundant = redundant;
    }

    /// Rewrite all clause references using the forwarding map of a consolidation.
    ///
    /// Entries of clauses freed before the consolidation are dropped.
    pub fn rewrite_refs(&mut self, map: &ClauseRefMap) {
        for list in &mut [&mut self.original, &mut self.redundant] {
            let mut write = 0;
            for read in 0..list.len() {
                if let Some(new_ref) = map.try_forward(list[read]) {
                    list[write] = new_ref;
                    write += 1;
                }
            }
            list.truncate(write);
        }
    }
}

/// Add a long clause to the database and watch it.
///
/// `lits` have to be preprocessed: at least three distinct literals, none of them assigned at the
/// top level.
pub fn add_clause(
    mut ctx: partial!(Context, mut ArenaP, mut ClauseDbP, mut WatchesP),
    header: ClauseHeader,
    lits: &[Lit],
) -> Result<ClauseRef, SolverError> {
    let redundant = header.redundant();

    let cref = ctx.part_mut(ArenaP).alloc(header, lits)?;

    ctx.part_mut(WatchesP)
        .attach_long(cref, [lits[0], lits[1]]);

    let db = ctx.part_mut(ClauseDbP);
    if redundant {
        db.redundant.push(cref);
        db.count_redundant += 1;
    } else {
        db.original.push(cref);
        db.count_original += 1;
    }

    Ok(cref)
}

/// Delete a long clause from the database.
///
/// Detaches the watches and marks the clause as freed; the list entry is removed lazily.
pub fn delete_clause(
    mut ctx: partial!(Context, mut ArenaP, mut ClauseDbP, mut WatchesP),
    cref: ClauseRef,
) {
    let (arena, mut ctx) = ctx.split_part_mut(ArenaP);

    let (watched, redundant) = {
        let clause = arena.clause(cref);
        let lits = clause.lits();
        ([lits[0], lits[1]], clause.header().redundant())
    };

    ctx.part_mut(WatchesP).detach_long(cref, watched);
    arena.free(cref);

    let db = ctx.part_mut(ClauseDbP);
    if redundant {
        db.count_redundant -= 1;
    } else {
        db.count_original -= 1;
    }
}

/// Whether a clause is the reason of a current implication and thus must not be deleted.
pub fn is_locked(
    ctx: partial!(Context, ArenaP, AssignmentP, ImplGraphP),
    cref: ClauseRef,
) -> bool {
    let first = ctx.part(ArenaP).clause(cref).lits()[0];
    ctx.part(AssignmentP).lit_is_true(first)
        && ctx.part(ImplGraphP).reason(first.var()) == &Reason::Long(cref)
}

/// Delete a long clause unless it is currently locked as a reason.
pub fn try_delete_clause(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut ClauseDbP,
        mut WatchesP,
        AssignmentP,
        ImplGraphP
    ),
    cref: ClauseRef,
) -> bool {
    if is_locked(ctx.borrow(), cref) {
        return false;
    }
    delete_clause(ctx.borrow(), cref);
    true
}
