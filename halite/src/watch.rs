//! Watchlists to detect clauses that became unit.
//!
//! Every clause is represented in the watch lists of some of its literals. Long clauses have
//! exactly two watches, kept in the lists of the literals currently in position 0 and 1; whenever
//! the watches move, the clause's literals are permuted so the watched literals stay in front.
//! Binary and ternary clauses have no other storage at all: a binary clause lives as one watcher
//! in each of its two literals' lists, a ternary clause as one watcher in each of its three
//! literals' lists.
//!
//! When a clause is not unit under the current assignment, the watched literals of a long clause
//! point at two non-false literals. When a clause is unit and thus propagating, the true literal
//! is watched and in position 0, the other watched literal is the one with the largest decision
//! level and kept in position 1. When a clause becomes satisfied before becoming unit the watches
//! can be kept as they were.
//!
//! When a literal is assigned false that invariant can be invalidated. This is detected by
//! scanning the watch list of the falsified literal. Unless there is a conflict, the watches can
//! always be moved to restore the invariant, and doing so finds exactly the clauses that became
//! unit. There is no need to update watchlists on backtracking, as unassigning varials cannot
//! invalidate the invariant.
//!
//! See [Section 4.5.1 of the "Handbook of Satisfiability"][handbook-ch4] for more details and
//! references.
//!
//! As a further optimization long watches use blocking literals. Each long watcher stores a
//! literal of the clause that is different from the watched literal. When that literal is true,
//! the clause is already satisfied, which can be detected by looking at the watcher alone,
//! avoiding access of the clause storage. This variant was introduced by [Niklas Sörensson and
//! Niklas Eén in "MINISAT 2.1 and MINISAT++ 1.0 — SAT Race 2008 Editions"][minisat-2.1]. For
//! binary and ternary watchers the co-literals stored in the watcher play the same role.
//!
//! [handbook-ch4]: https://www.satassociation.org/articles/FAIA185-0131.pdf
//! [minisat-2.1]: https://www.cril.univ-artois.fr/SAT09/solvers/booklet.pdf
use halite_formula::Lit;

use crate::clause::ClauseRef;

/// A watch, stored in the list of one of the clause's literals.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Watcher {
    /// A binary clause consisting of the referring literal and `other`.
    Binary { other: Lit, redundant: bool },
    /// A ternary clause consisting of the referring literal and `other`.
    Ternary { other: [Lit; 2], redundant: bool },
    /// A long clause which has the referring literal in position 0 or 1.
    Long {
        cref: ClauseRef,
        /// A literal of the clause, different from the referring literal.
        blocking: Lit,
    },
}

/// Watchlists for all clauses of the formula.
///
/// Indexed by the literal contained in the clause: the watchers of clauses containing `lit` in a
/// watched position are found in `watched_by(lit)`. Propagating a newly assigned literal `p` thus
/// scans the list of `!p`.
#[derive(Default)]
pub struct Watches {
    watches: Vec<Vec<Watcher>>,
}

impl Watches {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.watches.resize(count * 2, vec![]);
    }

    /// Start watching a long clause.
    ///
    /// `lits` have to be the first two literals of the given clause.
    pub fn attach_long(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for i in 0..2 {
            let watch = Watcher::Long {
                cref,
                blocking: lits[i ^ 1],
            };
            self.watches[lits[i].code()].push(watch);
        }
    }

    /// Stop watching a long clause.
    ///
    /// `lits` have to be the literals currently in position 0 and 1 of the clause.
    pub fn detach_long(&mut self, cref: ClauseRef, lits: [Lit; 2]) {
        for &lit in lits.iter() {
            self.watches[lit.code()].retain(|watch| match watch {
                Watcher::Long { cref: watched, .. } => *watched != cref,
                _ => true,
            });
        }
    }

    /// Add a binary clause.
    pub fn attach_binary(&mut self, lits: [Lit; 2], redundant: bool) {
        for i in 0..2 {
            self.watches[lits[i].code()].push(Watcher::Binary {
                other: lits[i ^ 1],
                redundant,
            });
        }
    }

    /// Remove a binary clause.
    pub fn detach_binary(&mut self, lits: [Lit; 2]) {
        for i in 0..2 {
            let other = lits[i ^ 1];
            self.watches[lits[i].code()].retain(|watch| match watch {
                Watcher::Binary { other: watched, .. } => *watched != other,
                _ => true,
            });
        }
    }

    /// Add a ternary clause.
    pub fn attach_ternary(&mut self, lits: [Lit; 3], redundant: bool) {
        for i in 0..3 {
            self.watches[lits[i].code()].push(Watcher::Ternary {
                other: [lits[(i + 1) % 3], lits[(i + 2) % 3]],
                redundant,
            });
        }
    }

    /// Remove a ternary clause.
    pub fn detach_ternary(&mut self, lits: [Lit; 3]) {
        for i in 0..3 {
            let others = [lits[(i + 1) % 3], lits[(i + 2) % 3]];
            self.watches[lits[i].code()].retain(|watch| match watch {
                Watcher::Ternary { other, .. } => {
                    !(other.contains(&others[0]) && other.contains(&others[1]))
                }
                _ => true,
            });
        }
    }

    /// Return watches for a given literal.
    pub fn watched_by(&self, lit: Lit) -> &[Watcher] {
        &self.watches[lit.code()]
    }

    /// Return watches for a given literal.
    pub fn watched_by_mut(&mut self, lit: Lit) -> &mut Vec<Watcher> {
        &mut self.watches[lit.code()]
    }

    /// Make a literal watch a clause.
    pub fn add_watch(&mut self, lit: Lit, watch: Watcher) {
        self.watches[lit.code()].push(watch)
    }

    /// Rewrite all long clause references using the given map.
    ///
    /// Called while the arena consolidates its storage.
    pub fn rewrite_refs(&mut self, map: impl Fn(ClauseRef) -> ClauseRef) {
        for list in self.watches.iter_mut() {
            for watch in list.iter_mut() {
                if let Watcher::Long { cref, .. } = watch {
                    *cref = map(*cref);
                }
            }
        }
    }

    /// Clear and shrink the lists of all literals matched by the predicate.
    pub fn free_unused(&mut self, pred: impl Fn(Lit) -> bool) {
        for (code, list) in self.watches.iter_mut().enumerate() {
            if pred(Lit::from_code(code)) {
                *list = vec![];
            }
        }
    }

    /// Clear all lists, keeping their allocations.
    pub fn clear(&mut self) {
        for list in self.watches.iter_mut() {
            list.clear();
        }
    }

    /// Iterate over all lists together with the literal owning them.
    pub fn iter(&self) -> impl Iterator<Item = (Lit, &[Watcher])> {
        self.watches
            .iter()
            .enumerate()
            .map(|(code, list)| (Lit::from_code(code), &list[..]))
    }
}
