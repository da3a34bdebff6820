//! The implication graph.
use partial_ref::{partial, PartialRef};

use halite_formula::lit::{Lit, LitIdx, Var};

use crate::clause::ClauseRef;
use crate::context::{ArenaP, Context};

/// Assignments that caused a propagation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Reason {
    /// A decision, an assumption or a top level fact.
    Decision,
    /// Implied by a binary clause, together with the falsified literal stored here.
    Binary([Lit; 1]),
    /// Implied by a ternary clause, together with the two falsified literals stored here.
    Ternary([Lit; 2]),
    /// Implied by a long clause which has the implied literal in position 0.
    Long(ClauseRef),
}

impl Reason {
    /// The falsified literals that caused the propagation.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ArenaP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Reason::Decision => &[],
            Reason::Binary(lits) => lits,
            Reason::Ternary(lits) => lits,
            // The propagated literal is always kept at position 0
            Reason::Long(cref) => &ctx.part(ArenaP).clause(*cref).lits()[1..],
        }
    }

    /// Whether the assignment has no antecedent clause.
    pub fn is_decision(&self) -> bool {
        matches!(self, Reason::Decision)
    }
}

/// Propagation that resulted in a conflict.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Conflict {
    Binary([Lit; 2]),
    Ternary([Lit; 3]),
    Long(ClauseRef),
}

impl Conflict {
    /// The literals of the falsified clause.
    pub fn lits<'out, 'a, 'b>(&'a self, ctx: &'b partial!('b Context, ArenaP)) -> &'out [Lit]
    where
        'a: 'out,
        'b: 'out,
    {
        match self {
            Conflict::Binary(lits) => lits,
            Conflict::Ternary(lits) => lits,
            Conflict::Long(cref) => ctx.part(ArenaP).clause(*cref).lits(),
        }
    }
}

/// Node and incoming edges of the implication graph.
#[derive(Copy, Clone)]
pub struct ImplNode {
    pub reason: Reason,
    pub level: LitIdx,
}

/// The implication graph.
///
/// This is a DAG having all assigned variables as nodes. It has unit clauses, assumptions and
/// decisions as sources. For each propagated assignment it has incoming edges from the literals
/// whose assignment caused the propagation to happen.
#[derive(Default)]
pub struct ImplGraph {
    /// Contains only valid data for indices of assigned variables.
    pub nodes: Vec<ImplNode>,
}

impl ImplGraph {
    /// Update structures for a new variable count.
    pub fn set_var_count(&mut self, count: usize) {
        self.nodes.resize(
            count,
            ImplNode {
                reason: Reason::Decision,
                level: 0,
            },
        );
    }

    /// Get the reason for an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn reason(&self, var: Var) -> &Reason {
        &self.nodes[var.index()].reason
    }

    /// Get the decision level of an assigned variable.
    ///
    /// Returns stale data if the variable isn't assigned.
    pub fn level(&self, var: Var) -> usize {
        self.nodes[var.index()].level as usize
    }

    /// Updates the reason for an assigned variable.
    ///
    /// Make sure the reason vars are in front of the assigned variable in the trail.
    pub fn update_reason(&mut self, var: Var, reason: Reason) {
        self.nodes[var.index()].reason = reason
    }

    /// Rewrite all nodes under a variable renumbering.
    ///
    /// The map must be a bijection on the declared literals that commutes with negation.
    pub fn rename(&mut self, map: impl Fn(Lit) -> Lit) {
        let mut new_nodes = self.nodes.clone();

        for (index, &node) in self.nodes.iter().enumerate() {
            let new_index = map(Lit::from_index(index, true)).index();
            let mut node = node;
            node.reason = match node.reason {
                Reason::Decision => Reason::Decision,
                Reason::Binary([a]) => Reason::Binary([map(a)]),
                Reason::Ternary([a, b]) => Reason::Ternary([map(a), map(b)]),
                Reason::Long(cref) => Reason::Long(cref),
            };
            new_nodes[new_index] = node;
        }

        self.nodes = new_nodes;
    }
}
