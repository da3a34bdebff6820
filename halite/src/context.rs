//! Central solver data structure.
//!
//! This module defines the `Context` data structure which holds all data used by the solver. It
//! also contains global notification functions that likely need to be extended when new parts are
//! added to the solver.
use partial_ref::{part, partial, PartialRef, PartialRefTarget};

use crate::analyze::Analyze;
use crate::clause::{ClauseActivity, ClauseArena, ClauseDb};
use crate::config::SolverConfig;
use crate::decision::SolverRng;
use crate::decision::vsids::Vsids;
use crate::incremental::Incremental;
use crate::prop::{Assignment, ImplGraph, Trail};
use crate::schedule::Schedule;
use crate::state::SolverState;
use crate::sync::ClauseSync;
use crate::tmp::TmpData;
use crate::watch::Watches;

/// Part declarations for the [`Context`] struct.
pub mod parts {
    use super::*;

    part!(pub AnalyzeP: Analyze);
    part!(pub ArenaP: ClauseArena);
    part!(pub AssignmentP: Assignment);
    part!(pub ClauseActivityP: ClauseActivity);
    part!(pub ClauseDbP: ClauseDb);
    part!(pub ConfigP: SolverConfig);
    part!(pub ImplGraphP: ImplGraph);
    part!(pub IncrementalP: Incremental);
    part!(pub RngP: SolverRng);
    part!(pub ScheduleP: Schedule);
    part!(pub SolverStateP: SolverState);
    part!(pub SyncP: ClauseSync);
    part!(pub TmpDataP: TmpData);
    part!(pub TrailP: Trail);
    part!(pub VsidsP: Vsids);
    part!(pub WatchesP: Watches);
}

pub use parts::*;

/// Central solver data structure.
///
/// This struct contains all data kept by the solver. Most functions operating on multiple fields
/// of the context use partial references provided by the `partial_ref` crate. This documents the
/// data dependencies and makes the borrow checker happy without the overhead of passing individual
/// references.
#[derive(PartialRefTarget, Default)]
pub struct Context {
    #[part(AnalyzeP)]
    pub analyze: Analyze,
    #[part(ArenaP)]
    pub arena: ClauseArena,
    #[part(AssignmentP)]
    pub assignment: Assignment,
    #[part(ClauseActivityP)]
    pub clause_activity: ClauseActivity,
    #[part(ClauseDbP)]
    pub clause_db: ClauseDb,
    #[part(ConfigP)]
    pub config: SolverConfig,
    #[part(ImplGraphP)]
    pub impl_graph: ImplGraph,
    #[part(IncrementalP)]
    pub incremental: Incremental,
    #[part(RngP)]
    pub rng: SolverRng,
    #[part(ScheduleP)]
    pub schedule: Schedule,
    #[part(SolverStateP)]
    pub solver_state: SolverState,
    #[part(SyncP)]
    pub sync: ClauseSync,
    #[part(TmpDataP)]
    pub tmp_data: TmpData,
    #[part(TrailP)]
    pub trail: Trail,
    #[part(VsidsP)]
    pub vsids: Vsids,
    #[part(WatchesP)]
    pub watches: Watches,
}

/// Update structures for a new variable count.
pub fn set_var_count(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
        mut AssignmentP,
        mut ImplGraphP,
        mut TmpDataP,
        mut VsidsP,
        mut WatchesP,
    ),
    count: usize,
) {
    ctx.part_mut(AnalyzeP).set_var_count(count);
    ctx.part_mut(AssignmentP).set_var_count(count);
    ctx.part_mut(ImplGraphP).set_var_count(count);
    ctx.part_mut(TmpDataP).set_var_count(count);
    ctx.part_mut(VsidsP).set_var_count(count);
    ctx.part_mut(WatchesP).set_var_count(count);
}

/// Number of variables the solver structures are sized for.
pub fn var_count(ctx: partial!(Context, AssignmentP)) -> usize {
    ctx.part(AssignmentP).var_count()
}

/// The solver configuration has changed.
pub fn config_changed(
    mut ctx: partial!(
        Context,
        mut ArenaP,
        mut AssignmentP,
        mut ClauseActivityP,
        mut ScheduleP,
        mut VsidsP,
        ConfigP,
    ),
) {
    let (config, mut ctx) = ctx.split_part(ConfigP);
    ctx.part_mut(VsidsP).set_decay(config.vsids_decay);
    ctx.part_mut(ClauseActivityP)
        .set_decay(config.clause_activity_decay);
    ctx.part_mut(AssignmentP)
        .set_default_phase(config.default_phase);
    ctx.part_mut(ScheduleP).config_changed(config);
    ctx.part_mut(ArenaP).configure(
        config.arena_min_segment_words,
        config.arena_grow_mult,
        config.arena_high_utilization,
        config.arena_slack,
    );
}
