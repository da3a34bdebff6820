//! Scheduling of restarts, clause database reductions and arena consolidations.
//!
//! Restarts follow the dynamic policy of Glucose: two exponential moving averages of the glue
//! levels of learnt clauses are maintained, a short term and a long term one. When the short term
//! average exceeds the long term average the recently learnt clauses are unusually bad, so the
//! search is restarted. When the trail grows well past its own long term average the search is
//! likely close to a model and a pending restart is blocked instead.
use log::info;

use partial_ref::{partial, PartialRef};

use crate::cdcl::conflict_step;
use crate::clause::{gc, reduce};
use crate::config::SolverConfig;
use crate::context::{parts::*, Context};
use crate::errors::SolverError;
use crate::prop::restart;
use crate::state::SatState;

/// An exponential moving average.
pub struct Ema {
    value: f64,
    alpha: f64,
}

impl Ema {
    /// Create an average roughly covering the given window of samples.
    pub fn new(window: u64) -> Ema {
        Ema {
            value: 0.0,
            alpha: 2.0 / (window as f64 + 1.0),
        }
    }

    /// Add a sample to the average.
    pub fn update(&mut self, sample: f64) {
        self.value += self.alpha * (sample - self.value);
    }

    /// Change the window, keeping the current value.
    pub fn set_window(&mut self, window: u64) {
        self.alpha = 2.0 / (window as f64 + 1.0);
    }

    /// The current value of the average.
    pub fn value(&self) -> f64 {
        self.value
    }
}

/// Scheduling state for restarts, reductions and consolidations.
pub struct Schedule {
    /// Total number of recorded conflicts.
    conflicts: u64,
    /// Conflicts since the last restart, reset when a restart is blocked.
    conflicts_since_restart: u64,
    /// Short term average glue of learnt clauses.
    glue_short: Ema,
    /// Long term average glue of learnt clauses.
    glue_long: Ema,
    /// Long term average trail size at conflicts.
    trail_size: Ema,
    /// Current bound for the number of retained redundant clauses.
    max_learnt: f64,
    /// Conflict count of the last progress log message.
    last_log: u64,
}

impl Default for Schedule {
    fn default() -> Schedule {
        let config = SolverConfig::default();
        Schedule {
            conflicts: 0,
            conflicts_since_restart: 0,
            glue_short: Ema::new(config.glue_short_window),
            glue_long: Ema::new(config.glue_long_window),
            trail_size: Ema::new(config.glue_long_window),
            max_learnt: config.max_learnt_base,
            last_log: u64::max_value(),
        }
    }
}

impl Schedule {
    /// Record the glue of a learnt clause and the trail size at the conflict.
    pub fn note_conflict(&mut self, glue: usize, trail_size: usize, config: &SolverConfig) {
        self.conflicts += 1;
        self.conflicts_since_restart += 1;

        self.glue_short.update(glue as f64);
        self.glue_long.update(glue as f64);

        // Blocking needs a warmed up trail average to be meaningful.
        if self.conflicts > config.glue_long_window
            && self.conflicts_since_restart >= config.restart_min_conflicts
            && trail_size as f64 > config.restart_block_factor * self.trail_size.value()
        {
            // The assignment is much larger than usual, block the pending restart.
            self.conflicts_since_restart = 0;
        }

        self.trail_size.update(trail_size as f64);
    }

    /// Whether the glue averages ask for a restart.
    pub fn should_restart(&self, config: &SolverConfig) -> bool {
        self.conflicts_since_restart >= config.restart_min_conflicts
            && self.glue_short.value() * config.restart_force_factor > self.glue_long.value()
    }

    /// A restart was performed.
    pub fn on_restart(&mut self) {
        self.conflicts_since_restart = 0;
    }

    /// Current bound for the number of retained redundant clauses.
    pub fn max_learnt(&self) -> usize {
        self.max_learnt as usize
    }

    /// Grow the redundant clause bound after a reduction.
    pub fn grow_max_learnt(&mut self, factor: f64) {
        self.max_learnt *= factor;
    }

    /// Apply a changed configuration.
    ///
    /// The average windows are updated in place and the redundant clause bound is reset to the
    /// configured base.
    pub fn config_changed(&mut self, config: &SolverConfig) {
        self.glue_short.set_window(config.glue_short_window);
        self.glue_long.set_window(config.glue_long_window);
        self.trail_size.set_window(config.glue_long_window);
        self.max_learnt = config.max_learnt_base;
    }
}

/// Perform one step of the schedule.
///
/// Returns `false` when the solver left the unknown state and the search is finished.
pub fn schedule_step(
    mut ctx: partial!(
        Context,
        mut AnalyzeP,
        mut ArenaP,
        mut AssignmentP,
        mut ClauseActivityP,
        mut ClauseDbP,
        mut ImplGraphP,
        mut IncrementalP,
        mut RngP,
        mut ScheduleP,
        mut SolverStateP,
        mut SyncP,
        mut TmpDataP,
        mut TrailP,
        mut VsidsP,
        mut WatchesP,
        ConfigP,
    ),
) -> Result<bool, SolverError> {
    if ctx.part(SolverStateP).sat_state != SatState::Unknown {
        return Ok(false);
    }

    log_progress(ctx.borrow());

    if ctx.part(ScheduleP).should_restart(ctx.part(ConfigP)) {
        restart(ctx.borrow());
        ctx.part_mut(SolverStateP).stats.restarts += 1;
        ctx.part_mut(ScheduleP).on_restart();

        if ctx.part(ClauseDbP).count_redundant() > ctx.part(ScheduleP).max_learnt() {
            reduce::reduce_db(ctx.borrow());
            let factor = ctx.part(ConfigP).max_learnt_factor;
            ctx.part_mut(ScheduleP).grow_max_learnt(factor);
        }

        gc::collect_garbage(ctx.borrow());
    }

    conflict_step(ctx.borrow())?;

    Ok(ctx.part(SolverStateP).sat_state == SatState::Unknown)
}

fn log_progress(
    mut ctx: partial!(
        Context,
        mut ScheduleP,
        AssignmentP,
        ClauseDbP,
        ConfigP,
        SolverStateP,
        TrailP,
    ),
) {
    let conflicts = ctx.part(SolverStateP).stats.conflicts;
    let interval = ctx.part(ConfigP).log_interval;

    let schedule = ctx.part_mut(ScheduleP);
    if interval == 0 || conflicts == 0 || conflicts % interval != 0 || schedule.last_log == conflicts
    {
        return;
    }
    schedule.last_log = conflicts;

    let stats = &ctx.part(SolverStateP).stats;
    let db = ctx.part(ClauseDbP);
    let units = ctx.part(TrailP).top_level_assignments().len();
    info!(
        "confl: {}k rest: {} vars: {} bin: {} tri: {} irred: {} red: {}",
        stats.conflicts / 1000,
        stats.restarts,
        ctx.part(AssignmentP).var_count() - units,
        db.count_binary(),
        db.count_ternary(),
        db.count_original(),
        db.count_redundant(),
    );
}
