//! Solver configuration.

/// Configurable parameters used during solving.
pub struct SolverConfig {
    /// Multiplicative decay for the VSIDS decision heuristic. (Default: 0.95)
    pub vsids_decay: f32,

    /// Multiplicative decay for clause activities. (Default: 0.999)
    pub clause_activity_decay: f32,

    /// Probability of deciding on a uniformly random unassigned variable instead of the most
    /// active one. (Default: 0.0)
    pub random_var_freq: f64,

    /// Polarity used when deciding on a variable that was never assigned. (Default: false)
    pub default_phase: bool,

    /// Window of the short term glue average used by the restart policy. (Default: 50)
    pub glue_short_window: u64,

    /// Window of the long term glue average used by the restart policy. (Default: 5000)
    pub glue_long_window: u64,

    /// A restart is forced when the short term glue average scaled by this factor still exceeds
    /// the long term average. (Default: 0.8)
    pub restart_force_factor: f64,

    /// A pending restart is blocked when the trail is this much longer than its long term
    /// average, as the search is likely close to a model. (Default: 1.4)
    pub restart_block_factor: f64,

    /// Minimal number of conflicts between restarts. (Default: 50)
    pub restart_min_conflicts: u64,

    /// Initial bound for the number of retained redundant clauses. (Default: 2000)
    pub max_learnt_base: f64,

    /// Growth factor for the redundant clause bound after each reduction. (Default: 1.1)
    pub max_learnt_factor: f64,

    /// Whether low glue clauses are permanently excluded from database reduction.
    /// (Default: true)
    pub protect_low_glue: bool,

    /// Glue level up to which clauses count as low glue. (Default: 2)
    pub protect_glue: u32,

    /// Redundant clauses learnt within this many conflicts before a reduction are not considered
    /// for deletion, as they had no chance to prove themselves yet. (Default: 1000)
    pub protect_young_conflicts: u64,

    /// Maximal clause size produced when cutting an xor constraint into CNF. (Default: 5)
    pub xor_cut_limit: usize,

    /// Minimal size of a clause arena segment in words. (Default: 65536)
    pub arena_min_segment_words: usize,

    /// Growth factor for new clause arena segments. (Default: 4)
    pub arena_grow_mult: usize,

    /// The arena is consolidated when the fraction of live words drops below this value.
    /// (Default: 0.7)
    pub arena_high_utilization: f64,

    /// Overallocation factor for the segments created by a consolidation. (Default: 1.2)
    pub arena_slack: f64,

    /// Number of conflicts between progress log messages. (Default: 5000)
    pub log_interval: u64,
}

impl Default for SolverConfig {
    fn default() -> SolverConfig {
        SolverConfig {
            vsids_decay: 0.95,
            clause_activity_decay: 0.999,
            random_var_freq: 0.0,
            default_phase: false,
            glue_short_window: 50,
            glue_long_window: 5000,
            restart_force_factor: 0.8,
            restart_block_factor: 1.4,
            restart_min_conflicts: 50,
            max_learnt_base: 2000.0,
            max_learnt_factor: 1.1,
            protect_low_glue: true,
            protect_glue: 2,
            protect_young_conflicts: 1000,
            xor_cut_limit: 5,
            arena_min_segment_words: 1 << 16,
            arena_grow_mult: 4,
            arena_high_utilization: 0.7,
            arena_slack: 1.2,
            log_interval: 5000,
        }
    }
}
