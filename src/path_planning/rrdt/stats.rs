/// Counters of one planning run, reset at the start of [`crate::PathPlanner::plan`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerStats {
    /// Candidates proposed by the sampler
    pub sampled: usize,
    /// Candidates inside an obstacle
    pub invalid_obstacle: usize,
    /// Steered segments that crossed an obstacle
    pub invalid_path: usize,
    /// Nodes attached to some tree
    pub added: usize,
    pub merges: usize,
    pub restarts: usize,
    /// Restarts that landed next to an existing tree
    pub folds: usize,
}

impl PlannerStats {
    pub fn reset(&mut self) {
        *self = PlannerStats::default();
    }

    pub fn invalid(&self) -> usize {
        self.invalid_obstacle + self.invalid_path
    }
}
