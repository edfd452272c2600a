//! RRdT* planner: particle-guided disjoint trees merged into an RRT* root tree.
//!
//! Each [`RrdtPlanner::plan_step`] runs one cycle: the sampler proposes a
//! candidate, the planner steers it from the tree it belongs to and checks it
//! for collisions, the node is attached to that tree, and finally the node is
//! probed against every other tree so that touching trees merge.

use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use super::insertion;
use super::node::NodeId;
use super::particle::Particle;
use super::sampler::{self, Candidate, Proposal, Sampler, SamplingContext};
use super::snapshot::TreeSnapshot;
use super::stats::PlannerStats;
use super::tree::TreeId;
use super::trees_manager::{GoalRegion, TreeEdge, TreesManager};
use crate::common::{
    AreaBounds, CollisionChecker, FreeSpaceSampler, Path2D, PathPlanner, PlannerError, PlannerResult, Point2D,
    Visualizable,
};
use crate::config::PlannerConfig;
use crate::mapping::UniformFreeSpace;
use crate::utils::{colors, PathStyle, PointStyle, Visualizer};

/// What a single planning step achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// A node was attached; `tree` owns it after any merges
    Added { node: NodeId, tree: TreeId },
    /// The steered segment crossed an obstacle
    Blocked,
    /// A particle restart attached a node instead of sampling
    TopologyChanged,
    /// No progress, see the log for the reason
    Skipped,
}

pub struct RrdtPlanner<C: CollisionChecker> {
    config: PlannerConfig,
    start: Point2D,
    goal: Point2D,
    bounds: AreaBounds,
    cc: C,
    free_space: Box<dyn FreeSpaceSampler>,
    trees: TreesManager,
    sampler: Box<dyn Sampler>,
    rng: StdRng,
    stats: PlannerStats,
    rejections: usize,
}

impl<C: CollisionChecker> RrdtPlanner<C> {
    /// Planner sampling free space uniformly inside `bounds`
    pub fn new(start: Point2D, goal: Point2D, bounds: AreaBounds, cc: C, config: PlannerConfig) -> PlannerResult<Self> {
        let free_space = UniformFreeSpace::new(bounds).with_warn_after(config.stall_warn_after);
        Self::with_free_space_sampler(start, goal, bounds, cc, Box::new(free_space), config)
    }

    pub fn with_free_space_sampler(
        start: Point2D,
        goal: Point2D,
        bounds: AreaBounds,
        cc: C,
        free_space: Box<dyn FreeSpaceSampler>,
        config: PlannerConfig,
    ) -> PlannerResult<Self> {
        config.validate()?;
        if !cc.is_free(start) {
            return Err(PlannerError::InvalidParameter(format!(
                "start ({}, {}) is not in free space",
                start.x, start.y
            )));
        }
        if !cc.is_free(goal) {
            return Err(PlannerError::InvalidParameter(format!(
                "goal ({}, {}) is not in free space",
                goal.x, goal.y
            )));
        }

        let mut trees = TreesManager::new(
            start,
            GoalRegion::new(goal, config.goal_radius),
            config.connection_radius,
            config.particles.merge_policy,
            insertion::build(config.insertion),
        );
        let mut rng = StdRng::seed_from_u64(config.seed);
        let mut stats = PlannerStats::default();
        let sampler = {
            let mut ctx = SamplingContext {
                trees: &mut trees,
                cc: &cc,
                free_space: free_space.as_ref(),
                rng: &mut rng,
                stats: &mut stats,
            };
            sampler::build(&config, start, goal, &mut ctx)?
        };

        Ok(RrdtPlanner {
            config,
            start,
            goal,
            bounds,
            cc,
            free_space,
            trees,
            sampler,
            rng,
            stats,
            rejections: 0,
        })
    }

    /// Advance the search by one sample
    pub fn plan_step(&mut self) -> StepOutcome {
        let candidate = match self.next_free_candidate() {
            Ok(Some(c)) => c,
            Ok(None) => return StepOutcome::TopologyChanged,
            Err(e) => {
                warn!("sampler failed: {}", e);
                return StepOutcome::Skipped;
            }
        };

        // the remembered node already reaches the walk target; otherwise steer from the nearest one
        let (from, target) = match candidate.last_node {
            Some(n) => (n, candidate.pos),
            None => match self.trees.nearest_in_tree(candidate.tree, &candidate.pos) {
                Some(n) => (
                    n,
                    self.trees.arena().pos(n).step_towards(&candidate.pos, self.config.epsilon),
                ),
                None => {
                    warn!("{:?} has no node to steer from", candidate.tree);
                    return StepOutcome::Skipped;
                }
            },
        };

        if !self.cc.path_is_free(self.trees.arena().pos(from), target) {
            self.stats.invalid_path += 1;
            self.sampler.report_failure(&candidate, &mut self.rng);
            self.note_rejection();
            return StepOutcome::Blocked;
        }
        self.rejections = 0;

        let node = self.trees.add_node(target);
        if let Err(e) = self.trees.connect_two_nodes(node, Some(from), candidate.tree, &self.cc) {
            warn!("could not connect new node to {:?}: {}", candidate.tree, e);
            self.trees.discard_orphan(node);
            return StepOutcome::Skipped;
        }
        self.stats.added += 1;
        self.sampler.report_success(&candidate, node, target);

        let attachment = self.trees.add_pos_to_existing_tree(node, Some(candidate.tree), &self.cc);
        for report in &attachment.merges {
            self.stats.merges += 1;
            self.sampler.apply_merge(report);
        }
        StepOutcome::Added {
            node,
            tree: attachment.tree.unwrap_or(candidate.tree),
        }
    }

    /// Ask the sampler until it yields a point in free space; `None` on a topology change
    fn next_free_candidate(&mut self) -> PlannerResult<Option<Candidate>> {
        loop {
            let proposal = {
                let mut ctx = SamplingContext {
                    trees: &mut self.trees,
                    cc: &self.cc,
                    free_space: self.free_space.as_ref(),
                    rng: &mut self.rng,
                    stats: &mut self.stats,
                };
                self.sampler.propose(&mut ctx)?
            };
            let candidate = match proposal {
                Proposal::Candidate(c) => c,
                Proposal::TopologyChanged => return Ok(None),
            };

            self.stats.sampled += 1;
            if self.cc.is_free(candidate.pos) {
                return Ok(Some(candidate));
            }
            self.stats.invalid_obstacle += 1;
            self.sampler.report_failure(&candidate, &mut self.rng);
            self.note_rejection();
        }
    }

    fn note_rejection(&mut self) {
        self.rejections += 1;
        if self.rejections == self.config.stall_warn_after {
            warn!(
                "sampling stalled: {} consecutive candidates rejected ({} nodes so far)",
                self.rejections,
                self.trees.node_count()
            );
        }
    }

    /// Start-to-goal positions of the cheapest solution, empty while unsolved
    pub fn get_best_path(&self) -> Path2D {
        self.trees.best_path()
    }

    /// `f64::INFINITY` while there is no solution
    pub fn incumbent_cost(&self) -> f64 {
        self.trees.incumbent_cost()
    }

    pub fn edges(&self) -> Vec<TreeEdge> {
        self.trees.edges()
    }

    pub fn disjoint_tree_count(&self) -> usize {
        self.trees.disjoint_count()
    }

    pub fn node_count(&self) -> usize {
        self.trees.node_count()
    }

    pub fn trees(&self) -> &TreesManager {
        &self.trees
    }

    pub fn particles(&self) -> &[Particle] {
        self.sampler.particles()
    }

    pub fn energies(&self) -> &[f64] {
        self.sampler.energies()
    }

    pub fn stats(&self) -> &PlannerStats {
        &self.stats
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    pub fn collision_checker(&self) -> &C {
        &self.cc
    }

    pub fn start(&self) -> Point2D {
        self.start
    }

    pub fn goal(&self) -> Point2D {
        self.goal
    }

    pub fn snapshot(&self) -> TreeSnapshot {
        self.trees.snapshot()
    }
}

impl<C: CollisionChecker> PathPlanner for RrdtPlanner<C> {
    fn plan(&mut self, max_iter: usize) -> PlannerResult<Path2D> {
        self.stats.reset();
        for _ in 0..max_iter {
            self.plan_step();
        }

        info!(
            "planned {} iterations: {} nodes, {} disjoint trees, {} merges, cost {:.3}",
            max_iter,
            self.node_count(),
            self.disjoint_tree_count(),
            self.stats.merges,
            self.incumbent_cost()
        );
        let path = self.get_best_path();
        if path.is_empty() {
            return Err(PlannerError::PlanningError(format!(
                "goal not reached after {} iterations",
                max_iter
            )));
        }
        Ok(path)
    }
}

impl<C: CollisionChecker> Visualizable for RrdtPlanner<C> {
    fn visualize(&self, vis: &mut Visualizer) {
        vis.set_x_range(self.bounds.xmin, self.bounds.xmax)
            .set_y_range(self.bounds.ymin, self.bounds.ymax);

        let (root_edges, disjoint_edges): (Vec<TreeEdge>, Vec<TreeEdge>) =
            self.edges().into_iter().partition(|e| e.tree.is_root());
        let segments = |edges: &[TreeEdge]| edges.iter().map(|e| (e.from, e.to)).collect::<Vec<_>>();
        vis.plot_segments(
            &segments(&disjoint_edges),
            &PathStyle::new(colors::DISJOINT_TREE, "Disjoint trees").with_line_width(1.0),
        );
        vis.plot_segments(
            &segments(&root_edges),
            &PathStyle::new(colors::ROOT_TREE, "Root tree").with_line_width(1.0),
        );

        let particles: Vec<Point2D> = self.particles().iter().map(|p| p.pos).collect();
        if !particles.is_empty() {
            vis.plot_points(&particles, &PointStyle::new(colors::PARTICLE, "Particles").with_symbol('T'));
        }

        let path = self.get_best_path();
        if !path.is_empty() {
            vis.plot_path(&path, &PathStyle::default().with_line_width(2.5));
        }
        vis.plot_start(self.start).plot_goal(self.goal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MergePolicy, SamplerKind};
    use crate::mapping::CircleWorld;

    fn scenario_config(seed: u64) -> PlannerConfig {
        PlannerConfig {
            seed,
            ..PlannerConfig::default()
        }
    }

    fn create_planner(world: CircleWorld, config: PlannerConfig) -> RrdtPlanner<CircleWorld> {
        let bounds = *world.bounds();
        RrdtPlanner::new(Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0), bounds, world, config).unwrap()
    }

    fn open_corridor() -> CircleWorld {
        CircleWorld::empty(AreaBounds::new(-10.0, 110.0, -20.0, 20.0))
    }

    /// Run until solved, recording the cost after every step
    fn run_until_solved(planner: &mut RrdtPlanner<CircleWorld>, max_steps: usize) -> Vec<f64> {
        let mut costs = Vec::new();
        for _ in 0..max_steps {
            planner.plan_step();
            costs.push(planner.incumbent_cost());
            if planner.node_count() >= 30 && planner.incumbent_cost().is_finite() {
                break;
            }
        }
        costs
    }

    #[test]
    fn test_planner_rejects_blocked_start() {
        let world = CircleWorld::from_obstacles(AreaBounds::new(-10.0, 110.0, -20.0, 20.0), vec![(0.0, 0.0, 2.0)]);
        let bounds = *world.bounds();
        let result = RrdtPlanner::new(Point2D::new(0.0, 0.0), Point2D::new(100.0, 0.0), bounds, world, PlannerConfig::default());
        assert!(matches!(result, Err(PlannerError::InvalidParameter(_))));
    }

    #[test]
    fn test_open_corridor_scenario() {
        let mut planner = create_planner(open_corridor(), scenario_config(7));
        let costs = run_until_solved(&mut planner, 20_000);

        assert!(planner.node_count() >= 30);
        let path = planner.get_best_path();
        assert_eq!(path.first(), Some(&Point2D::new(0.0, 0.0)));
        assert!(path.last().unwrap().distance(&Point2D::new(100.0, 0.0)) < 10.0);
        assert!((path.total_length() - planner.incumbent_cost()).abs() < 1e-6);
        for w in costs.windows(2) {
            assert!(w[1] <= w[0]);
        }
    }

    #[test]
    fn test_cost_never_increases_after_solution() {
        let mut planner = create_planner(open_corridor(), scenario_config(3));
        run_until_solved(&mut planner, 20_000);
        let mut last = planner.incumbent_cost();
        assert!(last.is_finite());

        for _ in 0..300 {
            planner.plan_step();
            let cost = planner.incumbent_cost();
            assert!(cost <= last);
            last = cost;
        }
        assert!(planner.trees().validate().is_ok());
    }

    #[test]
    fn test_invariants_hold_every_step() {
        let world = CircleWorld::from_obstacles(
            AreaBounds::new(-10.0, 110.0, -20.0, 20.0),
            vec![(30.0, 0.0, 6.0), (60.0, 8.0, 5.0), (75.0, -10.0, 6.0)],
        );
        let mut planner = create_planner(world, scenario_config(11));
        for _ in 0..400 {
            planner.plan_step();
            assert!(planner.trees().validate().is_ok());
        }
        assert!(planner.stats().added > 0);
    }

    #[test]
    fn test_transfer_policy_keeps_invariants() {
        let mut config = scenario_config(5);
        config.particles.merge_policy = MergePolicy::Transfer;
        let mut planner = create_planner(open_corridor(), config);
        for _ in 0..400 {
            planner.plan_step();
        }
        assert!(planner.trees().validate().is_ok());
        for p in planner.particles() {
            assert!(planner.trees().contains_tree(p.tree));
        }
    }

    #[test]
    fn test_uniform_sampler_grows_root_only() {
        let mut config = scenario_config(9);
        config.sampler = SamplerKind::Uniform;
        let mut planner = create_planner(open_corridor(), config);
        let path = planner.plan(3000).unwrap();

        assert_eq!(planner.disjoint_tree_count(), 0);
        assert!(planner.particles().is_empty());
        assert_eq!(path.first(), Some(&Point2D::new(0.0, 0.0)));
        assert!(planner.stats().added > 0);
    }

    #[test]
    fn test_same_seed_same_run() {
        let mut a = create_planner(open_corridor(), scenario_config(21));
        let mut b = create_planner(open_corridor(), scenario_config(21));
        for _ in 0..200 {
            assert_eq!(a.plan_step(), b.plan_step());
        }
        assert_eq!(a.node_count(), b.node_count());
        assert_eq!(a.get_best_path(), b.get_best_path());
    }

    #[test]
    fn test_visualize_adds_layers() {
        let mut planner = create_planner(open_corridor(), scenario_config(1));
        for _ in 0..50 {
            planner.plan_step();
        }
        let mut vis = Visualizer::new();
        planner.visualize(&mut vis);
        assert!(vis.layer_count() >= 3);
    }
}
