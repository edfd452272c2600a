//! Particle-filter sampler that grows disjoint trees.
//!
//! Every particle performs a biased random walk from its last position and
//! proposes the next point of the tree it is bound to. Particles lose energy as
//! they keep succeeding; exhausted ones are restarted at a fresh free-space
//! position, where they either seed a new disjoint tree or, when the position is
//! within reach of an existing tree, fold into it.

use std::f64::consts::PI;

use log::debug;
use rand::Rng;
use rand_distr::{Distribution, Normal};

use super::node::NodeId;
use super::particle::{Particle, ParticleId, ParticleManager};
use super::sampler::{Candidate, Proposal, Sampler, SamplingContext};
use super::tree::TreeId;
use super::trees_manager::MergeReport;
use crate::common::{PlannerError, PlannerResult, Point2D};
use crate::config::{MergePolicy, PlannerConfig};

/// Result of restarting one particle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartOutcome {
    /// The particle now grows the given tree, freshly seeded at its position
    Continued(TreeId),
    /// The restart position was attached to an existing tree
    FoldedIntoTree(TreeId),
}

#[derive(Debug)]
pub struct DisjointParticleSampler {
    particles: ParticleManager,
    walk_noise: Normal<f64>,
    since_sweep: usize,
    goal: Point2D,
    step: f64,
    goal_bias: f64,
}

impl DisjointParticleSampler {
    /// One particle starts on the root tree, every other one seeds its own disjoint tree
    pub fn new(
        config: &PlannerConfig,
        start: Point2D,
        goal: Point2D,
        ctx: &mut SamplingContext<'_>,
    ) -> PlannerResult<Self> {
        let settings = config.particles.clone();
        let walk_noise = Normal::new(0.0, settings.walk_direction_std)
            .map_err(|e| PlannerError::InvalidParameter(format!("walk_direction_std: {}", e)))?;
        let step = config.epsilon * settings.walk_step_factor;
        let num_particles = settings.num_particles;

        let mut sampler = DisjointParticleSampler {
            particles: ParticleManager::new(settings),
            walk_noise,
            since_sweep: 0,
            goal,
            step,
            goal_bias: config.goal_bias,
        };

        let root_particle = sampler.particles.spawn(start, ctx.rng.gen_range(0.0..2.0 * PI), TreeId::ROOT);
        ctx.trees.bind_particle(TreeId::ROOT, root_particle);

        for _ in 1..num_particles {
            let pos = ctx.free_space.sample_free(ctx.cc, &mut *ctx.rng);
            let node = ctx.trees.add_node(pos);
            let tree = ctx.trees.spawn_disjoint_tree(node)?;
            let id = sampler.particles.spawn(pos, ctx.rng.gen_range(0.0..2.0 * PI), tree);
            ctx.trees.bind_particle(tree, id);
        }
        debug!(
            "{} particles initialised, {} disjoint trees",
            sampler.particles.len(),
            ctx.trees.disjoint_count()
        );
        Ok(sampler)
    }

    pub fn particle_manager(&self) -> &ParticleManager {
        &self.particles
    }

    /// Move `id` to a random free position and rebind it.
    ///
    /// Under [`MergePolicy::RestartOnMerge`] a fold leaves the particle untouched
    /// and still pending; the caller decides when to retry.
    pub fn restart_particle(
        &mut self,
        id: ParticleId,
        ctx: &mut SamplingContext<'_>,
    ) -> PlannerResult<RestartOutcome> {
        ctx.stats.restarts += 1;
        let pos = ctx.free_space.sample_free(ctx.cc, &mut *ctx.rng);
        let node = ctx.trees.add_node(pos);
        let attachment = ctx.trees.add_pos_to_existing_tree(node, None, ctx.cc);
        for report in &attachment.merges {
            ctx.stats.merges += 1;
            self.apply_merge(report);
        }

        let old_tree = self.particles.get(id).tree;
        let dir = ctx.rng.gen_range(0.0..2.0 * PI);
        let (tree, outcome) = match attachment.tree {
            Some(tree) => {
                ctx.stats.folds += 1;
                if ctx.trees.merge_policy() == MergePolicy::RestartOnMerge {
                    self.particles.get_mut(id).last_node = None;
                    debug!("restart of {:?} folded into {:?}, deferring", id, tree);
                    return Ok(RestartOutcome::FoldedIntoTree(tree));
                }
                (tree, RestartOutcome::FoldedIntoTree(tree))
            }
            None => {
                let tree = ctx.trees.spawn_disjoint_tree(node)?;
                (tree, RestartOutcome::Continued(tree))
            }
        };

        ctx.trees.unbind_particle(old_tree, id);
        self.particles.reset(id, pos, dir, tree);
        ctx.trees.bind_particle(tree, id);
        debug!("{:?} restarted at ({:.1}, {:.1}) on {:?}", id, pos.x, pos.y, tree);
        Ok(outcome)
    }

    /// Drain the restart queue; `false` when a fold interrupted it
    fn restart_pending(&mut self, ctx: &mut SamplingContext<'_>) -> PlannerResult<bool> {
        while let Some(id) = self.particles.next_pending_restart() {
            match self.restart_particle(id, ctx)? {
                RestartOutcome::FoldedIntoTree(_) if ctx.trees.merge_policy() == MergePolicy::RestartOnMerge => {
                    return Ok(false);
                }
                _ => self.particles.finish_restart(id),
            }
        }
        Ok(true)
    }

    /// Next position of a particle's random walk
    fn random_walk(&mut self, id: ParticleId, ctx: &mut SamplingContext<'_>) -> Point2D {
        let p = self.particles.get(id);
        let heading = if ctx.rng.gen::<f64>() < self.goal_bias {
            p.pos.angle_to(&self.goal)
        } else {
            p.dir + self.walk_noise.sample(&mut *ctx.rng)
        };
        let pos = p.pos.offset(heading, self.step);
        self.particles.get_mut(id).try_new_pos(pos, heading);
        pos
    }
}

impl Sampler for DisjointParticleSampler {
    fn propose(&mut self, ctx: &mut SamplingContext<'_>) -> PlannerResult<Proposal> {
        self.since_sweep += 1;
        if self.since_sweep > self.particles.settings().restart_every {
            self.since_sweep = 0;
            let exhausted = self.particles.sweep_low_energy();
            if exhausted > 0 {
                debug!("{} exhausted particle(s) queued for restart", exhausted);
            }
        }

        if !self.restart_pending(ctx)? {
            return Ok(Proposal::TopologyChanged);
        }

        let id = self
            .particles
            .choose(&mut *ctx.rng)
            .ok_or_else(|| PlannerError::PlanningError("no particles to sample from".to_string()))?;
        let pos = self.random_walk(id, ctx);
        let particle = self.particles.get(id);
        let tree = particle.tree;
        // a merge may have moved the remembered node elsewhere
        let last_node = particle
            .last_node
            .filter(|&n| ctx.trees.arena().get(n).map_or(false, |node| node.tree == Some(tree)));

        Ok(Proposal::Candidate(Candidate {
            pos,
            tree,
            last_node,
            particle: Some(id),
        }))
    }

    fn report_success(&mut self, candidate: &Candidate, node: NodeId, pos: Point2D) {
        if let Some(id) = candidate.particle {
            self.particles.report_success(id, node, pos);
        }
    }

    fn report_failure(&mut self, candidate: &Candidate, rng: &mut rand::rngs::StdRng) {
        if let Some(id) = candidate.particle {
            self.particles.report_failure(id, rng);
        }
    }

    fn apply_merge(&mut self, report: &MergeReport) {
        self.particles.apply_merge(report);
    }

    fn particles(&self) -> &[Particle] {
        self.particles.particles()
    }

    fn energies(&self) -> &[f64] {
        self.particles.energies()
    }
}
