//! Candidate proposal strategies.
//!
//! A [`Sampler`] hands the planner a [`Candidate`] position tagged with the tree
//! it should grow, and receives success/failure feedback for it.

use std::f64::consts::PI;
use std::fmt;

use nalgebra::{Rotation2, Vector2};
use rand::rngs::StdRng;
use rand::Rng;

use super::disjoint_sampler::DisjointParticleSampler;
use super::node::NodeId;
use super::particle::{Particle, ParticleId};
use super::stats::PlannerStats;
use super::tree::TreeId;
use super::trees_manager::{MergeReport, TreesManager};
use crate::common::{CollisionChecker, FreeSpaceSampler, PlannerResult, Point2D};
use crate::config::{PlannerConfig, SamplerKind};

/// A proposed position and where it should be attached
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub pos: Point2D,
    pub tree: TreeId,
    /// Node to steer from instead of searching for the nearest one
    pub last_node: Option<NodeId>,
    /// Particle that proposed the candidate, if any
    pub particle: Option<ParticleId>,
}

impl Candidate {
    pub fn in_root(pos: Point2D) -> Self {
        Candidate {
            pos,
            tree: TreeId::ROOT,
            last_node: None,
            particle: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Proposal {
    Candidate(Candidate),
    /// A restart attached a node to an existing tree; no candidate this step
    TopologyChanged,
}

/// Planner state a sampler may use while proposing
pub struct SamplingContext<'a> {
    pub trees: &'a mut TreesManager,
    pub cc: &'a dyn CollisionChecker,
    pub free_space: &'a dyn FreeSpaceSampler,
    pub rng: &'a mut StdRng,
    pub stats: &'a mut PlannerStats,
}

pub trait Sampler: fmt::Debug {
    fn propose(&mut self, ctx: &mut SamplingContext<'_>) -> PlannerResult<Proposal>;

    /// `candidate` was attached as `node` at `pos`
    fn report_success(&mut self, candidate: &Candidate, node: NodeId, pos: Point2D);

    /// `candidate` or the segment leading to it hit an obstacle
    fn report_failure(&mut self, candidate: &Candidate, rng: &mut StdRng);

    fn apply_merge(&mut self, report: &MergeReport);

    fn particles(&self) -> &[Particle] {
        &[]
    }

    fn energies(&self) -> &[f64] {
        &[]
    }
}

/// Create the sampler selected by `config.sampler`
pub fn build(
    config: &PlannerConfig,
    start: Point2D,
    goal: Point2D,
    ctx: &mut SamplingContext<'_>,
) -> PlannerResult<Box<dyn Sampler>> {
    Ok(match config.sampler {
        SamplerKind::DisjointParticle => Box::new(DisjointParticleSampler::new(config, start, goal, ctx)?),
        SamplerKind::Uniform => Box::new(UniformSampler::new(start, goal, config.goal_bias, config.goal_radius)),
    })
}

/// Goal-biased uniform sampling for the root tree, informed once a solution exists
#[derive(Debug, Clone)]
pub struct UniformSampler {
    start: Point2D,
    goal: Point2D,
    goal_bias: f64,
    goal_radius: f64,
}

impl UniformSampler {
    pub fn new(start: Point2D, goal: Point2D, goal_bias: f64, goal_radius: f64) -> Self {
        UniformSampler {
            start,
            goal,
            goal_bias,
            goal_radius,
        }
    }

    /// Uniform point of the ellipse with foci start/goal and transverse diameter `c_max`
    pub fn informed_sample<R: Rng + ?Sized>(&self, c_max: f64, rng: &mut R) -> Point2D {
        let c_min = self.start.distance(&self.goal);
        let r1 = c_max / 2.0;
        let r2 = (c_max * c_max - c_min * c_min).max(0.0).sqrt() / 2.0;

        let center = (self.start.to_vector() + self.goal.to_vector()) / 2.0;
        let rotation = Rotation2::new(self.start.angle_to(&self.goal));
        let ball = sample_unit_ball(rng);
        Point2D::from(rotation * Vector2::new(r1 * ball.x, r2 * ball.y) + center)
    }
}

fn sample_unit_ball<R: Rng + ?Sized>(rng: &mut R) -> Vector2<f64> {
    let a: f64 = rng.gen();
    let b: f64 = rng.gen();
    let (a, b) = if b < a { (b, a) } else { (a, b) };
    if b == 0.0 {
        return Vector2::zeros();
    }
    Vector2::new(b * (2.0 * PI * a / b).cos(), b * (2.0 * PI * a / b).sin())
}

impl Sampler for UniformSampler {
    fn propose(&mut self, ctx: &mut SamplingContext<'_>) -> PlannerResult<Proposal> {
        let c_best = ctx.trees.incumbent_cost();
        let pos = if c_best.is_finite() {
            // incumbent cost plus the remaining distance bounds the cost to the goal point
            self.informed_sample(c_best + self.goal_radius, &mut *ctx.rng)
        } else if ctx.rng.gen::<f64>() < self.goal_bias {
            self.goal
        } else {
            ctx.free_space.sample_free(ctx.cc, &mut *ctx.rng)
        };
        Ok(Proposal::Candidate(Candidate::in_root(pos)))
    }

    fn report_success(&mut self, _candidate: &Candidate, _node: NodeId, _pos: Point2D) {}

    fn report_failure(&mut self, _candidate: &Candidate, _rng: &mut StdRng) {}

    fn apply_merge(&mut self, _report: &MergeReport) {}
}
