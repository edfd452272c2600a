//! RRdT*: RRT* whose exploration is driven by particles growing disjoint trees.
//!
//! Nodes live in one [`node::NodeArena`]; the [`trees_manager::TreesManager`]
//! partitions them into the root tree and any number of disjoint trees and
//! merges trees as soon as they touch. [`planner::RrdtPlanner`] ties the
//! sampler, the collision checker and the trees together.

pub mod bfs;
pub mod disjoint_sampler;
pub mod insertion;
pub mod node;
pub mod particle;
pub mod planner;
pub mod sampler;
pub mod snapshot;
pub mod stats;
pub mod tree;
pub mod trees_manager;

pub use disjoint_sampler::{DisjointParticleSampler, RestartOutcome};
pub use insertion::{InsertionStrategy, NearestParentInsertion, RrtStarInsertion};
pub use node::{Node, NodeArena, NodeId};
pub use particle::{EnergyUpdate, Particle, ParticleId, ParticleManager};
pub use planner::{RrdtPlanner, StepOutcome};
pub use sampler::{Candidate, Proposal, Sampler, SamplingContext, UniformSampler};
pub use snapshot::{NodeRecord, TreeRecord, TreeSnapshot};
pub use stats::PlannerStats;
pub use tree::{Tree, TreeId, TreeKind};
pub use trees_manager::{Attachment, GoalRegion, MergeReport, TreeEdge, TreesManager};
