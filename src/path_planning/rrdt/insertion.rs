//! Root-tree insertion strategies.
//!
//! Both strategies keep `cost == parent.cost + distance(parent, node)` for every
//! root node; only RRT* searches for a cheaper parent and rewires neighbours.

use std::fmt;

use super::node::{NodeArena, NodeId};
use crate::common::{CollisionChecker, PlannerError, PlannerResult};
use crate::config::InsertionKind;

pub trait InsertionStrategy: fmt::Debug {
    /// Attach `new` below a node of `root_nodes` and return the chosen parent.
    ///
    /// `guess` is a root node already known to reach `new` through free space.
    /// `root_nodes` must not contain `new` yet.
    fn insert(
        &self,
        arena: &mut NodeArena,
        root_nodes: &[NodeId],
        new: NodeId,
        guess: Option<NodeId>,
        radius: f64,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<NodeId>;
}

pub fn build(kind: InsertionKind) -> Box<dyn InsertionStrategy> {
    match kind {
        InsertionKind::RrtStar => Box::new(RrtStarInsertion),
        InsertionKind::NearestParent => Box::new(NearestParentInsertion),
    }
}

/// Use `guess`, or fall back to the nearest root node when its segment is free
fn resolve_guess(
    arena: &NodeArena,
    root_nodes: &[NodeId],
    new: NodeId,
    guess: Option<NodeId>,
    cc: &dyn CollisionChecker,
) -> PlannerResult<NodeId> {
    if let Some(g) = guess {
        return Ok(g);
    }
    let pos = arena.pos(new);
    match arena.nearest(root_nodes, &pos) {
        Some(nn) if cc.path_is_free(arena.pos(nn), pos) => Ok(nn),
        Some(_) => Err(PlannerError::NearestNotFound(format!(
            "nearest root node to ({:.2}, {:.2}) is not reachable",
            pos.x, pos.y
        ))),
        None => Err(PlannerError::NearestNotFound("root tree is empty".to_string())),
    }
}

/// RRT*: least-cost parent within the connection radius, then rewire
#[derive(Debug, Clone, Copy, Default)]
pub struct RrtStarInsertion;

impl RrtStarInsertion {
    pub fn choose_least_cost_parent(
        arena: &mut NodeArena,
        root_nodes: &[NodeId],
        new: NodeId,
        guess: Option<NodeId>,
        radius: f64,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<NodeId> {
        let nn = resolve_guess(arena, root_nodes, new, guess, cc)?;
        let pos = arena.pos(new);

        let mut best = nn;
        let mut best_cost = arena[nn].cost + arena.distance(nn, new);
        for &p in root_nodes {
            if p == new || p == best {
                continue;
            }
            let d = arena.pos(p).distance(&pos);
            if d >= radius {
                continue;
            }
            let cost = arena[p].cost + d;
            if cost < best_cost && cc.path_is_free(arena.pos(p), pos) {
                best = p;
                best_cost = cost;
            }
        }

        arena.set_parent(new, best);
        Ok(best)
    }

    /// Re-parent neighbours of `new` that become cheaper through it
    pub fn rewire(
        arena: &mut NodeArena,
        root_nodes: &[NodeId],
        new: NodeId,
        radius: f64,
        cc: &dyn CollisionChecker,
    ) -> usize {
        let pos = arena.pos(new);
        let parent = arena[new].parent;
        let mut rewired = 0;

        for &p in root_nodes {
            if p == new || Some(p) == parent {
                continue;
            }
            let d = arena.pos(p).distance(&pos);
            if d >= radius {
                continue;
            }
            if arena[new].cost + d < arena[p].cost && cc.path_is_free(arena.pos(p), pos) {
                arena.set_parent(p, new);
                arena.propagate_cost(p);
                rewired += 1;
            }
        }
        rewired
    }
}

impl InsertionStrategy for RrtStarInsertion {
    fn insert(
        &self,
        arena: &mut NodeArena,
        root_nodes: &[NodeId],
        new: NodeId,
        guess: Option<NodeId>,
        radius: f64,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<NodeId> {
        let parent = Self::choose_least_cost_parent(arena, root_nodes, new, guess, radius, cc)?;
        Self::rewire(arena, root_nodes, new, radius, cc);
        Ok(parent)
    }
}

/// Plain RRT on the root tree: attach to the guess / nearest node, never rewire
#[derive(Debug, Clone, Copy, Default)]
pub struct NearestParentInsertion;

impl InsertionStrategy for NearestParentInsertion {
    fn insert(
        &self,
        arena: &mut NodeArena,
        root_nodes: &[NodeId],
        new: NodeId,
        guess: Option<NodeId>,
        _radius: f64,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<NodeId> {
        let parent = resolve_guess(arena, root_nodes, new, guess, cc)?;
        arena.set_parent(new, parent);
        Ok(parent)
    }
}
