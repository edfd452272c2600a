//! JSON save/replay of the tree forest.
//!
//! Only topology is stored: nodes as `(id, pos, cost, parent, edges)` and trees as
//! `(kind, ordered node ids)`. Particles are not part of a snapshot.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::insertion::InsertionStrategy;
use super::node::{Node, NodeArena, NodeId};
use super::tree::{Tree, TreeId, TreeKind};
use super::trees_manager::{GoalRegion, TreesManager};
use crate::common::{PlannerError, PlannerResult, Point2D};
use crate::config::MergePolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub id: usize,
    pub pos: [f64; 2],
    pub cost: f64,
    pub parent: Option<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub edges: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeRecord {
    pub kind: TreeKind,
    pub nodes: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeSnapshot {
    pub nodes: Vec<NodeRecord>,
    /// Root first, then disjoint trees in creation order
    pub trees: Vec<TreeRecord>,
}

impl TreeSnapshot {
    pub fn to_json(&self) -> PlannerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(s: &str) -> PlannerResult<Self> {
        Ok(serde_json::from_str(s)?)
    }
}

impl TreesManager {
    /// Topology of every tree; node ids are renumbered densely
    pub fn snapshot(&self) -> TreeSnapshot {
        let trees: Vec<&Tree> = std::iter::once(self.root()).chain(self.disjoint_trees()).collect();
        let index: HashMap<NodeId, usize> = trees
            .iter()
            .flat_map(|t| t.nodes.iter().copied())
            .enumerate()
            .map(|(i, id)| (id, i))
            .collect();

        let nodes = trees
            .iter()
            .flat_map(|t| t.nodes.iter().copied())
            .map(|id| {
                let node = &self.arena()[id];
                NodeRecord {
                    id: index[&id],
                    pos: node.pos.into(),
                    cost: node.cost,
                    parent: node.parent.and_then(|p| index.get(&p).copied()),
                    edges: node.edges.iter().filter_map(|e| index.get(e).copied()).collect(),
                }
            })
            .collect();

        TreeSnapshot {
            nodes,
            trees: trees
                .iter()
                .map(|t| TreeRecord {
                    kind: t.kind,
                    nodes: t.nodes.iter().map(|id| index[id]).collect(),
                })
                .collect(),
        }
    }

    /// Rebuild a manager from a snapshot, rejecting inconsistent input
    pub fn restore(
        snapshot: &TreeSnapshot,
        goal: GoalRegion,
        radius: f64,
        merge_policy: MergePolicy,
        insertion: Box<dyn InsertionStrategy>,
    ) -> PlannerResult<TreesManager> {
        let n = snapshot.nodes.len();
        let mut arena = NodeArena::new();
        for (i, record) in snapshot.nodes.iter().enumerate() {
            if record.id != i {
                return Err(PlannerError::invariant(format!("node record {} carries id {}", i, record.id)));
            }
            if let Some(bad) = record.parent.iter().chain(record.edges.iter()).find(|&&r| r >= n) {
                return Err(PlannerError::invariant(format!("node {} refers to unknown node {}", i, bad)));
            }
            let mut node = Node::new(Point2D::from(record.pos));
            node.cost = record.cost;
            node.parent = record.parent.map(NodeId);
            node.edges = record.edges.iter().copied().map(NodeId).collect();
            arena.push_node(node);
        }
        for i in 0..n {
            if let Some(p) = arena[NodeId(i)].parent {
                arena[p].children.push(NodeId(i));
            }
        }

        let mut records = snapshot.trees.iter();
        let root_record = match records.next() {
            Some(r) if r.kind == TreeKind::Root => r,
            _ => return Err(PlannerError::invariant("snapshot does not start with the root tree")),
        };
        let start = match root_record.nodes.first() {
            Some(&s) if s < n => NodeId(s),
            _ => return Err(PlannerError::invariant("root tree has no start node")),
        };

        let mut root = Tree::new_root();
        root.nodes = Self::claim_nodes(&mut arena, &root_record.nodes, TreeId::ROOT)?;
        let mut disjointed = Vec::new();
        for (i, record) in records.enumerate() {
            if record.kind != TreeKind::Disjoint {
                return Err(PlannerError::invariant("more than one root tree in snapshot"));
            }
            let id = TreeId(i + 1);
            let mut tree = Tree::new_disjoint(id);
            tree.nodes = Self::claim_nodes(&mut arena, &record.nodes, id)?;
            disjointed.push(tree);
        }

        let manager = TreesManager::from_parts(arena, root, disjointed, start, goal, radius, merge_policy, insertion);
        manager.validate()?;
        Ok(manager)
    }

    fn claim_nodes(arena: &mut NodeArena, ids: &[usize], tree: TreeId) -> PlannerResult<Vec<NodeId>> {
        ids.iter()
            .map(|&i| {
                let id = NodeId(i);
                match arena.get(id).map(|n| n.tree) {
                    Some(None) => {
                        arena[id].tree = Some(tree);
                        Ok(id)
                    }
                    Some(Some(other)) => Err(PlannerError::invariant(format!(
                        "node {} listed in {:?} and {:?}",
                        i, other, tree
                    ))),
                    None => Err(PlannerError::invariant(format!("tree {:?} lists unknown node {}", tree, i))),
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{AreaBounds, CollisionChecker};
    use crate::config::InsertionKind;
    use crate::mapping::CircleWorld;
    use crate::path_planning::rrdt::insertion;

    fn goal() -> GoalRegion {
        GoalRegion::new(Point2D::new(30.0, 0.0), 5.0)
    }

    fn build_forest(cc: &dyn CollisionChecker) -> TreesManager {
        let mut tm = TreesManager::new(
            Point2D::new(0.0, 0.0),
            goal(),
            15.0,
            MergePolicy::RestartOnMerge,
            insertion::build(InsertionKind::RrtStar),
        );
        let mut prev = tm.start();
        for x in &[7.0, 14.0, 21.0, 28.0] {
            let n = tm.add_node(Point2D::new(*x, 0.0));
            tm.connect_two_nodes(n, Some(prev), TreeId::ROOT, cc).unwrap();
            prev = n;
        }
        let seed = tm.add_node(Point2D::new(10.0, 30.0));
        let tree = tm.spawn_disjoint_tree(seed).unwrap();
        let other = tm.add_node(Point2D::new(16.0, 30.0));
        tm.connect_two_nodes(other, Some(seed), tree, cc).unwrap();
        tm
    }

    fn restore(snapshot: &TreeSnapshot) -> PlannerResult<TreesManager> {
        TreesManager::restore(
            snapshot,
            goal(),
            15.0,
            MergePolicy::RestartOnMerge,
            insertion::build(InsertionKind::RrtStar),
        )
    }

    #[test]
    fn test_snapshot_survives_json_and_restore() {
        let world = CircleWorld::empty(AreaBounds::new(-10.0, 50.0, -10.0, 50.0));
        let tm = build_forest(&world);
        let json = tm.snapshot().to_json().unwrap();
        let restored = restore(&TreeSnapshot::from_json(&json).unwrap()).unwrap();

        assert_eq!(restored.node_count(), tm.node_count());
        assert_eq!(restored.disjoint_count(), 1);
        assert_eq!(restored.best_path(), tm.best_path());
        assert_eq!(restored.incumbent_cost(), tm.incumbent_cost());
        assert_eq!(restored.snapshot(), tm.snapshot());
    }

    #[test]
    fn test_restored_manager_keeps_growing() {
        let world = CircleWorld::empty(AreaBounds::new(-10.0, 50.0, -10.0, 50.0));
        let mut restored = restore(&build_forest(&world).snapshot()).unwrap();

        let n = restored.add_node(Point2D::new(13.0, 24.0));
        let attachment = restored.add_pos_to_existing_tree(n, None, &world);
        assert!(attachment.tree.is_some());
        let spawned = restored.add_node(Point2D::new(45.0, 45.0));
        let id = restored.spawn_disjoint_tree(spawned).unwrap();
        assert!(restored.tree(id).is_some());
        assert!(restored.validate().is_ok());
    }

    #[test]
    fn test_node_in_two_trees_is_rejected() {
        let world = CircleWorld::empty(AreaBounds::new(-10.0, 50.0, -10.0, 50.0));
        let mut snapshot = build_forest(&world).snapshot();
        let stolen = snapshot.trees[0].nodes[1];
        snapshot.trees[1].nodes.push(stolen);

        assert!(matches!(restore(&snapshot), Err(PlannerError::InvariantViolation(_))));
    }

    #[test]
    fn test_inconsistent_cost_is_rejected() {
        let world = CircleWorld::empty(AreaBounds::new(-10.0, 50.0, -10.0, 50.0));
        let mut snapshot = build_forest(&world).snapshot();
        snapshot.nodes[2].cost += 1.0;

        assert!(matches!(restore(&snapshot), Err(PlannerError::InvariantViolation(_))));
    }

    #[test]
    fn test_garbage_json_is_serialization_error() {
        assert!(matches!(TreeSnapshot::from_json("{ nodes: 3"), Err(PlannerError::Serialization(_))));
    }
}
