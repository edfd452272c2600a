//! Node arena shared by every tree.
//!
//! Nodes never move once pushed, so a [`NodeId`] stays valid for the whole
//! planning run even when the node migrates from a disjoint tree into root.

use std::ops::{Index, IndexMut};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use super::tree::TreeId;
use crate::common::Point2D;

/// Stable handle of a node in the [`NodeArena`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub pos: Point2D,
    /// Path cost from the start; only meaningful inside the root tree
    pub cost: f64,
    /// Root-tree parent
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    /// Undirected neighbours, used by disjoint trees only
    pub edges: Vec<NodeId>,
    /// Owning tree, `None` while the node is not attached anywhere
    pub tree: Option<TreeId>,
}

impl Node {
    pub fn new(pos: Point2D) -> Self {
        Node {
            pos,
            cost: 0.0,
            parent: None,
            children: Vec::new(),
            edges: Vec::new(),
            tree: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pos: Point2D) -> NodeId {
        self.nodes.push(Node::new(pos));
        NodeId(self.nodes.len() - 1)
    }

    pub(crate) fn push_node(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Remove `id` again if it is the most recent node and nothing references it
    pub fn discard_orphan(&mut self, id: NodeId) -> bool {
        let removable = id.0 + 1 == self.nodes.len()
            && self.nodes[id.0].tree.is_none()
            && self.nodes[id.0].edges.is_empty()
            && self.nodes[id.0].children.is_empty();
        if removable {
            self.nodes.pop();
        }
        removable
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> + '_ {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn pos(&self, id: NodeId) -> Point2D {
        self.nodes[id.0].pos
    }

    pub fn distance(&self, a: NodeId, b: NodeId) -> f64 {
        self.pos(a).distance(&self.pos(b))
    }

    /// Nearest node to `p` among `candidates`
    pub fn nearest(&self, candidates: &[NodeId], p: &Point2D) -> Option<NodeId> {
        candidates
            .iter()
            .copied()
            .min_by_key(|&id| OrderedFloat(self.pos(id).distance(p)))
    }

    /// Add an undirected edge between `a` and `b`
    pub fn link_edge(&mut self, a: NodeId, b: NodeId) {
        self.nodes[a.0].edges.push(b);
        self.nodes[b.0].edges.push(a);
    }

    /// Release the edge list of a node that now lives in the root tree
    pub fn clear_edges(&mut self, id: NodeId) {
        self.nodes[id.0].edges = Vec::new();
    }

    /// Make `parent` the parent of `child` and set `child.cost` accordingly.
    ///
    /// The child is unregistered from its previous parent. Descendant costs are
    /// left untouched; call [`NodeArena::propagate_cost`] afterwards when the
    /// child already has a subtree.
    pub fn set_parent(&mut self, child: NodeId, parent: NodeId) {
        if let Some(old) = self.nodes[child.0].parent {
            self.nodes[old.0].children.retain(|&c| c != child);
        }
        let cost = self.nodes[parent.0].cost + self.distance(parent, child);
        let node = &mut self.nodes[child.0];
        node.parent = Some(parent);
        node.cost = cost;
        self.nodes[parent.0].children.push(child);
    }

    /// Recompute the cost of every descendant of `from`
    pub fn propagate_cost(&mut self, from: NodeId) {
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            let parent_cost = self.nodes[id.0].cost;
            let parent_pos = self.nodes[id.0].pos;
            let children = self.nodes[id.0].children.clone();
            for child in children {
                let node = &mut self.nodes[child.0];
                node.cost = parent_cost + parent_pos.distance(&node.pos);
                stack.push(child);
            }
        }
    }

    /// Node ids from the tree root down to `id`, following parent links.
    ///
    /// Returns `None` if the walk does not terminate within `len()` steps.
    pub fn path_from_root(&self, id: NodeId) -> Option<Vec<NodeId>> {
        let mut chain = vec![id];
        let mut current = id;
        while let Some(parent) = self.nodes[current.0].parent {
            if chain.len() > self.nodes.len() {
                return None;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        Some(chain)
    }
}

impl Index<NodeId> for NodeArena {
    type Output = Node;

    fn index(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }
}

impl IndexMut<NodeId> for NodeArena {
    fn index_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(arena: &mut NodeArena, xs: &[f64]) -> Vec<NodeId> {
        let ids: Vec<NodeId> = xs.iter().map(|&x| arena.push(Point2D::new(x, 0.0))).collect();
        for w in ids.windows(2) {
            arena.set_parent(w[1], w[0]);
        }
        ids
    }

    #[test]
    fn test_set_parent_updates_cost_and_children() {
        let mut arena = NodeArena::new();
        let ids = chain(&mut arena, &[0.0, 3.0, 7.0]);

        assert_eq!(arena[ids[2]].cost, 7.0);
        assert_eq!(arena[ids[0]].children, vec![ids[1]]);
        assert_eq!(arena[ids[2]].parent, Some(ids[1]));
    }

    #[test]
    fn test_reparent_and_propagate() {
        let mut arena = NodeArena::new();
        let ids = chain(&mut arena, &[0.0, 3.0, 7.0, 9.0]);
        // detour node, then pull ids[2] under it
        let detour = arena.push(Point2D::new(0.0, 4.0));
        arena.set_parent(detour, ids[0]);
        arena.set_parent(ids[2], detour);
        arena.propagate_cost(ids[2]);

        let expected = 4.0 + 65.0_f64.sqrt();
        assert!((arena[ids[2]].cost - expected).abs() < 1e-10);
        assert!((arena[ids[3]].cost - (expected + 2.0)).abs() < 1e-10);
        assert!(arena[ids[1]].children.is_empty());
        assert_eq!(arena[detour].children, vec![ids[2]]);
    }

    #[test]
    fn test_nearest_and_path_from_root() {
        let mut arena = NodeArena::new();
        let ids = chain(&mut arena, &[0.0, 5.0, 10.0]);

        assert_eq!(arena.nearest(&ids, &Point2D::new(6.0, 1.0)), Some(ids[1]));
        assert_eq!(arena.nearest(&[], &Point2D::origin()), None);
        assert_eq!(arena.path_from_root(ids[2]), Some(ids.clone()));
    }

    #[test]
    fn test_discard_orphan_only_removes_last_free_node() {
        let mut arena = NodeArena::new();
        let a = arena.push(Point2D::origin());
        let b = arena.push(Point2D::new(1.0, 0.0));
        assert!(!arena.discard_orphan(a));
        assert!(arena.discard_orphan(b));
        assert_eq!(arena.len(), 1);
    }
}
