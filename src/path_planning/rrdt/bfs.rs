//! Breadth-first walk over the undirected edges of a disjoint tree.

use std::collections::{HashSet, VecDeque};

use super::node::{NodeArena, NodeId};

/// Visits nodes in discovery order, restricted to a set of valid nodes.
///
/// Each item is `(node, discovered_from)`; the start node reports `None`.
pub struct BreadthFirstWalk<'a> {
    arena: &'a NodeArena,
    valid: HashSet<NodeId>,
    visited: HashSet<NodeId>,
    frontier: VecDeque<(NodeId, Option<NodeId>)>,
}

impl<'a> BreadthFirstWalk<'a> {
    pub fn new(arena: &'a NodeArena, start: NodeId, valid_nodes: &[NodeId]) -> Self {
        let mut frontier = VecDeque::new();
        frontier.push_back((start, None));
        BreadthFirstWalk {
            arena,
            valid: valid_nodes.iter().copied().collect(),
            visited: HashSet::new(),
            frontier,
        }
    }
}

impl<'a> Iterator for BreadthFirstWalk<'a> {
    type Item = (NodeId, Option<NodeId>);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some((node, from)) = self.frontier.pop_front() {
            if self.visited.contains(&node) || !self.valid.contains(&node) {
                continue;
            }
            self.visited.insert(node);
            for &next in &self.arena[node].edges {
                if !self.visited.contains(&next) {
                    self.frontier.push_back((next, Some(node)));
                }
            }
            return Some((node, from));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Point2D;

    #[test]
    fn test_walk_visits_in_discovery_order() {
        let mut arena = NodeArena::new();
        let ids: Vec<NodeId> = (0..5).map(|i| arena.push(Point2D::new(i as f64, 0.0))).collect();
        // star around ids[2], plus ids[4] hanging off ids[3]
        arena.link_edge(ids[2], ids[0]);
        arena.link_edge(ids[2], ids[1]);
        arena.link_edge(ids[2], ids[3]);
        arena.link_edge(ids[3], ids[4]);

        let order: Vec<(NodeId, Option<NodeId>)> = BreadthFirstWalk::new(&arena, ids[2], &ids).collect();
        assert_eq!(
            order,
            vec![
                (ids[2], None),
                (ids[0], Some(ids[2])),
                (ids[1], Some(ids[2])),
                (ids[3], Some(ids[2])),
                (ids[4], Some(ids[3])),
            ]
        );
    }

    #[test]
    fn test_walk_stays_inside_valid_set() {
        let mut arena = NodeArena::new();
        let a = arena.push(Point2D::new(0.0, 0.0));
        let b = arena.push(Point2D::new(1.0, 0.0));
        let outside = arena.push(Point2D::new(2.0, 0.0));
        arena.link_edge(a, b);
        arena.link_edge(b, outside);

        let visited: Vec<NodeId> = BreadthFirstWalk::new(&arena, a, &[a, b]).map(|(n, _)| n).collect();
        assert_eq!(visited, vec![a, b]);
    }
}
