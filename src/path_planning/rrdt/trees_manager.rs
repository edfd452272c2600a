//! Root tree, disjoint trees, and the protocol that merges them.
//!
//! Only the root tree tracks path cost. A disjoint tree is a plain undirected
//! graph until it touches root, at which point every one of its nodes is
//! re-inserted into root with the configured [`InsertionStrategy`].

use std::collections::{BTreeMap, HashSet};

use itertools::Itertools;
use log::{debug, info, trace, warn};
use ordered_float::OrderedFloat;

use super::bfs::BreadthFirstWalk;
use super::insertion::InsertionStrategy;
use super::node::{NodeArena, NodeId};
use super::particle::ParticleId;
use super::tree::{Tree, TreeId, TreeKind};
use crate::common::{CollisionChecker, Path2D, PlannerError, PlannerResult, Point2D};
use crate::config::MergePolicy;

/// Target region of the planning problem
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GoalRegion {
    pub center: Point2D,
    pub radius: f64,
}

impl GoalRegion {
    pub fn new(center: Point2D, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn contains(&self, p: &Point2D) -> bool {
        self.center.distance(p) < self.radius
    }
}

/// Outcome of a successful [`TreesManager::join_trees`]
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    pub survivor: TreeId,
    pub absorbed: TreeId,
    /// Nodes that changed tree
    pub migrated_nodes: usize,
    /// Particles that were bound to the absorbed tree
    pub particles: Vec<ParticleId>,
    pub policy: MergePolicy,
}

/// Result of probing a node against every other tree
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attachment {
    /// Tree owning the node afterwards (`None`: an orphan that found no tree)
    pub tree: Option<TreeId>,
    pub merges: Vec<MergeReport>,
}

/// One drawable edge
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeEdge {
    pub from: Point2D,
    pub to: Point2D,
    pub tree: TreeId,
}

#[derive(Debug)]
pub struct TreesManager {
    arena: NodeArena,
    root: Tree,
    disjointed: BTreeMap<TreeId, Tree>,
    next_tree_id: usize,
    start: NodeId,
    radius: f64,
    merge_policy: MergePolicy,
    insertion: Box<dyn InsertionStrategy>,
    goal: GoalRegion,
    best_cost: f64,
}

impl TreesManager {
    /// Create the root tree seeded with `start`
    pub fn new(
        start: Point2D,
        goal: GoalRegion,
        radius: f64,
        merge_policy: MergePolicy,
        insertion: Box<dyn InsertionStrategy>,
    ) -> Self {
        let mut arena = NodeArena::new();
        let start_id = arena.push(start);
        arena[start_id].tree = Some(TreeId::ROOT);
        let mut root = Tree::new_root();
        root.nodes.push(start_id);

        TreesManager {
            arena,
            root,
            disjointed: BTreeMap::new(),
            next_tree_id: 1,
            start: start_id,
            radius,
            merge_policy,
            insertion,
            goal,
            best_cost: f64::INFINITY,
        }
    }

    /// Rebuild from parts already checked by the caller
    pub(crate) fn from_parts(
        arena: NodeArena,
        root: Tree,
        disjointed: Vec<Tree>,
        start: NodeId,
        goal: GoalRegion,
        radius: f64,
        merge_policy: MergePolicy,
        insertion: Box<dyn InsertionStrategy>,
    ) -> Self {
        let next_tree_id = disjointed.iter().map(|t| t.id.0 + 1).max().unwrap_or(1);
        let mut manager = TreesManager {
            arena,
            root,
            disjointed: disjointed.into_iter().map(|t| (t.id, t)).collect(),
            next_tree_id,
            start,
            radius,
            merge_policy,
            insertion,
            goal,
            best_cost: f64::INFINITY,
        };
        manager.best_cost = manager.incumbent_cost();
        manager
    }

    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    pub fn root(&self) -> &Tree {
        &self.root
    }

    pub fn start(&self) -> NodeId {
        self.start
    }

    pub fn goal(&self) -> &GoalRegion {
        &self.goal
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn merge_policy(&self) -> MergePolicy {
        self.merge_policy
    }

    pub fn disjoint_count(&self) -> usize {
        self.disjointed.len()
    }

    /// Disjoint trees in creation order
    pub fn disjoint_trees(&self) -> impl Iterator<Item = &Tree> + '_ {
        self.disjointed.values()
    }

    pub fn tree(&self, id: TreeId) -> Option<&Tree> {
        if id.is_root() {
            Some(&self.root)
        } else {
            self.disjointed.get(&id)
        }
    }

    fn tree_mut(&mut self, id: TreeId) -> Option<&mut Tree> {
        if id.is_root() {
            Some(&mut self.root)
        } else {
            self.disjointed.get_mut(&id)
        }
    }

    pub fn contains_tree(&self, id: TreeId) -> bool {
        id.is_root() || self.disjointed.contains_key(&id)
    }

    /// Number of nodes currently owned by some tree
    pub fn node_count(&self) -> usize {
        self.root.len() + self.disjointed.values().map(Tree::len).sum::<usize>()
    }

    /// Allocate a node that does not belong to any tree yet
    pub fn add_node(&mut self, pos: Point2D) -> NodeId {
        self.arena.push(pos)
    }

    /// Drop a node allocated with [`TreesManager::add_node`] that never got attached
    pub fn discard_orphan(&mut self, id: NodeId) -> bool {
        self.arena.discard_orphan(id)
    }

    /// Start a new disjoint tree from an orphan node
    pub fn spawn_disjoint_tree(&mut self, seed: NodeId) -> PlannerResult<TreeId> {
        if self.arena[seed].tree.is_some() {
            return Err(PlannerError::invariant(format!(
                "node {:?} already belongs to {:?}",
                seed, self.arena[seed].tree
            )));
        }
        let id = TreeId(self.next_tree_id);
        self.next_tree_id += 1;
        let mut tree = Tree::new_disjoint(id);
        tree.nodes.push(seed);
        self.arena[seed].tree = Some(id);
        self.disjointed.insert(id, tree);
        debug!("new disjoint tree {:?} ({} live)", id, self.disjointed.len());
        Ok(id)
    }

    pub fn bind_particle(&mut self, tree: TreeId, particle: ParticleId) -> bool {
        match self.tree_mut(tree) {
            Some(t) => {
                t.bind_particle(particle);
                true
            }
            None => false,
        }
    }

    /// Unbind from `tree`; absorbed trees are ignored
    pub fn unbind_particle(&mut self, tree: TreeId, particle: ParticleId) {
        if let Some(t) = self.tree_mut(tree) {
            t.unbind_particle(particle);
        }
    }

    pub fn nearest_in_tree(&self, tree: TreeId, p: &Point2D) -> Option<NodeId> {
        self.tree(tree).and_then(|t| self.arena.nearest(&t.nodes, p))
    }

    /// Attach `new` to `tree` next to `near`.
    ///
    /// Root gets a cost-aware insertion (`near` is only the starting guess),
    /// any other tree gets a plain undirected edge.
    pub fn connect_two_nodes(
        &mut self,
        new: NodeId,
        near: Option<NodeId>,
        tree: TreeId,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<()> {
        if tree.is_root() {
            let parent = self.insertion.insert(
                &mut self.arena,
                &self.root.nodes,
                new,
                near,
                self.radius,
                cc,
            )?;
            self.arena[new].tree = Some(TreeId::ROOT);
            self.root.nodes.push(new);
            trace!("root edge {:?} -> {:?}", parent, new);
            self.check_goal(new);
            return Ok(());
        }

        let near = near.ok_or_else(|| {
            PlannerError::NearestNotFound(format!("no neighbour given for node {:?} in {:?}", new, tree))
        })?;
        let target = self
            .disjointed
            .get_mut(&tree)
            .ok_or_else(|| PlannerError::invariant(format!("{:?} is not a live disjoint tree", tree)))?;
        target.nodes.push(new);
        self.arena.link_edge(new, near);
        self.arena[new].tree = Some(tree);
        trace!("{:?} edge {:?} -- {:?}", tree, near, new);
        Ok(())
    }

    /// Nearest node of every other tree strictly within `radius` of `node`.
    ///
    /// Disjoint trees come in creation order; root, when present, is always last so
    /// that every earlier connection is a plain edge addition and only the final
    /// one can restructure the root tree.
    pub fn find_nearest_node_from_neighbour(
        &self,
        node: NodeId,
        exclude: Option<TreeId>,
        radius: f64,
    ) -> Vec<(NodeId, TreeId)> {
        let pos = self.arena.pos(node);
        self.disjointed
            .values()
            .chain(std::iter::once(&self.root))
            .filter(|t| Some(t.id) != exclude)
            .filter_map(|t| {
                self.arena
                    .nearest(&t.nodes, &pos)
                    .filter(|&nn| self.arena.pos(nn).distance(&pos) < radius)
                    .map(|nn| (nn, t.id))
            })
            .collect()
    }

    /// Try to connect `node` to every other tree it can see.
    ///
    /// An orphan (`parent == None`) adopts the first tree it reaches; a node that
    /// already has a tree merges its tree with every reachable one.
    pub fn add_pos_to_existing_tree(
        &mut self,
        node: NodeId,
        parent: Option<TreeId>,
        cc: &dyn CollisionChecker,
    ) -> Attachment {
        let candidates = self.find_nearest_node_from_neighbour(node, parent, self.radius);
        let mut attachment = Attachment { tree: parent, merges: Vec::new() };

        for (nn, nn_tree) in candidates {
            if !cc.path_is_free(self.arena.pos(node), self.arena.pos(nn)) {
                continue;
            }
            match attachment.tree {
                None => match self.connect_two_nodes(node, Some(nn), nn_tree, cc) {
                    Ok(()) => {
                        debug!(
                            "orphan node joined {:?} with {} nodes",
                            nn_tree,
                            self.tree(nn_tree).map_or(0, Tree::len)
                        );
                        attachment.tree = Some(nn_tree);
                    }
                    Err(e) => warn!("could not attach orphan node to {:?}: {}", nn_tree, e),
                },
                Some(current) => match self.join_trees(current, nn_tree, node, nn, cc) {
                    Ok(report) => {
                        attachment.tree = Some(report.survivor);
                        attachment.merges.push(report);
                    }
                    Err(e) => warn!("skipping merge of {:?} into {:?}: {}", current, nn_tree, e),
                },
            }
        }
        attachment
    }

    /// Merge two trees that `node_a`/`node_b` connect through free space.
    ///
    /// Root survives when involved; otherwise `tree_b` absorbs `tree_a`. Nothing
    /// is modified when an invariant check fails.
    pub fn join_trees(
        &mut self,
        tree_a: TreeId,
        tree_b: TreeId,
        node_a: NodeId,
        node_b: NodeId,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<MergeReport> {
        if tree_a == tree_b {
            return Err(PlannerError::invariant(format!("cannot merge {:?} with itself", tree_a)));
        }
        for t in [tree_a, tree_b].iter() {
            if !self.contains_tree(*t) {
                return Err(PlannerError::invariant(format!(
                    "{:?} is neither root nor a live disjoint tree",
                    t
                )));
            }
        }

        let (survivor, absorbed) = if tree_a.is_root() { (tree_a, tree_b) } else { (tree_b, tree_a) };
        let (mut keep_node, mut take_node) = if tree_a.is_root() { (node_a, node_b) } else { (node_b, node_a) };
        if self.arena[keep_node].tree == Some(absorbed) || self.arena[take_node].tree == Some(survivor) {
            std::mem::swap(&mut keep_node, &mut take_node);
        }
        if self.arena[keep_node].tree != Some(survivor) || self.arena[take_node].tree != Some(absorbed) {
            return Err(PlannerError::invariant(format!(
                "nodes {:?}/{:?} do not belong to {:?}/{:?}",
                keep_node, take_node, survivor, absorbed
            )));
        }

        if survivor.is_root() {
            let report = self.join_tree_to_root(absorbed, take_node, keep_node, cc)?;
            info!(
                "{:?} joined root: {} nodes migrated, root now has {}",
                absorbed,
                report.migrated_nodes,
                self.root.len()
            );
            Ok(report)
        } else {
            let report = self.join_disjoint_trees(survivor, absorbed, keep_node, take_node)?;
            debug!("{:?} merged into {:?} ({} nodes moved)", absorbed, survivor, report.migrated_nodes);
            Ok(report)
        }
    }

    /// Disjoint trees merge by adding the bridge edge and concatenating node lists
    fn join_disjoint_trees(
        &mut self,
        survivor: TreeId,
        absorbed: TreeId,
        keep_node: NodeId,
        take_node: NodeId,
    ) -> PlannerResult<MergeReport> {
        let taken = self
            .disjointed
            .remove(&absorbed)
            .ok_or_else(|| PlannerError::invariant(format!("{:?} vanished during merge", absorbed)))?;
        self.arena.link_edge(keep_node, take_node);
        for &n in &taken.nodes {
            self.arena[n].tree = Some(survivor);
        }

        let migrated = taken.nodes.len();
        let policy = self.merge_policy;
        if let Some(target) = self.disjointed.get_mut(&survivor) {
            target.nodes.extend(taken.nodes);
            if policy == MergePolicy::Transfer {
                for &p in &taken.particles {
                    target.bind_particle(p);
                }
            }
        }
        Ok(MergeReport {
            survivor,
            absorbed,
            migrated_nodes: migrated,
            particles: taken.particles,
            policy,
        })
    }

    /// Re-insert every node of `absorbed` into root, breadth-first from `bridge_node`.
    ///
    /// `root_node` is the root-side end of the bridge and the parent guess of the
    /// first migrated node; every later node uses the neighbour it was discovered
    /// from, which is already in root by then.
    fn join_tree_to_root(
        &mut self,
        absorbed: TreeId,
        bridge_node: NodeId,
        root_node: NodeId,
        cc: &dyn CollisionChecker,
    ) -> PlannerResult<MergeReport> {
        let order: Vec<(NodeId, Option<NodeId>)> = {
            let tree = self
                .disjointed
                .get(&absorbed)
                .ok_or_else(|| PlannerError::invariant(format!("{:?} is not a live disjoint tree", absorbed)))?;
            let order: Vec<_> = BreadthFirstWalk::new(&self.arena, bridge_node, &tree.nodes).collect();
            if order.len() != tree.len() {
                return Err(PlannerError::invariant(format!(
                    "inconsistent BFS walk over {:?}: visited {} of {} nodes",
                    absorbed,
                    order.len(),
                    tree.len()
                )));
            }
            order
        };

        let taken = self
            .disjointed
            .remove(&absorbed)
            .ok_or_else(|| PlannerError::invariant(format!("{:?} vanished during merge", absorbed)))?;
        let total = order.len();
        let mut migrated = 0;

        for (i, (node, from)) in order.into_iter().enumerate() {
            let guess = from
                .or(Some(root_node))
                .filter(|&g| self.arena[g].tree == Some(TreeId::ROOT));
            self.arena[node].tree = None;
            match self.connect_two_nodes(node, guess, TreeId::ROOT, cc) {
                Ok(()) => migrated += 1,
                Err(e) => warn!("dropping node {:?} while joining root: {}", node, e),
            }
            self.arena.clear_edges(node);
            trace!("joined {}/{} nodes of {:?} into root", i + 1, total, absorbed);
        }
        trace!("bridge {:?} -- {:?} now part of root", root_node, bridge_node);

        if self.merge_policy == MergePolicy::Transfer {
            for &p in &taken.particles {
                self.root.bind_particle(p);
            }
        }
        Ok(MergeReport {
            survivor: TreeId::ROOT,
            absorbed,
            migrated_nodes: migrated,
            particles: taken.particles,
            policy: self.merge_policy,
        })
    }

    fn check_goal(&mut self, node: NodeId) {
        let n = &self.arena[node];
        if self.goal.contains(&n.pos) && n.cost < self.best_cost {
            self.best_cost = n.cost;
            info!("new solution with cost {:.3} ({} root nodes)", n.cost, self.root.len());
        }
    }

    /// Cheapest root node inside the goal region
    pub fn best_goal_node(&self) -> Option<NodeId> {
        self.root
            .nodes
            .iter()
            .copied()
            .filter(|&id| self.goal.contains(&self.arena.pos(id)))
            .min_by_key(|&id| OrderedFloat(self.arena[id].cost))
    }

    /// Cost of the best solution, `f64::INFINITY` while there is none
    pub fn incumbent_cost(&self) -> f64 {
        self.best_goal_node().map_or(f64::INFINITY, |id| self.arena[id].cost)
    }

    /// Positions from the start to the incumbent solution node
    pub fn best_path(&self) -> Path2D {
        let goal_node = match self.best_goal_node() {
            Some(id) => id,
            None => return Path2D::new(),
        };
        match self.arena.path_from_root(goal_node) {
            Some(chain) => Path2D::from_points(chain.into_iter().map(|id| self.arena.pos(id)).collect()),
            None => {
                warn!("parent chain from {:?} does not terminate", goal_node);
                Path2D::new()
            }
        }
    }

    /// Root parent links followed by the edges of every disjoint tree
    pub fn edges(&self) -> Vec<TreeEdge> {
        let mut edges: Vec<TreeEdge> = self
            .root
            .nodes
            .iter()
            .filter_map(|&id| {
                self.arena[id].parent.map(|p| TreeEdge {
                    from: self.arena.pos(p),
                    to: self.arena.pos(id),
                    tree: TreeId::ROOT,
                })
            })
            .collect();

        for tree in self.disjointed.values() {
            for &id in &tree.nodes {
                // each undirected edge once
                for &other in self.arena[id].edges.iter().filter(|&&o| o > id) {
                    edges.push(TreeEdge {
                        from: self.arena.pos(id),
                        to: self.arena.pos(other),
                        tree: tree.id,
                    });
                }
            }
        }
        edges
    }

    /// Check partition, cost and acyclicity invariants of every tree
    pub fn validate(&self) -> PlannerResult<()> {
        let trees: Vec<&Tree> = std::iter::once(&self.root).chain(self.disjointed.values()).collect();
        if !trees.iter().map(|t| t.id).all_unique() {
            return Err(PlannerError::invariant("a tree id appears twice"));
        }
        if self.root.kind != TreeKind::Root || self.disjointed.values().any(|t| t.kind != TreeKind::Disjoint) {
            return Err(PlannerError::invariant("tree kind does not match its slot"));
        }

        let mut seen = HashSet::new();
        for tree in &trees {
            for &id in &tree.nodes {
                if !seen.insert(id) {
                    return Err(PlannerError::invariant(format!("{:?} listed in more than one tree", id)));
                }
                if self.arena[id].tree != Some(tree.id) {
                    return Err(PlannerError::invariant(format!(
                        "{:?} is listed in {:?} but claims {:?}",
                        id, tree.id, self.arena[id].tree
                    )));
                }
            }
        }
        if let Some((id, _)) = self.arena.iter().find(|(id, n)| n.tree.is_some() && !seen.contains(id)) {
            return Err(PlannerError::invariant(format!("{:?} claims a tree that does not list it", id)));
        }

        for &id in &self.root.nodes {
            let node = &self.arena[id];
            match node.parent {
                None if id == self.start => {
                    if node.cost != 0.0 {
                        return Err(PlannerError::invariant("start node cost is not zero"));
                    }
                }
                None => return Err(PlannerError::invariant(format!("root node {:?} has no parent", id))),
                Some(p) => {
                    if self.arena[p].tree != Some(TreeId::ROOT) {
                        return Err(PlannerError::invariant(format!("parent of {:?} is outside root", id)));
                    }
                    if !self.arena[p].children.contains(&id) {
                        return Err(PlannerError::invariant(format!("{:?} missing from its parent's children", id)));
                    }
                    let expected = self.arena[p].cost + self.arena.distance(p, id);
                    if (node.cost - expected).abs() > 1e-6 {
                        return Err(PlannerError::invariant(format!(
                            "cost of {:?} is {} but parent implies {}",
                            id, node.cost, expected
                        )));
                    }
                }
            }
            match self.arena.path_from_root(id) {
                Some(chain) if chain.first() == Some(&self.start) => {}
                _ => return Err(PlannerError::invariant(format!("{:?} does not lead back to start", id))),
            }
        }

        for tree in self.disjointed.values() {
            if tree.nodes.iter().any(|&id| self.arena[id].parent.is_some()) {
                return Err(PlannerError::invariant(format!("{:?} holds a node with a parent", tree.id)));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::AreaBounds;
    use crate::config::InsertionKind;
    use crate::mapping::CircleWorld;
    use crate::path_planning::rrdt::insertion;

    fn create_manager(policy: MergePolicy) -> TreesManager {
        TreesManager::new(
            Point2D::new(0.0, 0.0),
            GoalRegion::new(Point2D::new(100.0, 0.0), 10.0),
            15.0,
            policy,
            insertion::build(InsertionKind::RrtStar),
        )
    }

    fn open_world() -> CircleWorld {
        CircleWorld::empty(AreaBounds::new(-20.0, 120.0, -50.0, 50.0))
    }

    /// Disjoint chain of nodes along `y`, returned in insertion order
    fn disjoint_chain(tm: &mut TreesManager, xs: &[f64], y: f64, cc: &dyn CollisionChecker) -> (TreeId, Vec<NodeId>) {
        let first = tm.add_node(Point2D::new(xs[0], y));
        let tree = tm.spawn_disjoint_tree(first).unwrap();
        let mut ids = vec![first];
        for &x in &xs[1..] {
            let n = tm.add_node(Point2D::new(x, y));
            let prev = *ids.last().unwrap();
            tm.connect_two_nodes(n, Some(prev), tree, cc).unwrap();
            ids.push(n);
        }
        (tree, ids)
    }

    fn root_chain(tm: &mut TreesManager, xs: &[f64], cc: &dyn CollisionChecker) -> Vec<NodeId> {
        let mut ids = vec![tm.start()];
        for &x in xs {
            let n = tm.add_node(Point2D::new(x, 0.0));
            let prev = *ids.last().unwrap();
            tm.connect_two_nodes(n, Some(prev), TreeId::ROOT, cc).unwrap();
            ids.push(n);
        }
        ids
    }

    #[test]
    fn test_root_insertion_keeps_costs() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let ids = root_chain(&mut tm, &[7.0, 14.0, 21.0], &world);

        assert_eq!(tm.root().len(), 4);
        assert!((tm.arena()[ids[3]].cost - 21.0).abs() < 1e-10);
        assert!(tm.validate().is_ok());
    }

    #[test]
    fn test_root_is_always_last_candidate() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        root_chain(&mut tm, &[7.0], &world);
        let (near_tree, _) = disjoint_chain(&mut tm, &[20.0], 5.0, &world);
        let (far_tree, _) = disjoint_chain(&mut tm, &[60.0], 0.0, &world);

        // probe node close to both the root and the first disjoint tree
        let probe = tm.add_node(Point2D::new(12.0, 2.0));
        let candidates = tm.find_nearest_node_from_neighbour(probe, None, 15.0);
        let trees: Vec<TreeId> = candidates.iter().map(|&(_, t)| t).collect();

        assert_eq!(trees, vec![near_tree, TreeId::ROOT]);
        assert!(!trees.contains(&far_tree));
        assert_eq!(tm.arena().pos(candidates[1].0), Point2D::new(7.0, 0.0));
    }

    #[test]
    fn test_self_merge_rejected() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let (tree, ids) = disjoint_chain(&mut tm, &[30.0, 35.0], 0.0, &world);

        let err = tm.join_trees(tree, tree, ids[0], ids[1], &world).unwrap_err();
        assert!(matches!(err, PlannerError::InvariantViolation(_)));
        assert_eq!(tm.disjoint_count(), 1);
        assert_eq!(tm.tree(tree).unwrap().len(), 2);
    }

    #[test]
    fn test_merge_with_wrong_nodes_leaves_state_untouched() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let (a, a_ids) = disjoint_chain(&mut tm, &[30.0, 35.0], 0.0, &world);
        let (b, _) = disjoint_chain(&mut tm, &[45.0], 0.0, &world);

        let err = tm.join_trees(a, b, a_ids[0], a_ids[1], &world).unwrap_err();
        assert!(matches!(err, PlannerError::InvariantViolation(_)));
        assert_eq!(tm.disjoint_count(), 2);
        assert!(tm.validate().is_ok());
    }

    #[test]
    fn test_disjoint_merge_conserves_counts() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::Transfer);
        let (a, a_ids) = disjoint_chain(&mut tm, &[30.0, 37.0, 44.0], 0.0, &world);
        let (b, b_ids) = disjoint_chain(&mut tm, &[54.0, 61.0], 0.0, &world);
        tm.bind_particle(a, ParticleId(3));

        let before = tm.disjoint_count();
        let report = tm.join_trees(a, b, a_ids[2], b_ids[0], &world).unwrap();

        assert_eq!(report.survivor, b);
        assert_eq!(report.absorbed, a);
        assert_eq!(report.migrated_nodes, 3);
        assert_eq!(tm.disjoint_count(), before - 1);
        assert_eq!(tm.tree(b).unwrap().len(), 5);
        assert_eq!(tm.tree(b).unwrap().particles, vec![ParticleId(3)]);
        assert!(tm.tree(a).is_none());
        assert!(tm.validate().is_ok());
    }

    #[test]
    fn test_bfs_migrates_whole_chain_into_root() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let root_ids = root_chain(&mut tm, &[7.0, 14.0], &world);
        let xs: Vec<f64> = (0..8).map(|i| 24.0 + 6.0 * i as f64).collect();
        let (tree, chain) = disjoint_chain(&mut tm, &xs, 0.0, &world);
        tm.bind_particle(tree, ParticleId(1));

        let root_before = tm.root().len();
        let report = tm.join_trees(TreeId::ROOT, tree, root_ids[2], chain[0], &world).unwrap();

        assert_eq!(report.migrated_nodes, 8);
        assert_eq!(report.particles, vec![ParticleId(1)]);
        assert_eq!(tm.root().len(), root_before + 8);
        assert_eq!(tm.disjoint_count(), 0);
        for &id in &chain {
            assert_eq!(tm.arena()[id].tree, Some(TreeId::ROOT));
            assert!(tm.arena()[id].edges.is_empty());
        }
        // the far end of the chain is reached along the straight line
        assert!((tm.arena()[chain[7]].cost - 66.0).abs() < 1e-6);
        assert!(tm.root().particles.is_empty());
        assert!(tm.validate().is_ok());
    }

    #[test]
    fn test_broken_disjoint_tree_is_not_merged() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let root_ids = root_chain(&mut tm, &[7.0], &world);
        let (tree, chain) = disjoint_chain(&mut tm, &[18.0, 25.0], 0.0, &world);
        // corrupt the topology: detach the second node
        let stray = tm.add_node(Point2D::new(40.0, 0.0));
        tm.connect_two_nodes(stray, Some(chain[1]), tree, &world).unwrap();
        tm.arena.clear_edges(stray);
        tm.arena[chain[1]].edges.retain(|&e| e != stray);

        let err = tm.join_trees(TreeId::ROOT, tree, root_ids[1], chain[0], &world).unwrap_err();
        assert!(matches!(err, PlannerError::InvariantViolation(_)));
        assert_eq!(tm.disjoint_count(), 1);
        assert_eq!(tm.tree(tree).unwrap().len(), 3);
        assert_eq!(tm.root().len(), 2);
    }

    #[test]
    fn test_orphan_adopts_then_merges() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        root_chain(&mut tm, &[7.0], &world);
        let (tree, _) = disjoint_chain(&mut tm, &[21.0, 28.0], 0.0, &world);

        // sits between the disjoint tree and root
        let orphan = tm.add_node(Point2D::new(14.0, 0.0));
        let attachment = tm.add_pos_to_existing_tree(orphan, None, &world);

        assert_eq!(attachment.tree, Some(TreeId::ROOT));
        assert_eq!(attachment.merges.len(), 1);
        assert_eq!(attachment.merges[0].absorbed, tree);
        assert_eq!(tm.disjoint_count(), 0);
        assert_eq!(tm.root().len(), 5);
        assert!(tm.validate().is_ok());
    }

    #[test]
    fn test_blocked_neighbour_is_ignored() {
        let world = CircleWorld::from_obstacles(
            AreaBounds::new(-20.0, 120.0, -50.0, 50.0),
            vec![(10.0, 0.0, 1.5)],
        );
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        let orphan = tm.add_node(Point2D::new(14.0, 0.0));
        let attachment = tm.add_pos_to_existing_tree(orphan, None, &world);

        assert_eq!(attachment.tree, None);
        assert!(tm.discard_orphan(orphan));
    }

    #[test]
    fn test_best_path_reaches_goal_region() {
        let world = open_world();
        let mut tm = create_manager(MergePolicy::RestartOnMerge);
        assert!(tm.best_path().is_empty());
        assert_eq!(tm.incumbent_cost(), f64::INFINITY);

        let xs: Vec<f64> = (1..=14).map(|i| 7.0 * i as f64).collect();
        root_chain(&mut tm, &xs, &world);

        let path = tm.best_path();
        assert_eq!(path.first(), Some(&Point2D::new(0.0, 0.0)));
        assert!(path.last().unwrap().distance(&Point2D::new(100.0, 0.0)) < 10.0);
        assert!((path.total_length() - tm.incumbent_cost()).abs() < 1e-9);
        assert_eq!(tm.edges().len(), 14);
    }
}
