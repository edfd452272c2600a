use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::particle::ParticleId;

/// Handle of a tree; the root tree is always [`TreeId::ROOT`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(pub(crate) usize);

impl TreeId {
    pub const ROOT: TreeId = TreeId(0);

    pub fn is_root(self) -> bool {
        self == TreeId::ROOT
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TreeKind {
    Root,
    Disjoint,
}

/// Ordered node list plus the particles currently searching from it
#[derive(Debug, Clone)]
pub struct Tree {
    pub id: TreeId,
    pub kind: TreeKind,
    pub nodes: Vec<NodeId>,
    pub particles: Vec<ParticleId>,
}

impl Tree {
    pub fn new_root() -> Self {
        Tree {
            id: TreeId::ROOT,
            kind: TreeKind::Root,
            nodes: Vec::new(),
            particles: Vec::new(),
        }
    }

    pub fn new_disjoint(id: TreeId) -> Self {
        Tree {
            id,
            kind: TreeKind::Disjoint,
            nodes: Vec::new(),
            particles: Vec::new(),
        }
    }

    pub fn is_root(&self) -> bool {
        self.kind == TreeKind::Root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn bind_particle(&mut self, particle: ParticleId) {
        if !self.particles.contains(&particle) {
            self.particles.push(particle);
        }
    }

    pub fn unbind_particle(&mut self, particle: ParticleId) {
        self.particles.retain(|&p| p != particle);
    }
}
