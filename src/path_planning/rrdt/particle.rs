//! Local-search particles and their energy bookkeeping.

use std::collections::VecDeque;
use std::f64::consts::PI;

use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::node::NodeId;
use super::trees_manager::MergeReport;
use super::tree::TreeId;
use crate::common::Point2D;
use crate::config::{MergePolicy, ParticleSettings};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ParticleId(pub(crate) usize);

impl ParticleId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct Particle {
    pub id: ParticleId,
    pub pos: Point2D,
    /// Heading of the random walk (radians)
    pub dir: f64,
    /// Tree this particle grows
    pub tree: TreeId,
    /// Most recently connected node, used instead of a nearest-neighbour search
    pub last_node: Option<NodeId>,
    provisional: Option<(Point2D, f64)>,
}

impl Particle {
    pub fn new(id: ParticleId, pos: Point2D, dir: f64, tree: TreeId) -> Self {
        Particle {
            id,
            pos,
            dir,
            tree,
            last_node: None,
            provisional: None,
        }
    }

    /// Remember a proposed move until it is confirmed or dropped
    pub fn try_new_pos(&mut self, pos: Point2D, dir: f64) {
        self.provisional = Some((pos, dir));
    }

    /// Commit the move to `pos`, keeping the proposed heading
    pub fn confirm(&mut self, pos: Point2D) {
        if let Some((_, dir)) = self.provisional.take() {
            self.dir = dir;
        }
        self.pos = pos;
    }

    pub fn reject(&mut self, new_dir: f64) {
        self.provisional = None;
        self.dir = new_dir;
    }

    pub fn restart_at(&mut self, pos: Point2D, dir: f64, tree: TreeId) {
        self.pos = pos;
        self.dir = dir;
        self.tree = tree;
        self.last_node = None;
        self.provisional = None;
    }
}

/// How an energy value changes
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EnergyUpdate {
    Scale(f64),
    Set(f64),
}

/// Owns every particle, their energies and the pending-restart queue
#[derive(Debug, Clone)]
pub struct ParticleManager {
    particles: Vec<Particle>,
    energy: Vec<f64>,
    restart_queue: VecDeque<ParticleId>,
    settings: ParticleSettings,
}

impl ParticleManager {
    pub fn new(settings: ParticleSettings) -> Self {
        ParticleManager {
            particles: Vec::with_capacity(settings.num_particles),
            energy: Vec::with_capacity(settings.num_particles),
            restart_queue: VecDeque::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &ParticleSettings {
        &self.settings
    }

    /// Create a particle with full starting energy
    pub fn spawn(&mut self, pos: Point2D, dir: f64, tree: TreeId) -> ParticleId {
        let id = ParticleId(self.particles.len());
        self.particles.push(Particle::new(id, pos, dir, tree));
        self.energy.push(self.settings.energy_start);
        id
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn get(&self, id: ParticleId) -> &Particle {
        &self.particles[id.0]
    }

    pub fn get_mut(&mut self, id: ParticleId) -> &mut Particle {
        &mut self.particles[id.0]
    }

    pub fn energy(&self, id: ParticleId) -> f64 {
        self.energy[id.0]
    }

    pub fn energies(&self) -> &[f64] {
        &self.energy
    }

    pub fn modify_energy(&mut self, id: ParticleId, update: EnergyUpdate) {
        let e = match update {
            EnergyUpdate::Scale(factor) => self.energy[id.0] * factor,
            EnergyUpdate::Set(value) => value,
        };
        self.energy[id.0] = e.max(0.0).min(self.settings.energy_max);
    }

    /// Queue a particle for restart; already queued particles keep their place
    pub fn add_to_restart(&mut self, id: ParticleId) {
        if !self.restart_queue.contains(&id) {
            self.restart_queue.push_back(id);
        }
    }

    pub fn next_pending_restart(&self) -> Option<ParticleId> {
        self.restart_queue.front().copied()
    }

    pub fn finish_restart(&mut self, id: ParticleId) {
        if self.restart_queue.front() == Some(&id) {
            self.restart_queue.pop_front();
        } else {
            self.restart_queue.retain(|&p| p != id);
        }
    }

    pub fn pending_restarts(&self) -> usize {
        self.restart_queue.len()
    }

    pub fn is_pending_restart(&self, id: ParticleId) -> bool {
        self.restart_queue.contains(&id)
    }

    /// Queue every particle whose energy fell under the restart floor
    pub fn sweep_low_energy(&mut self) -> usize {
        let floor = self.settings.restart_energy_floor;
        let exhausted: Vec<ParticleId> = self
            .particles
            .iter()
            .filter(|p| self.energy[p.id.0] < floor)
            .map(|p| p.id)
            .collect();
        for &id in &exhausted {
            self.add_to_restart(id);
        }
        exhausted.len()
    }

    /// Pick a particle with probability proportional to its energy
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<ParticleId> {
        if self.particles.is_empty() {
            return None;
        }
        let idx = match WeightedIndex::new(&self.energy) {
            Ok(dist) => dist.sample(rng),
            // every energy is zero
            Err(_) => rng.gen_range(0..self.particles.len()),
        };
        Some(ParticleId(idx))
    }

    pub fn report_success(&mut self, id: ParticleId, node: NodeId, pos: Point2D) {
        let particle = &mut self.particles[id.0];
        particle.last_node = Some(node);
        particle.confirm(pos);
        self.modify_energy(id, EnergyUpdate::Scale(self.settings.success_decay));
    }

    /// Penalise a collision and draw a fresh heading for the next attempt
    pub fn report_failure<R: Rng + ?Sized>(&mut self, id: ParticleId, rng: &mut R) {
        self.particles[id.0].reject(rng.gen_range(0.0..2.0 * PI));
        self.modify_energy(id, EnergyUpdate::Scale(self.settings.failure_decay));
    }

    /// Reset a particle after a restart at `pos` bound to `tree`
    pub fn reset(&mut self, id: ParticleId, pos: Point2D, dir: f64, tree: TreeId) {
        self.particles[id.0].restart_at(pos, dir, tree);
        self.modify_energy(id, EnergyUpdate::Set(self.settings.energy_start));
    }

    /// Update particle bookkeeping after a tree was absorbed
    pub fn apply_merge(&mut self, report: &MergeReport) {
        match report.policy {
            MergePolicy::Transfer => {
                for &pid in &report.particles {
                    self.particles[pid.0].tree = report.survivor;
                }
            }
            MergePolicy::RestartOnMerge => {
                for &pid in &report.particles {
                    self.particles[pid.0].last_node = None;
                    self.add_to_restart(pid);
                }
                if !report.particles.is_empty() {
                    debug!(
                        "{} particle(s) of merged tree {:?} queued for restart",
                        report.particles.len(),
                        report.absorbed
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn create_manager(n: usize) -> ParticleManager {
        let mut pm = ParticleManager::new(ParticleSettings::default());
        for i in 0..n {
            pm.spawn(Point2D::new(i as f64, 0.0), 0.0, TreeId(i + 1));
        }
        pm
    }

    #[test]
    fn test_success_decays_energy_and_confirms() {
        let mut pm = create_manager(1);
        let id = ParticleId(0);
        pm.get_mut(id).try_new_pos(Point2D::new(5.0, 5.0), 1.0);
        pm.report_success(id, NodeId(3), Point2D::new(5.0, 5.0));

        assert!((pm.energy(id) - 9.5).abs() < 1e-10);
        let p = pm.get(id);
        assert_eq!(p.pos, Point2D::new(5.0, 5.0));
        assert_eq!(p.dir, 1.0);
        assert_eq!(p.last_node, Some(NodeId(3)));
    }

    #[test]
    fn test_failure_keeps_position() {
        let mut pm = create_manager(1);
        let id = ParticleId(0);
        let mut rng = StdRng::seed_from_u64(1);
        pm.get_mut(id).try_new_pos(Point2D::new(5.0, 5.0), 1.0);
        pm.report_failure(id, &mut rng);

        assert_eq!(pm.get(id).pos, Point2D::new(0.0, 0.0));
        assert!((pm.energy(id) - 7.0).abs() < 1e-10);
    }

    #[test]
    fn test_energy_is_clamped() {
        let mut pm = create_manager(1);
        let id = ParticleId(0);
        pm.modify_energy(id, EnergyUpdate::Scale(3.0));
        assert_eq!(pm.energy(id), 10.0);
        pm.modify_energy(id, EnergyUpdate::Set(-4.0));
        assert_eq!(pm.energy(id), 0.0);
    }

    #[test]
    fn test_sweep_queues_exhausted_particles_once() {
        let mut pm = create_manager(3);
        pm.modify_energy(ParticleId(1), EnergyUpdate::Set(0.5));
        pm.modify_energy(ParticleId(2), EnergyUpdate::Set(0.1));

        assert_eq!(pm.sweep_low_energy(), 2);
        assert_eq!(pm.sweep_low_energy(), 2);
        assert_eq!(pm.pending_restarts(), 2);
        assert_eq!(pm.next_pending_restart(), Some(ParticleId(1)));

        pm.finish_restart(ParticleId(1));
        assert_eq!(pm.next_pending_restart(), Some(ParticleId(2)));
    }

    #[test]
    fn test_choose_follows_energy() {
        let mut pm = create_manager(3);
        pm.modify_energy(ParticleId(0), EnergyUpdate::Set(0.0));
        pm.modify_energy(ParticleId(2), EnergyUpdate::Set(0.0));
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..50 {
            assert_eq!(pm.choose(&mut rng), Some(ParticleId(1)));
        }

        pm.modify_energy(ParticleId(1), EnergyUpdate::Set(0.0));
        assert!(pm.choose(&mut rng).is_some());
    }

    #[test]
    fn test_apply_merge_by_policy() {
        let mut pm = create_manager(2);
        let report = MergeReport {
            survivor: TreeId::ROOT,
            absorbed: TreeId(1),
            migrated_nodes: 4,
            particles: vec![ParticleId(0)],
            policy: MergePolicy::Transfer,
        };
        pm.apply_merge(&report);
        assert_eq!(pm.get(ParticleId(0)).tree, TreeId::ROOT);
        assert_eq!(pm.pending_restarts(), 0);

        let report = MergeReport {
            policy: MergePolicy::RestartOnMerge,
            particles: vec![ParticleId(1)],
            absorbed: TreeId(2),
            ..report
        };
        pm.apply_merge(&report);
        assert!(pm.is_pending_restart(ParticleId(1)));
    }
}
