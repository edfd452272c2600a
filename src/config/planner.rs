//! Planner configuration section.

use serde::{Deserialize, Serialize};

use super::defaults;
use crate::common::{PlannerError, PlannerResult};

/// What happens to the particles of a tree that gets absorbed by a merge
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Every particle of the absorbed tree is queued for restart
    RestartOnMerge,
    /// Particles keep exploring, now bound to the surviving tree
    Transfer,
}

impl Default for MergePolicy {
    fn default() -> Self {
        MergePolicy::RestartOnMerge
    }
}

/// How new nodes are attached to the root tree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertionKind {
    /// Least-cost parent selection followed by rewiring
    RrtStar,
    /// Attach to the nearest node, no rewiring
    NearestParent,
}

impl Default for InsertionKind {
    fn default() -> Self {
        InsertionKind::RrtStar
    }
}

/// Which sampler proposes candidates
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplerKind {
    /// Particle random walks growing disjoint trees
    DisjointParticle,
    /// Goal-biased uniform sampling, informed once a solution exists
    Uniform,
}

impl Default for SamplerKind {
    fn default() -> Self {
        SamplerKind::DisjointParticle
    }
}

/// Top-level planner settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Maximum steering distance per step
    #[serde(default = "defaults::epsilon")]
    pub epsilon: f64,

    /// Maximum distance at which nodes or trees are linkable
    #[serde(default = "defaults::connection_radius")]
    pub connection_radius: f64,

    /// A root node closer than this to the goal is a solution
    #[serde(default = "defaults::goal_radius")]
    pub goal_radius: f64,

    /// Probability of steering towards the goal instead of the current heading
    #[serde(default = "defaults::goal_bias")]
    pub goal_bias: f64,

    /// Seed of the planner's random source
    #[serde(default)]
    pub seed: u64,

    /// Consecutive rejected candidates before a stall warning
    #[serde(default = "defaults::stall_warn_after")]
    pub stall_warn_after: usize,

    #[serde(default)]
    pub insertion: InsertionKind,

    #[serde(default)]
    pub sampler: SamplerKind,

    /// Particle filter settings (ignored by the uniform sampler)
    #[serde(default)]
    pub particles: ParticleSettings,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            epsilon: defaults::epsilon(),
            connection_radius: defaults::connection_radius(),
            goal_radius: defaults::goal_radius(),
            goal_bias: defaults::goal_bias(),
            seed: 0,
            stall_warn_after: defaults::stall_warn_after(),
            insertion: InsertionKind::default(),
            sampler: SamplerKind::default(),
            particles: ParticleSettings::default(),
        }
    }
}

impl PlannerConfig {
    /// Parse a TOML document and validate it
    pub fn from_toml_str(s: &str) -> PlannerResult<Self> {
        let config: PlannerConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a TOML file
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> PlannerResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> PlannerResult<()> {
        positive("epsilon", self.epsilon)?;
        positive("connection_radius", self.connection_radius)?;
        positive("goal_radius", self.goal_radius)?;
        probability("goal_bias", self.goal_bias)?;
        self.particles.validate()
    }
}

/// Particle filter settings section
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParticleSettings {
    /// Number of particles, one of which starts bound to the root tree
    #[serde(default = "defaults::num_particles")]
    pub num_particles: usize,

    #[serde(default)]
    pub merge_policy: MergePolicy,

    /// Energy assigned on creation and on every restart
    #[serde(default = "defaults::energy_start")]
    pub energy_start: f64,

    /// Upper clamp for energy
    #[serde(default = "defaults::energy_max")]
    pub energy_max: f64,

    /// Particles below this energy are restarted by the periodic sweep
    #[serde(default = "defaults::restart_energy_floor")]
    pub restart_energy_floor: f64,

    /// Iterations between low-energy sweeps (0 = every iteration)
    #[serde(default = "defaults::restart_every")]
    pub restart_every: usize,

    /// Energy factor applied on a successful step
    #[serde(default = "defaults::success_decay")]
    pub success_decay: f64,

    /// Energy factor applied on a collision
    #[serde(default = "defaults::failure_decay")]
    pub failure_decay: f64,

    /// Random-walk step length as a multiple of epsilon
    #[serde(default = "defaults::walk_step_factor")]
    pub walk_step_factor: f64,

    /// Std-dev (radians) of the heading noise of each walk step
    #[serde(default = "defaults::walk_direction_std")]
    pub walk_direction_std: f64,
}

impl Default for ParticleSettings {
    fn default() -> Self {
        Self {
            num_particles: defaults::num_particles(),
            merge_policy: MergePolicy::default(),
            energy_start: defaults::energy_start(),
            energy_max: defaults::energy_max(),
            restart_energy_floor: defaults::restart_energy_floor(),
            restart_every: defaults::restart_every(),
            success_decay: defaults::success_decay(),
            failure_decay: defaults::failure_decay(),
            walk_step_factor: defaults::walk_step_factor(),
            walk_direction_std: defaults::walk_direction_std(),
        }
    }
}

impl ParticleSettings {
    pub fn validate(&self) -> PlannerResult<()> {
        if self.num_particles == 0 {
            return Err(PlannerError::InvalidParameter(
                "num_particles must be at least 1".to_string(),
            ));
        }
        positive("energy_max", self.energy_max)?;
        if self.energy_start <= 0.0 || self.energy_start > self.energy_max {
            return Err(PlannerError::InvalidParameter(format!(
                "energy_start must be in (0, energy_max], got {}",
                self.energy_start
            )));
        }
        if self.restart_energy_floor < 0.0 || self.restart_energy_floor >= self.energy_start {
            return Err(PlannerError::InvalidParameter(format!(
                "restart_energy_floor must be in [0, energy_start), got {}",
                self.restart_energy_floor
            )));
        }
        unit_factor("success_decay", self.success_decay)?;
        unit_factor("failure_decay", self.failure_decay)?;
        positive("walk_step_factor", self.walk_step_factor)?;
        positive("walk_direction_std", self.walk_direction_std)
    }
}

fn positive(name: &str, value: f64) -> PlannerResult<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!("{} must be positive, got {}", name, value)))
    }
}

fn probability(name: &str, value: f64) -> PlannerResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!("{} must be in [0, 1], got {}", name, value)))
    }
}

fn unit_factor(name: &str, value: f64) -> PlannerResult<()> {
    if value > 0.0 && value <= 1.0 {
        Ok(())
    } else {
        Err(PlannerError::InvalidParameter(format!("{} must be in (0, 1], got {}", name, value)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_planner_config_default() {
        let config = PlannerConfig::default();
        assert_eq!(config.epsilon, 7.0);
        assert_eq!(config.connection_radius, 15.0);
        assert_eq!(config.goal_radius, 10.0);
        assert_eq!(config.particles.merge_policy, MergePolicy::RestartOnMerge);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PlannerConfig::from_toml_str(
            r#"
            epsilon = 5.0
            seed = 42
            insertion = "nearest_parent"

            [particles]
            num_particles = 4
            merge_policy = "transfer"
            "#,
        )
        .unwrap();

        assert_eq!(config.epsilon, 5.0);
        assert_eq!(config.seed, 42);
        assert_eq!(config.insertion, InsertionKind::NearestParent);
        assert_eq!(config.sampler, SamplerKind::DisjointParticle);
        assert_eq!(config.particles.num_particles, 4);
        assert_eq!(config.particles.merge_policy, MergePolicy::Transfer);
        assert_eq!(config.particles.restart_every, 20);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = PlannerConfig::from_toml_str("epsilon = -1.0").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));

        let err = PlannerConfig::from_toml_str("[particles]\nnum_particles = 0").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));

        let err = PlannerConfig::from_toml_str("[particles]\nsuccess_decay = 1.5").unwrap_err();
        assert!(matches!(err, PlannerError::InvalidParameter(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PlannerConfig::from_toml_str("epsilon = [").unwrap_err();
        assert!(matches!(err, PlannerError::Config(_)));
    }
}
