//! Planner configuration.
//!
//! Every field has a default, so a TOML file only needs the values it changes.

mod defaults;
mod planner;

pub use planner::{InsertionKind, MergePolicy, ParticleSettings, PlannerConfig, SamplerKind};
