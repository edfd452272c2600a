//! Default values used by serde when a configuration field is omitted.

pub fn epsilon() -> f64 {
    7.0
}

pub fn connection_radius() -> f64 {
    15.0
}

pub fn goal_radius() -> f64 {
    10.0
}

pub fn goal_bias() -> f64 {
    0.05
}

pub fn stall_warn_after() -> usize {
    1000
}

pub fn num_particles() -> usize {
    10
}

pub fn energy_start() -> f64 {
    10.0
}

pub fn energy_max() -> f64 {
    10.0
}

pub fn restart_energy_floor() -> f64 {
    0.75
}

pub fn restart_every() -> usize {
    20
}

pub fn success_decay() -> f64 {
    0.95
}

pub fn failure_decay() -> f64 {
    0.7
}

pub fn walk_step_factor() -> f64 {
    1.5
}

/// Heading noise of a von Mises walk with concentration 1.5, as a normal std-dev
pub fn walk_direction_std() -> f64 {
    1.0 / 1.5_f64.sqrt()
}
