//! Bounded 2D world with circular obstacles.
//!
//! Segments are checked by sampling points every `path_resolution`,
//! endpoints included.

use crate::common::{AreaBounds, CircleObstacle, CollisionChecker, Point2D};

#[derive(Debug, Clone)]
pub struct CircleWorld {
    bounds: AreaBounds,
    obstacles: Vec<CircleObstacle>,
    robot_radius: f64,
    path_resolution: f64,
}

impl CircleWorld {
    pub fn new(bounds: AreaBounds, obstacles: Vec<CircleObstacle>) -> Self {
        CircleWorld {
            bounds,
            obstacles,
            robot_radius: 0.0,
            path_resolution: 0.5,
        }
    }

    /// Obstacle-free world
    pub fn empty(bounds: AreaBounds) -> Self {
        Self::new(bounds, Vec::new())
    }

    /// Create from `(x, y, radius)` tuples (legacy interface)
    pub fn from_obstacles(bounds: AreaBounds, obstacle_list: Vec<(f64, f64, f64)>) -> Self {
        let obstacles = obstacle_list
            .into_iter()
            .map(|(x, y, r)| CircleObstacle::new(x, y, r))
            .collect();
        Self::new(bounds, obstacles)
    }

    pub fn with_robot_radius(mut self, robot_radius: f64) -> Self {
        self.robot_radius = robot_radius;
        self
    }

    pub fn with_path_resolution(mut self, path_resolution: f64) -> Self {
        self.path_resolution = path_resolution;
        self
    }

    pub fn bounds(&self) -> &AreaBounds {
        &self.bounds
    }

    pub fn obstacles(&self) -> &[CircleObstacle] {
        &self.obstacles
    }
}

impl CollisionChecker for CircleWorld {
    fn is_free(&self, p: Point2D) -> bool {
        if !self.bounds.contains(&p) {
            return false;
        }
        self.obstacles
            .iter()
            .all(|obs| obs.center().distance(&p) > obs.radius + self.robot_radius)
    }

    fn path_is_free(&self, a: Point2D, b: Point2D) -> bool {
        let d = a.distance(&b);
        let n_expand = (d / self.path_resolution).floor() as usize;
        let theta = a.angle_to(&b);

        (0..=n_expand)
            .map(|i| a.offset(theta, self.path_resolution * i as f64))
            .chain(std::iter::once(b))
            .all(|p| self.is_free(p))
    }
}
