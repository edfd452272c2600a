//! Common traits defining the seams between the planner core and its collaborators

use std::fmt;

use rand::RngCore;

use crate::common::error::PlannerResult;
use crate::common::types::*;

/// Pure predicates over the configuration space.
///
/// Implementations must be deterministic: the same query always gets the same answer.
pub trait CollisionChecker {
    /// Is the point `p` in free space?
    fn is_free(&self, p: Point2D) -> bool;

    /// Is the straight segment `a -> b` entirely in free space?
    fn path_is_free(&self, a: Point2D, b: Point2D) -> bool;
}

impl<T: CollisionChecker + ?Sized> CollisionChecker for &T {
    fn is_free(&self, p: Point2D) -> bool {
        (**self).is_free(p)
    }

    fn path_is_free(&self, a: Point2D, b: Point2D) -> bool {
        (**self).path_is_free(a, b)
    }
}

/// Generator of uniformly distributed positions in free space
pub trait FreeSpaceSampler: fmt::Debug {
    /// Draw a random point that `cc` reports as free
    fn sample_free(&self, cc: &dyn CollisionChecker, rng: &mut dyn RngCore) -> Point2D;
}

/// Trait for path planning algorithms that run to an iteration budget
pub trait PathPlanner {
    /// Run at most `max_iter` planning iterations and return the best path found
    fn plan(&mut self, max_iter: usize) -> PlannerResult<Path2D>;
}

/// Trait for visualizable algorithms
pub trait Visualizable {
    /// Draw current state to visualizer
    fn visualize(&self, vis: &mut crate::utils::Visualizer);
}
