//! rrdt_planner - sampling-based motion planning with particle-guided disjoint trees
//!
//! The planner grows an RRT* tree from the start while a set of particles
//! explores free space with their own disjoint trees. Disjoint trees that
//! touch each other merge, and any tree that reaches the root tree is
//! re-inserted into it with cost-aware RRT* insertion.

// Core modules
pub mod common;
pub mod config;
pub mod utils;

// Algorithm modules
pub mod mapping;
pub mod path_planning;

// Re-export common types for convenience
pub use common::{AreaBounds, CircleObstacle, Path2D, Point2D};
pub use common::{CollisionChecker, FreeSpaceSampler, PathPlanner, Visualizable};
pub use common::{PlannerError, PlannerResult};
pub use config::{MergePolicy, PlannerConfig};
pub use path_planning::rrdt::{RrdtPlanner, StepOutcome};
