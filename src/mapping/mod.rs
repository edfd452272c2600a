// Configuration-space models: collision checking and free-space sampling

pub mod circle_world;
pub mod free_space;

pub use circle_world::*;
pub use free_space::*;
