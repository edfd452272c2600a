//! Utility modules for rrdt_planner

pub mod visualization;

pub use visualization::{colors, PathStyle, PointStyle, Visualizer};
