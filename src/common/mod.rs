//! Common types, traits, and error definitions for rrdt_planner
//!
//! This module provides the foundational building blocks shared by the
//! planner core and its collaborators.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
