//! Error types for rrdt_planner

use thiserror::Error;

/// Main error type for the planner
#[derive(Error, Debug)]
pub enum PlannerError {
    /// Path planning failed
    #[error("Planning error: {0}")]
    PlanningError(String),

    /// A tree/node bookkeeping invariant does not hold (a logic bug, not a runtime condition)
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// No usable nearest neighbour was found where one was expected
    #[error("Nearest node not found: {0}")]
    NearestNotFound(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Configuration could not be parsed
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Snapshot (de)serialization failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Visualization error
    #[error("Visualization error: {0}")]
    VisualizationError(String),
}

impl PlannerError {
    /// Shorthand used by the tree bookkeeping code
    pub fn invariant(msg: impl Into<String>) -> Self {
        PlannerError::InvariantViolation(msg.into())
    }
}

/// Result type alias for planner operations
pub type PlannerResult<T> = Result<T, PlannerError>;
