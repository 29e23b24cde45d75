//! Error types for the simulation core and config loading
//!
//! Frame-scoped overflow (cover stack, collision pool) is not an error here:
//! the frame logs it, counts it in `FrameStats` and drops the interaction.

use crate::sim::{Class, Handle};

/// Errors surfaced by the simulation's public API
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SimError {
    /// The pool for this entity class is full
    #[error("{class:?} pool is full (capacity {capacity})")]
    CapacityExceeded { class: Class, capacity: usize },

    /// The handle refers to a destroyed entity or was never issued
    #[error("stale or unknown entity handle {0:?}")]
    InvalidHandle(Handle),

    /// Bin index outside the layer's grid
    #[error("bin {bin} is outside the grid")]
    InvalidBin { bin: usize },

    /// Mass must be strictly positive and finite
    #[error("entity mass must be positive and finite, got {mass}")]
    InvalidMass { mass: f32 },
}

/// Errors from loading or validating a `SimConfig`
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}
