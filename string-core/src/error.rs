//! Error types for the string engine.

use thiserror::Error;

/// Errors surfaced by [`crate::simulation::StringSimulation`].
#[derive(Debug, Error)]
pub enum SimError {
    #[error("simulation has been released")]
    Released,

    #[error("invalid time step: {0}")]
    InvalidTimeStep(f64),

    #[error("invalid tension: {0}")]
    InvalidTension(f64),

    #[error("invalid loop shape: {0}")]
    InvalidShape(String),

    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}

/// Errors produced while loading or validating a [`crate::config::SimConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
}

/// Reasons a cut requested from the surgeon was not carried out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum SplitError {
    #[error("cut ({i}, {j}) is out of range for a loop of {len} points")]
    OutOfRange { i: usize, j: usize, len: usize },

    #[error("cut would leave a daughter with {points} points")]
    Degenerate { points: usize },
}

/// Reasons the pool refused to apply a split.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PoolError {
    #[error("pool is saturated at {0} loops")]
    Saturated(usize),

    #[error("no active loop with id {0}")]
    UnknownLoop(crate::types::LoopId),
}

pub type Result<T> = std::result::Result<T, SimError>;
