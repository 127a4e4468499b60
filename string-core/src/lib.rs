//! Closed-string loop engine: wave-equation dynamics, self-intersection
//! detection and loop splitting.
//!
//! Main components:
//! - [`loop_state`] — loop representation and seed shapes.
//! - [`accel_buffer`] — reusable per-point acceleration scratch buffer.
//! - [`integrator`] — velocity-Verlet stepping with clamping and damping.
//! - [`detector`] — closest non-adjacent pair search.
//! - [`surgeon`] — cutting a loop in two at a crossing.
//! - [`resampler`] — arclength-uniform periodic spline resampling.
//! - [`pool`] — bounded arena of active loops.
//! - [`phases`] — per-frame integration and split phases.
//! - [`simulation`] — the public controller queried by renderers.
//! - [`config`] — simulation parameters.
//! - [`types`] — ids and shared constants.

pub mod accel_buffer;
pub mod config;
pub mod detector;
pub mod error;
pub mod integrator;
pub mod loop_state;
pub mod phases;
pub mod pool;
pub mod resampler;
pub mod simulation;
pub mod surgeon;
pub mod types;

pub use config::{DaughterResolution, DriftResample, SeedShape, SimConfig};
pub use error::{ConfigError, SimError};
pub use loop_state::{LoopShape, LoopState};
pub use phases::SplitEvent;
pub use simulation::StringSimulation;
pub use types::{ColorId, LoopId, MAX_LOOPS};
