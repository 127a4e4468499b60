//! Per-frame simulation phases for the loop population.
//!
//! The typical frame looks like:
//! 1. [`integration_phase`] — every loop is advanced through all of its
//!    sub-steps by the [`Integrator`].
//! 2. [`split_phase`] — each loop that existed at the start of the frame is
//!    scanned once by the [`IntersectionDetector`]; a crossing is cut by the
//!    surgeon, both daughters are resampled, and the pool swaps the parent
//!    for them.
//! 3. [`drift_phase`] — only when [`SimConfig::drift_resample`] is set: loops
//!    whose point density has drifted from its target are resampled in place.

use crate::{
    config::{DaughterResolution, DriftResample, SimConfig, density_points},
    detector::IntersectionDetector,
    integrator::Integrator,
    pool::LoopPool,
    resampler::Resampler,
    surgeon,
    types::{ColorId, LoopId},
};

/// Record of one applied split.
#[derive(Clone, Debug, PartialEq)]
pub struct SplitEvent {
    pub parent: LoopId,
    pub parent_color: ColorId,
    pub daughters: [LoopId; 2],
    pub colors: [ColorId; 2],
    /// Indices `(i, j)` of the crossing in the parent.
    pub cut: (usize, usize),
    pub distance: f64,
    /// Daughter point counts as cut from the parent, before resampling.
    pub cut_points: [usize; 2],
    /// Daughter point counts after resampling.
    pub resampled_points: [usize; 2],
}

/// Point count a daughter is resampled to.
///
/// ### Parameters
/// - `policy` - The configured [`DaughterResolution`].
/// - `parent_points` - Point count of the loop that was cut.
/// - `share` - Points the daughter received from the cut.
/// - `min_points` - Floor for [`DaughterResolution::Proportional`].
/// - `arclength` - Length of the daughter as cut, used by
///   [`DaughterResolution::Density`].
pub fn daughter_target(
    policy: DaughterResolution,
    parent_points: usize,
    share: usize,
    min_points: usize,
    arclength: f64,
) -> usize {
    match policy {
        DaughterResolution::MatchParent => parent_points,
        DaughterResolution::Proportional => share.max(min_points),
        DaughterResolution::Density {
            spacing,
            min_points,
            max_points,
        } => density_points(arclength, spacing, min_points, max_points),
    }
}

/// Advances every loop in the pool by one frame.
///
/// The frame is divided into `cfg.substeps` equal sub-steps, and every
/// sub-step of a loop runs before the next loop is touched.
///
/// ### Returns
/// The number of point states the integrator had to repair.
pub fn integration_phase(
    pool: &mut LoopPool,
    integrator: &mut Integrator,
    cfg: &SimConfig,
    tension: f64,
    frame_dt: f64,
) -> usize {
    let substeps = cfg.substeps.max(1);
    let dt = frame_dt / substeps as f64;
    let mut repaired = 0;
    for lp in pool.iter_mut() {
        for _ in 0..substeps {
            repaired += integrator.step(lp, tension, dt);
        }
    }
    repaired
}

/// Detects crossings and applies at most one split per loop.
///
/// Only loops present when the phase starts are scanned, so daughters
/// created here wait until the next frame. A crossing is dropped for this
/// frame when the pool is saturated or when the cut would leave a
/// degenerate daughter.
///
/// ### Returns
/// The splits that were applied, in the order they happened.
pub fn split_phase(
    pool: &mut LoopPool,
    detector: &IntersectionDetector,
    resampler: &Resampler,
    cfg: &SimConfig,
) -> Vec<SplitEvent> {
    let mut events = Vec::new();

    for id in pool.ids() {
        let Some(lp) = pool.get(id) else {
            continue;
        };
        let Some(crossing) = detector.detect(lp) else {
            continue;
        };

        if pool.is_full() {
            log::debug!(
                "{id}: crossing ({}, {}) ignored, pool saturated at {} loops",
                crossing.i,
                crossing.j,
                pool.len()
            );
            continue;
        }

        let cut = match surgeon::cut(&lp.points, &lp.velocities, crossing.i, crossing.j) {
            Ok(cut) => cut,
            Err(err) => {
                log::debug!("{id}: split aborted: {err}");
                continue;
            }
        };

        let parent_points = lp.len();
        let parent_color = lp.color;
        let cut_points = [cut.first.points.len(), cut.second.points.len()];
        let lengths = [cut.first.arclength(), cut.second.arclength()];
        let targets = [0, 1].map(|k| {
            daughter_target(
                cfg.daughter_resolution,
                parent_points,
                cut_points[k],
                cfg.min_daughter_points,
                lengths[k],
            )
        });
        let first = resampler.resample(&cut.first, targets[0]);
        let second = resampler.resample(&cut.second, targets[1]);
        let resampled_points = [first.points.len(), second.points.len()];

        match pool.replace(id, [first, second], cut_points) {
            Ok([(a, color_a), (b, color_b)]) => {
                log::info!(
                    "{id} split at ({}, {}) into {a} ({} pts) and {b} ({} pts), {} loops active",
                    crossing.i,
                    crossing.j,
                    resampled_points[0],
                    resampled_points[1],
                    pool.len()
                );
                events.push(SplitEvent {
                    parent: id,
                    parent_color,
                    daughters: [a, b],
                    colors: [color_a, color_b],
                    cut: (crossing.i, crossing.j),
                    distance: crossing.distance,
                    cut_points,
                    resampled_points,
                });
            }
            Err(err) => log::debug!("{id}: split refused: {err}"),
        }
    }

    events
}

/// Resamples every loop whose density target has drifted past
/// `drift.threshold`. Ids and colors are kept.
///
/// ### Returns
/// The number of loops that were resampled.
pub fn drift_phase(pool: &mut LoopPool, resampler: &Resampler, drift: &DriftResample) -> usize {
    let mut resampled = 0;
    for lp in pool.iter_mut() {
        let Some(target) = drift.target(lp.len(), lp.arclength()) else {
            continue;
        };
        log::debug!("{}: density drift, resampling {} -> {target} points", lp.id, lp.len());
        let shape = resampler.resample(&lp.shape(), target);
        lp.points = shape.points;
        lp.velocities = shape.velocities;
        resampled += 1;
    }
    resampled
}
