//! The public entry point of the engine.
//!
//! [`StringSimulation`] owns the loop pool and every piece of numeric state.
//! A collaborator calls [`StringSimulation::step`] once per rendering frame
//! and reads the flattened buffers between frames. After
//! [`StringSimulation::release`] every call fails with [`SimError::Released`].

use rand::{SeedableRng, rngs::StdRng};

use crate::{
    config::{SeedShape, SimConfig},
    detector::IntersectionDetector,
    error::{Result, SimError},
    integrator::Integrator,
    loop_state::{LoopShape, LoopState},
    phases::{self, SplitEvent},
    pool::LoopPool,
    resampler::Resampler,
};

#[derive(Debug)]
pub struct StringSimulation {
    engine: Option<Engine>,
}

#[derive(Debug)]
struct Engine {
    cfg: SimConfig,
    tension: f64,
    pool: LoopPool,
    integrator: Integrator,
    detector: IntersectionDetector,
    resampler: Resampler,
    frame: u64,
    total_splits: u64,
    last_splits: Vec<SplitEvent>,
    repaired: u64,
}

impl Engine {
    fn new(cfg: SimConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            tension: cfg.tension,
            pool: LoopPool::new(cfg.max_loops),
            integrator: Integrator::from_config(&cfg),
            detector: IntersectionDetector::new(cfg.tolerance, cfg.min_separation),
            resampler: Resampler::new(cfg.arclength_subdivisions),
            frame: 0,
            total_splits: 0,
            last_splits: Vec::new(),
            repaired: 0,
            cfg,
        })
    }
}

/// Builds the configured seed loop.
pub fn seed_shape(cfg: &SimConfig) -> LoopShape {
    match cfg.seed_shape {
        SeedShape::Circle => LoopShape::circle(cfg.seed_points, cfg.seed_radius, cfg.tension),
        SeedShape::Perturbed => {
            let mut rng = StdRng::seed_from_u64(cfg.seed);
            LoopShape::perturbed(cfg.seed_points, cfg.seed_radius, cfg.seed_noise, &mut rng)
        }
    }
}

impl StringSimulation {
    /// Creates a simulation with default parameters, the given tension and
    /// one seed loop.
    pub fn new(tension: f64) -> Result<Self> {
        if !tension.is_finite() {
            return Err(SimError::InvalidTension(tension));
        }
        Self::with_config(SimConfig {
            tension,
            ..SimConfig::default()
        })
    }

    /// Creates a simulation seeded with one loop as described by `cfg`.
    pub fn with_config(cfg: SimConfig) -> Result<Self> {
        let mut engine = Engine::new(cfg)?;
        let id = engine.pool.insert(seed_shape(&engine.cfg))?;
        log::info!(
            "seeded {id} with {} points ({:?}), tension {}",
            engine.cfg.seed_points,
            engine.cfg.seed_shape,
            engine.tension
        );
        Ok(Self {
            engine: Some(engine),
        })
    }

    /// Creates a simulation whose initial population is `shapes`, inserted
    /// in order.
    pub fn from_shapes(cfg: SimConfig, shapes: Vec<LoopShape>) -> Result<Self> {
        let mut engine = Engine::new(cfg)?;
        if shapes.len() > engine.pool.max_loops() {
            return Err(SimError::InvalidShape(format!(
                "{} loops requested, at most {} allowed",
                shapes.len(),
                engine.pool.max_loops()
            )));
        }
        for shape in shapes {
            engine.pool.insert(shape)?;
        }
        log::info!("seeded {} loops from explicit shapes", engine.pool.len());
        Ok(Self {
            engine: Some(engine),
        })
    }

    fn engine(&self) -> Result<&Engine> {
        self.engine.as_ref().ok_or(SimError::Released)
    }

    fn engine_mut(&mut self) -> Result<&mut Engine> {
        self.engine.as_mut().ok_or(SimError::Released)
    }

    /// Advances the simulation by one frame of length `dt`.
    ///
    /// `dt` is clamped to the configured maximum frame delta and split into
    /// equal sub-steps. Detection and surgery run once per frame after all
    /// sub-steps, followed by the optional density drift resampling. A zero
    /// `dt` leaves the state untouched.
    ///
    /// ### Errors
    /// - [`SimError::InvalidTimeStep`] if `dt` is negative or not finite.
    /// - [`SimError::Released`] after [`StringSimulation::release`].
    pub fn step(&mut self, dt: f64) -> Result<()> {
        let engine = self.engine_mut()?;
        if !dt.is_finite() || dt < 0.0 {
            return Err(SimError::InvalidTimeStep(dt));
        }
        if dt == 0.0 {
            return Ok(());
        }
        let dt = dt.min(engine.cfg.max_frame_dt);

        let repaired = phases::integration_phase(
            &mut engine.pool,
            &mut engine.integrator,
            &engine.cfg,
            engine.tension,
            dt,
        );
        let splits = phases::split_phase(
            &mut engine.pool,
            &engine.detector,
            &engine.resampler,
            &engine.cfg,
        );
        let drifted = match &engine.cfg.drift_resample {
            Some(drift) => phases::drift_phase(&mut engine.pool, &engine.resampler, drift),
            None => 0,
        };

        engine.frame += 1;
        engine.repaired += repaired as u64;
        engine.total_splits += splits.len() as u64;
        engine.last_splits = splits;

        log::trace!(
            "frame {}: {} loops, {} splits, {} resampled, {} repairs",
            engine.frame,
            engine.pool.len(),
            engine.last_splits.len(),
            drifted,
            repaired
        );
        Ok(())
    }

    /// Changes the global tension. Takes effect on the next sub-step.
    pub fn set_tension(&mut self, tension: f64) -> Result<()> {
        let engine = self.engine_mut()?;
        if !tension.is_finite() {
            return Err(SimError::InvalidTension(tension));
        }
        engine.tension = tension;
        Ok(())
    }

    pub fn tension(&self) -> Result<f64> {
        Ok(self.engine()?.tension)
    }

    pub fn config(&self) -> Result<&SimConfig> {
        Ok(&self.engine()?.cfg)
    }

    /// Flattened positions:
    /// `[loop_count, (point_count, color, x0, y0, z0, x1, …) per loop]`
    /// in insertion order.
    pub fn positions(&self) -> Result<Vec<f64>> {
        let pool = &self.engine()?.pool;
        let len = 1 + pool.iter().map(|lp| 2 + 3 * lp.len()).sum::<usize>();
        let mut out = Vec::with_capacity(len);
        out.push(pool.len() as f64);
        for lp in pool.iter() {
            out.push(lp.len() as f64);
            out.push(lp.color.0 as f64);
            for p in &lp.points {
                out.extend_from_slice(&[p.x, p.y, p.z]);
            }
        }
        Ok(out)
    }

    /// Flattened speeds, keyed like [`StringSimulation::positions`] but with
    /// one scalar per point:
    /// `[loop_count, (point_count, color, |v0|, |v1|, …) per loop]`.
    pub fn velocity_magnitudes(&self) -> Result<Vec<f64>> {
        let pool = &self.engine()?.pool;
        let len = 1 + pool.iter().map(|lp| 2 + lp.len()).sum::<usize>();
        let mut out = Vec::with_capacity(len);
        out.push(pool.len() as f64);
        for lp in pool.iter() {
            out.push(lp.len() as f64);
            out.push(lp.color.0 as f64);
            out.extend(lp.speeds());
        }
        Ok(out)
    }

    /// Kinetic plus stretching energy summed over all active loops.
    pub fn total_energy(&self) -> Result<f64> {
        let engine = self.engine()?;
        Ok(engine
            .pool
            .iter()
            .map(|lp| lp.energy(engine.tension))
            .sum())
    }

    pub fn loop_count(&self) -> Result<usize> {
        Ok(self.engine()?.pool.len())
    }

    /// Owned copies of every active loop, in insertion order.
    pub fn snapshot(&self) -> Result<Vec<LoopState>> {
        Ok(self.engine()?.pool.iter().cloned().collect())
    }

    /// Splits applied during the most recent frame.
    pub fn last_splits(&self) -> Result<&[SplitEvent]> {
        Ok(&self.engine()?.last_splits)
    }

    pub fn total_splits(&self) -> Result<u64> {
        Ok(self.engine()?.total_splits)
    }

    /// Number of frames stepped so far.
    pub fn frame(&self) -> Result<u64> {
        Ok(self.engine()?.frame)
    }

    /// Number of point states repaired after non-finite integration results.
    pub fn repaired_points(&self) -> Result<u64> {
        Ok(self.engine()?.repaired)
    }

    /// Drops all numeric state. Every later call fails with
    /// [`SimError::Released`], including a second release.
    pub fn release(&mut self) -> Result<()> {
        let engine = self.engine.take().ok_or(SimError::Released)?;
        log::info!(
            "released simulation after {} frames with {} loops",
            engine.frame,
            engine.pool.len()
        );
        Ok(())
    }

    pub fn is_released(&self) -> bool {
        self.engine.is_none()
    }
}
