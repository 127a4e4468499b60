//! Velocity-Verlet stepping of the discretized closed-string wave equation.
//!
//! One call to [`Integrator::step`] performs
//! 1. a half kick with the acceleration at the current positions,
//! 2. a full drift with the half-kicked velocities,
//! 3. a recomputation of the acceleration at the new positions,
//! 4. the second half kick,
//!
//! followed by the stabilisers: non-finite recovery, a speed clamp and
//! linear damping.

use glam::DVec3;

use crate::{
    accel_buffer::AccelBuffer,
    config::SimConfig,
    loop_state::{LoopState, stiffness},
};

#[derive(Debug)]
pub struct Integrator {
    accel: AccelBuffer,
    max_speed: f64,
    damping: f64,
}

impl Integrator {
    pub fn new(max_speed: f64, damping: f64) -> Self {
        Self {
            accel: AccelBuffer::default(),
            max_speed,
            damping,
        }
    }

    pub fn from_config(cfg: &SimConfig) -> Self {
        Self::new(cfg.max_speed, cfg.damping)
    }

    /// Advances `lp` by one sub-step of length `dt` under `tension`.
    ///
    /// A non-positive `dt` leaves the loop untouched. Returns the number of
    /// points whose state had to be repaired because the step produced a
    /// non-finite value.
    pub fn step(&mut self, lp: &mut LoopState, tension: f64, dt: f64) -> usize {
        let n = lp.len();
        if !(dt > 0.0) || n < 3 {
            return 0;
        }
        let k = stiffness(tension, n);
        let half = 0.5 * dt;
        let mut repaired = 0;

        self.accel.compute(&lp.points, k);
        for (v, a) in lp.velocities.iter_mut().zip(self.accel.as_slice()) {
            *v += half * *a;
        }

        for (p, v) in lp.points.iter_mut().zip(lp.velocities.iter_mut()) {
            let next = *p + *v * dt;
            if next.is_finite() {
                *p = next;
            } else {
                *v = DVec3::ZERO;
                repaired += 1;
            }
        }

        self.accel.compute(&lp.points, k);
        let damp = (1.0 - self.damping * dt).max(0.0);
        for (v, a) in lp.velocities.iter_mut().zip(self.accel.as_slice()) {
            *v += half * *a;
            if !v.is_finite() {
                *v = DVec3::ZERO;
                repaired += 1;
                continue;
            }
            let speed = v.length();
            if speed > self.max_speed {
                *v *= self.max_speed / speed;
            }
            *v *= damp;
        }

        if repaired > 0 {
            log::warn!(
                "{}: repaired {repaired} non-finite point states (tension {tension}, dt {dt})",
                lp.id
            );
        }
        repaired
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loop_state::LoopShape,
        types::{ColorId, LoopId},
    };
    use approx::assert_relative_eq;

    fn circle(n: usize, radius: f64, tension: f64) -> LoopState {
        LoopState::from_shape(LoopId(0), ColorId(0), LoopShape::circle(n, radius, tension))
    }

    #[test]
    fn zero_dt_is_a_no_op() {
        let mut lp = circle(16, 1.0, 1.0);
        let before = lp.clone();
        let mut integrator = Integrator::new(10.0, 0.5);

        assert_eq!(integrator.step(&mut lp, 1.0, 0.0), 0);
        assert_eq!(lp, before);
    }

    #[test]
    fn static_circle_contracts_toward_its_center() {
        let mut lp = circle(32, 2.0, 1.0);
        for v in &mut lp.velocities {
            *v = DVec3::ZERO;
        }
        let mut integrator = Integrator::new(10.0, 0.0);
        integrator.step(&mut lp, 1.0, 0.01);

        for (p, v) in lp.points.iter().zip(&lp.velocities) {
            assert!(p.length() < 2.0);
            // Velocity points inward.
            assert!(p.dot(*v) < 0.0);
        }
    }

    #[test]
    fn rotating_circle_keeps_its_radius_without_damping() {
        let mut lp = circle(64, 5.0, 1.0);
        let e0 = lp.energy(1.0);
        let mut integrator = Integrator::new(100.0, 0.0);
        for _ in 0..3000 {
            integrator.step(&mut lp, 1.0, 0.01 / 3.0);
        }
        for p in &lp.points {
            assert_relative_eq!(p.length(), 5.0, max_relative = 1e-3);
        }
        assert_relative_eq!(lp.energy(1.0), e0, max_relative = 1e-3);
    }

    #[test]
    fn speed_is_clamped() {
        let mut lp = circle(16, 1.0, 0.0);
        for v in &mut lp.velocities {
            *v = DVec3::new(100.0, 0.0, 0.0);
        }
        let mut integrator = Integrator::new(2.0, 0.0);
        integrator.step(&mut lp, 0.0, 0.01);
        for s in lp.speeds() {
            assert!(s <= 2.0 + 1e-12);
        }
    }

    #[test]
    fn damping_reduces_kinetic_energy_of_free_motion() {
        // With zero tension the only velocity change comes from damping.
        let mut lp = circle(16, 1.0, 1.0);
        let ke0: f64 = lp.velocities.iter().map(|v| v.length_squared()).sum();
        let mut integrator = Integrator::new(100.0, 1.0);
        integrator.step(&mut lp, 0.0, 0.1);
        let ke1: f64 = lp.velocities.iter().map(|v| v.length_squared()).sum();
        assert_relative_eq!(ke1, ke0 * 0.81, max_relative = 1e-12);
    }

    #[test]
    fn non_finite_velocity_is_repaired() {
        let mut lp = circle(8, 1.0, 1.0);
        lp.velocities[2] = DVec3::new(f64::INFINITY, 0.0, 0.0);
        let mut integrator = Integrator::new(10.0, 0.0);

        let repaired = integrator.step(&mut lp, 1.0, 0.01);

        assert!(repaired >= 1);
        assert!(lp.is_finite());
    }
}
