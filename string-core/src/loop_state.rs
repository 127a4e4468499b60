use std::f64::consts::TAU;

use glam::DVec3;
use rand::Rng;

use crate::{
    error::SimError,
    types::{ColorId, LoopId},
};

/// Positions and velocities of a closed curve, before it is given an identity.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopShape {
    pub points: Vec<DVec3>,
    pub velocities: Vec<DVec3>,
}

/// One closed string loop.
///
/// `points` is cyclic: index `len - 1` is adjacent to index `0`.
/// `velocities` is indexed the same way.
#[derive(Clone, Debug, PartialEq)]
pub struct LoopState {
    pub id: LoopId,
    pub color: ColorId,
    pub points: Vec<DVec3>,
    pub velocities: Vec<DVec3>,
}

/// Squared wave speed of the discretized wave equation for a loop of `n`
/// points, i.e. the factor in front of the second difference.
#[inline]
pub fn stiffness(tension: f64, n: usize) -> f64 {
    let scale = n as f64 / TAU;
    tension * scale * scale
}

/// Total length of the closed polyline through `points`.
pub fn closed_length(points: &[DVec3]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| points[i].distance(points[(i + 1) % n]))
        .sum()
}

impl LoopShape {
    pub fn arclength(&self) -> f64 {
        closed_length(&self.points)
    }

    /// Checks the structural invariants every loop must satisfy.
    pub fn validate(&self) -> Result<(), SimError> {
        if self.points.len() < 3 {
            return Err(SimError::InvalidShape(format!(
                "a loop needs at least 3 points, got {}",
                self.points.len()
            )));
        }
        if self.points.len() != self.velocities.len() {
            return Err(SimError::InvalidShape(format!(
                "{} points but {} velocities",
                self.points.len(),
                self.velocities.len()
            )));
        }
        let finite = self
            .points
            .iter()
            .chain(self.velocities.iter())
            .all(|v| v.is_finite());
        if !finite {
            return Err(SimError::InvalidShape("non-finite coordinate".into()));
        }
        Ok(())
    }

    /// A circle of `radius` in the xy-plane, rotating rigidly about z.
    ///
    /// A discrete circle is an eigenvector of the cyclic second difference,
    /// so the angular velocity is chosen to make the centripetal
    /// acceleration match the string force exactly. Without damping the
    /// radius then stays constant up to integrator error.
    pub fn circle(n: usize, radius: f64, tension: f64) -> Self {
        let h = TAU / n as f64;
        let omega2 = stiffness(tension, n) * (2.0 - 2.0 * h.cos());
        let omega = omega2.max(0.0).sqrt();

        let mut points = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);
        for i in 0..n {
            let theta = h * i as f64;
            let (s, c) = theta.sin_cos();
            points.push(DVec3::new(radius * c, radius * s, 0.0));
            velocities.push(DVec3::new(-omega * radius * s, omega * radius * c, 0.0));
        }
        Self { points, velocities }
    }

    /// A pinched, out-of-plane loop with traveling-wave velocities that
    /// tends to cross itself after a short while.
    ///
    /// Every coordinate additionally receives uniform noise in
    /// `[-noise, noise]` drawn from `rng`.
    pub fn perturbed(n: usize, radius: f64, noise: f64, rng: &mut impl Rng) -> Self {
        let mut points = Vec::with_capacity(n);
        let mut velocities = Vec::with_capacity(n);
        for i in 0..n {
            let theta = TAU * i as f64 / n as f64;
            // Mode-2 radial pinch plus two out-of-plane lobes.
            let r = radius + 0.3 * radius * (2.0 * theta).cos();
            let mut p = DVec3::new(
                r * theta.cos(),
                r * theta.sin(),
                0.6 * radius * (2.0 * theta).sin() + 0.3 * radius * (3.0 * theta).cos(),
            );
            let v = DVec3::new(
                (3.0 * theta).sin(),
                (3.0 * theta).cos(),
                4.0 * (2.0 * theta).cos(),
            );
            if noise > 0.0 {
                p += DVec3::new(
                    rng.random_range(-noise..=noise),
                    rng.random_range(-noise..=noise),
                    rng.random_range(-noise..=noise),
                );
            }
            points.push(p);
            velocities.push(v);
        }
        Self { points, velocities }
    }
}

impl LoopState {
    pub fn from_shape(id: LoopId, color: ColorId, shape: LoopShape) -> Self {
        Self {
            id,
            color,
            points: shape.points,
            velocities: shape.velocities,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Returns `true` if every position and velocity is finite.
    pub fn is_finite(&self) -> bool {
        self.points
            .iter()
            .chain(self.velocities.iter())
            .all(|v| v.is_finite())
    }

    /// Total length of the closed polyline through `points`.
    pub fn arclength(&self) -> f64 {
        closed_length(&self.points)
    }

    /// Copies the geometry out, dropping the identity.
    pub fn shape(&self) -> LoopShape {
        LoopShape {
            points: self.points.clone(),
            velocities: self.velocities.clone(),
        }
    }

    pub fn speeds(&self) -> impl Iterator<Item = f64> + '_ {
        self.velocities.iter().map(|v| v.length())
    }

    /// Energy of this loop under the given tension.
    ///
    /// Each point carries mass `2π / N`; the potential is the discrete
    /// gradient energy whose derivative is the integrator's force, so the
    /// undamped dynamics conserve this quantity up to integrator error.
    pub fn energy(&self, tension: f64) -> f64 {
        let n = self.len();
        if n == 0 {
            return 0.0;
        }
        let kinetic: f64 = self.velocities.iter().map(|v| v.length_squared()).sum();
        let stretch: f64 = (0..n)
            .map(|i| (self.points[(i + 1) % n] - self.points[i]).length_squared())
            .sum();
        let mass = TAU / n as f64;
        mass * 0.5 * (kinetic + stiffness(tension, n) * stretch)
    }
}
