//! Arclength-uniform resampling of closed loops.
//!
//! A periodic cubic spline is fitted through the points using chord-length
//! knots. Its arclength is tabulated by dense sub-sampling and inverted so
//! that the output points sit at equal arclength fractions, starting at the
//! loop's first point. Velocities are interpolated linearly at the same
//! spline parameters.

use std::ops::{Add, Mul, Sub};

use glam::DVec3;

use crate::loop_state::LoopShape;

/// Smallest number of points a resampled loop may have.
pub const MIN_POINTS: usize = 3;

#[derive(Clone, Copy, Debug)]
pub struct Resampler {
    /// Spline samples per segment used for the arclength table.
    pub subdivisions: usize,
}

impl Default for Resampler {
    fn default() -> Self {
        Self { subdivisions: 8 }
    }
}

/// Periodic cubic spline through a closed sequence of points.
#[derive(Debug)]
struct PeriodicSpline<'a> {
    points: &'a [DVec3],
    /// Knot spacing: `h[k]` is the parameter length of segment `k -> k+1`.
    h: Vec<f64>,
    /// Parameter value at the start of each segment.
    t: Vec<f64>,
    /// Second derivatives at the knots.
    m: Vec<DVec3>,
}

impl<'a> PeriodicSpline<'a> {
    fn fit(points: &'a [DVec3]) -> Self {
        let n = points.len();
        let mut h: Vec<f64> = (0..n)
            .map(|k| points[k].distance(points[(k + 1) % n]))
            .collect();
        let total: f64 = h.iter().sum();
        // Coincident neighbours would give zero-length knot intervals.
        let min_h = (total * 1e-9).max(1e-12);
        for hk in &mut h {
            *hk = hk.max(min_h);
        }

        let mut t = Vec::with_capacity(n);
        let mut acc = 0.0;
        for hk in &h {
            t.push(acc);
            acc += hk;
        }

        let mut a = Vec::with_capacity(n);
        let mut b = Vec::with_capacity(n);
        let mut c = Vec::with_capacity(n);
        let mut r = Vec::with_capacity(n);
        for k in 0..n {
            let prev = (k + n - 1) % n;
            let next = (k + 1) % n;
            a.push(h[prev]);
            b.push(2.0 * (h[prev] + h[k]));
            c.push(h[k]);
            let slope_out = (points[next] - points[k]) * (1.0 / h[k]);
            let slope_in = (points[k] - points[prev]) * (1.0 / h[prev]);
            r.push((slope_out - slope_in) * 6.0);
        }
        let corner = h[n - 1];
        let m = solve_cyclic(&a, &b, &c, corner, corner, &r);

        Self { points, h, t, m }
    }

    #[inline]
    fn period(&self) -> f64 {
        let last = self.h.len() - 1;
        self.t[last] + self.h[last]
    }

    /// Evaluates segment `k` at local parameter `u ∈ [0, h[k]]`.
    fn eval(&self, k: usize, u: f64) -> DVec3 {
        let n = self.points.len();
        let next = (k + 1) % n;
        let h = self.h[k];
        let b = (u / h).clamp(0.0, 1.0);
        let a = 1.0 - b;
        a * self.points[k]
            + b * self.points[next]
            + ((a * a * a - a) * self.m[k] + (b * b * b - b) * self.m[next]) * (h * h / 6.0)
    }
}

impl Resampler {
    pub fn new(subdivisions: usize) -> Self {
        Self {
            subdivisions: subdivisions.max(1),
        }
    }

    /// Returns a loop of exactly `target` points (at least [`MIN_POINTS`])
    /// evenly spaced by arclength along the spline through `shape`.
    ///
    /// `shape` must hold at least 3 points with one velocity each.
    pub fn resample(&self, shape: &LoopShape, target: usize) -> LoopShape {
        let target = target.max(MIN_POINTS);
        let n = shape.points.len();
        if n < MIN_POINTS || shape.velocities.len() != n {
            return shape.clone();
        }

        let spline = PeriodicSpline::fit(&shape.points);
        let period = spline.period();
        let subdiv = self.subdivisions.max(1);

        // Dense table of (global parameter, segment, cumulative length).
        let samples = n * subdiv;
        let mut params = Vec::with_capacity(samples + 1);
        let mut segments = Vec::with_capacity(samples + 1);
        let mut cumulative = Vec::with_capacity(samples + 1);
        let mut prev = spline.eval(0, 0.0);
        let mut length = 0.0;
        for k in 0..n {
            for s in 0..subdiv {
                let u = spline.h[k] * s as f64 / subdiv as f64;
                let p = spline.eval(k, u);
                length += p.distance(prev);
                prev = p;
                params.push(spline.t[k] + u);
                segments.push(k);
                cumulative.push(length);
            }
        }
        length += spline.eval(0, 0.0).distance(prev);
        params.push(period);
        segments.push(n - 1);
        cumulative.push(length);

        let mut points = Vec::with_capacity(target);
        let mut velocities = Vec::with_capacity(target);
        let mut m = 0;
        for q in 0..target {
            let tau = if length > 0.0 && length.is_finite() {
                let s = length * q as f64 / target as f64;
                while m + 2 < cumulative.len() && cumulative[m + 1] <= s {
                    m += 1;
                }
                let span = cumulative[m + 1] - cumulative[m];
                let f = if span > 0.0 {
                    ((s - cumulative[m]) / span).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                params[m] + f * (params[m + 1] - params[m])
            } else {
                period * q as f64 / target as f64
            };

            let k = segment_at(&spline.t, tau, segments.get(m).copied().unwrap_or(0));
            let u = (tau - spline.t[k]).clamp(0.0, spline.h[k]);
            points.push(spline.eval(k, u));

            let next = (k + 1) % n;
            let w = u / spline.h[k];
            velocities.push(shape.velocities[k].lerp(shape.velocities[next], w));
        }

        LoopShape { points, velocities }
    }
}

/// Finds the segment containing parameter `tau`, starting the search at
/// `hint`.
fn segment_at(t: &[f64], tau: f64, hint: usize) -> usize {
    let n = t.len();
    let mut k = hint.min(n - 1);
    while k + 1 < n && t[k + 1] <= tau {
        k += 1;
    }
    while k > 0 && t[k] > tau {
        k -= 1;
    }
    k
}

/// Solves a tridiagonal system with sub-diagonal `a`, diagonal `b` and
/// super-diagonal `c` (`a[0]` and `c[n-1]` are ignored).
fn solve_tridiagonal<T>(a: &[f64], b: &[f64], c: &[f64], r: &[T]) -> Vec<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let n = r.len();
    let mut gam = vec![0.0; n];
    let mut u = Vec::with_capacity(n);
    let mut bet = b[0];
    u.push(r[0] * (1.0 / bet));
    for j in 1..n {
        gam[j] = c[j - 1] / bet;
        bet = b[j] - a[j] * gam[j];
        let prev = u[j - 1];
        u.push((r[j] - prev * a[j]) * (1.0 / bet));
    }
    for j in (0..n - 1).rev() {
        let next = u[j + 1];
        u[j] = u[j] - next * gam[j + 1];
    }
    u
}

/// Solves a cyclic tridiagonal system via the Sherman-Morrison correction.
///
/// `alpha` is the bottom-left corner entry, `beta` the top-right one.
/// Requires `n >= 3` and a diagonally dominant matrix.
fn solve_cyclic<T>(a: &[f64], b: &[f64], c: &[f64], alpha: f64, beta: f64, r: &[T]) -> Vec<T>
where
    T: Copy + Add<Output = T> + Sub<Output = T> + Mul<f64, Output = T>,
{
    let n = r.len();
    let gamma = -b[0];
    let mut bb = b.to_vec();
    bb[0] = b[0] - gamma;
    bb[n - 1] = b[n - 1] - alpha * beta / gamma;

    let mut x = solve_tridiagonal(a, &bb, c, r);

    let mut u = vec![0.0; n];
    u[0] = gamma;
    u[n - 1] = alpha;
    let z = solve_tridiagonal(a, &bb, c, &u);

    let denom = 1.0 + z[0] + beta * z[n - 1] / gamma;
    let fact = (x[0] + x[n - 1] * (beta / gamma)) * (1.0 / denom);
    for (xi, zi) in x.iter_mut().zip(&z) {
        *xi = *xi - fact * *zi;
    }
    x
}
