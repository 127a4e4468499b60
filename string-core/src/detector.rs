use glam::DVec3;

use crate::loop_state::LoopState;

/// A pair of non-adjacent points of one loop that came within tolerance.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Crossing {
    /// Lower index of the pair.
    pub i: usize,
    /// Higher index of the pair.
    pub j: usize,
    pub distance: f64,
}

/// Finds the closest pair of points that are far apart along the loop but
/// close together in space.
#[derive(Clone, Copy, Debug)]
pub struct IntersectionDetector {
    pub tolerance: f64,
    /// Minimum cyclic index separation; pairs closer than this along the
    /// loop (in either direction) are never reported.
    pub min_separation: usize,
}

/// Number of steps between indices `i` and `j` along a loop of `n` points,
/// taking the shorter way around.
#[inline]
pub fn cyclic_separation(i: usize, j: usize, n: usize) -> usize {
    let d = i.abs_diff(j) % n;
    d.min(n - d)
}

impl IntersectionDetector {
    pub fn new(tolerance: f64, min_separation: usize) -> Self {
        Self {
            tolerance,
            min_separation: min_separation.max(2),
        }
    }

    pub fn detect(&self, lp: &LoopState) -> Option<Crossing> {
        self.detect_points(&lp.points)
    }

    /// Scans every pair `(i, j)` with `i < j` and returns the one with the
    /// smallest distance below the tolerance.
    ///
    /// Pairs are visited in lexicographic order and only a strictly smaller
    /// distance replaces the current best, so exact ties resolve to the
    /// smallest `i`, then the smallest `j`.
    pub fn detect_points(&self, points: &[DVec3]) -> Option<Crossing> {
        let n = points.len();
        if n < 2 * self.min_separation {
            return None;
        }
        let tol2 = self.tolerance * self.tolerance;

        let mut best: Option<(usize, usize)> = None;
        let mut best_d2 = f64::INFINITY;
        for i in 0..n {
            let pi = points[i];
            for (j, &pj) in points.iter().enumerate().skip(i + self.min_separation) {
                if cyclic_separation(i, j, n) < self.min_separation {
                    continue;
                }
                let d2 = (pj - pi).length_squared();
                if d2 < tol2 && d2 < best_d2 {
                    best_d2 = d2;
                    best = Some((i, j));
                }
            }
        }

        best.map(|(i, j)| Crossing {
            i,
            j,
            distance: best_d2.sqrt(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        loop_state::LoopShape,
        types::{ColorId, LoopId},
    };
    use std::f64::consts::TAU;

    fn loop_from(points: Vec<DVec3>) -> LoopState {
        let velocities = vec![DVec3::ZERO; points.len()];
        LoopState::from_shape(LoopId(0), ColorId(0), LoopShape { points, velocities })
    }

    /// Planar figure eight: indices 0 and n/2 sit exactly on the origin.
    fn figure_eight(n: usize, radius: f64) -> Vec<DVec3> {
        (0..n)
            .map(|k| {
                let s = TAU * k as f64 / n as f64;
                DVec3::new(radius * s.sin(), radius * s.sin() * s.cos(), 0.0)
            })
            .collect()
    }

    #[test]
    fn cyclic_separation_takes_the_short_way() {
        assert_eq!(cyclic_separation(0, 1, 10), 1);
        assert_eq!(cyclic_separation(0, 9, 10), 1);
        assert_eq!(cyclic_separation(2, 7, 10), 5);
        assert_eq!(cyclic_separation(7, 2, 10), 5);
        assert_eq!(cyclic_separation(3, 3, 10), 0);
    }

    #[test]
    fn circle_has_no_crossing() {
        let lp = loop_from(LoopShape::circle(64, 5.0, 1.0).points);
        let det = IntersectionDetector::new(0.8, 8);
        assert_eq!(det.detect(&lp), None);
    }

    #[test]
    fn neighbours_are_never_reported() {
        // Densely sampled small circle: every neighbour is well within tolerance.
        let lp = loop_from(LoopShape::circle(64, 0.5, 1.0).points);
        let det = IntersectionDetector::new(0.01, 2);
        assert_eq!(det.detect(&lp), None);
    }

    #[test]
    fn figure_eight_crosses_at_its_center() {
        let lp = loop_from(figure_eight(64, 5.0));
        let det = IntersectionDetector::new(0.8, 8);

        let crossing = det.detect(&lp).expect("figure eight must cross");
        assert_eq!((crossing.i, crossing.j), (0, 32));
        assert!(crossing.distance < 1e-9);
    }

    #[test]
    fn wraparound_neighbours_are_excluded() {
        // Points 0 and 9 are adjacent across the seam of a 10-point loop.
        let mut points: Vec<DVec3> = (0..10)
            .map(|k| DVec3::new(k as f64 * 10.0, 0.0, 0.0))
            .collect();
        points[9] = DVec3::new(0.1, 0.0, 0.0);
        let det = IntersectionDetector::new(1.0, 3);
        assert_eq!(det.detect_points(&points), None);
    }

    #[test]
    fn exact_ties_prefer_smallest_indices() {
        // Two pairs at identical distance: (1, 6) and (2, 7).
        let mut points: Vec<DVec3> = (0..10)
            .map(|k| DVec3::new(k as f64 * 10.0, 0.0, 0.0))
            .collect();
        points[6] = points[1] + DVec3::new(0.0, 0.5, 0.0);
        points[7] = points[2] + DVec3::new(0.0, 0.5, 0.0);
        let det = IntersectionDetector::new(1.0, 3);

        let crossing = det.detect_points(&points).unwrap();
        assert_eq!((crossing.i, crossing.j), (1, 6));
    }

    #[test]
    fn closest_pair_wins_over_earlier_pairs() {
        let mut points: Vec<DVec3> = (0..12)
            .map(|k| DVec3::new(k as f64 * 10.0, 0.0, 0.0))
            .collect();
        points[5] = points[0] + DVec3::new(0.0, 0.9, 0.0);
        points[9] = points[3] + DVec3::new(0.0, 0.2, 0.0);
        let det = IntersectionDetector::new(1.0, 3);

        let crossing = det.detect_points(&points).unwrap();
        assert_eq!((crossing.i, crossing.j), (3, 9));
    }

    #[test]
    fn too_short_loops_are_skipped() {
        let points = vec![DVec3::ZERO; 5];
        let det = IntersectionDetector::new(1.0, 3);
        assert_eq!(det.detect_points(&points), None);
    }
}
