use glam::DVec3;

/// A reusable scratch buffer holding the string acceleration of every point
/// of one loop.
///
/// For point `i` of a closed loop with `N` points, the buffer stores
///
/// - `k * (x[i+1] - 2 x[i] + x[i-1])`
///
/// where indices wrap around and `k` is the stiffness passed to
/// [`AccelBuffer::compute`]. The buffer is resized on demand, so one
/// instance can serve loops of different sizes without reallocating once
/// it has grown to the largest of them.
#[derive(Debug, Default)]
pub struct AccelBuffer {
    /// Acceleration per point, valid after the last `compute` call.
    acc: Vec<DVec3>,
}

impl AccelBuffer {
    #[inline]
    pub fn len(&self) -> usize {
        self.acc.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.acc.is_empty()
    }

    /// Fills the buffer with the cyclic second difference of `points`,
    /// scaled by `stiffness`.
    ///
    /// The buffer is resized to `points.len()`; every entry is overwritten,
    /// and a loop of fewer than 3 points gets zero acceleration.
    ///
    /// ### Parameters
    /// - `points` - Positions of a closed loop.
    /// - `stiffness` - Factor applied to the second difference.
    pub fn compute(&mut self, points: &[DVec3], stiffness: f64) {
        let n = points.len();
        self.acc.resize(n, DVec3::ZERO);
        if n < 3 {
            self.acc.fill(DVec3::ZERO);
            return;
        }
        for i in 0..n {
            let prev = points[(i + n - 1) % n];
            let next = points[(i + 1) % n];
            self.acc[i] = stiffness * (next - 2.0 * points[i] + prev);
        }
    }

    pub fn as_slice(&self) -> &[DVec3] {
        &self.acc
    }
}
