//! Topological surgery: cutting one closed loop into two at a crossing.

use glam::DVec3;

use crate::{error::SplitError, loop_state::LoopShape};

/// Result of a successful cut, before any resampling.
#[derive(Clone, Debug, PartialEq)]
pub struct Cut {
    /// Run `i..j` of the parent.
    pub first: LoopShape,
    /// Run `j..N` followed by `0..i` of the parent.
    pub second: LoopShape,
}

/// Splits a closed loop of `points`/`velocities` at the crossing `(i, j)`.
///
/// The first daughter takes points `i, …, j-1`; the second takes
/// `j, …, N-1, 0, …, i-1`. Each daughter closes back onto its own first
/// point, which bridges the seam because `p[i]` and `p[j]` lie within the
/// crossing tolerance. Every parent point and velocity ends up in exactly
/// one daughter.
///
/// ### Errors
/// - [`SplitError::OutOfRange`] unless `i < j < N`.
/// - [`SplitError::Degenerate`] if either daughter would have fewer than
///   3 points.
pub fn cut(points: &[DVec3], velocities: &[DVec3], i: usize, j: usize) -> Result<Cut, SplitError> {
    let len = points.len();
    if i >= j || j >= len || velocities.len() != len {
        return Err(SplitError::OutOfRange { i, j, len });
    }

    let first_len = j - i;
    let second_len = len - first_len;
    if first_len < 3 || second_len < 3 {
        return Err(SplitError::Degenerate {
            points: first_len.min(second_len),
        });
    }

    let first = LoopShape {
        points: points[i..j].to_vec(),
        velocities: velocities[i..j].to_vec(),
    };

    let mut second = LoopShape {
        points: Vec::with_capacity(second_len),
        velocities: Vec::with_capacity(second_len),
    };
    second.points.extend_from_slice(&points[j..]);
    second.points.extend_from_slice(&points[..i]);
    second.velocities.extend_from_slice(&velocities[j..]);
    second.velocities.extend_from_slice(&velocities[..i]);

    Ok(Cut { first, second })
}
