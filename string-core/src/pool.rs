use std::collections::BTreeMap;

use crate::{
    error::{PoolError, SimError},
    loop_state::{LoopShape, LoopState},
    types::{ColorId, LoopId, MAX_LOOPS},
};

/// Arena of active loops keyed by [`LoopId`].
///
/// Ids and colors come from monotonically increasing counters, so iterating
/// the map in key order visits loops in insertion order.
#[derive(Debug)]
pub struct LoopPool {
    loops: BTreeMap<LoopId, LoopState>,
    next_id: u64,
    next_color: u32,
    max_loops: usize,
}

impl LoopPool {
    pub fn new(max_loops: usize) -> Self {
        Self {
            loops: BTreeMap::new(),
            next_id: 0,
            next_color: 0,
            max_loops: max_loops.clamp(1, MAX_LOOPS),
        }
    }

    fn issue_id(&mut self) -> LoopId {
        let id = LoopId(self.next_id);
        self.next_id += 1;
        id
    }

    fn issue_color(&mut self) -> ColorId {
        let color = ColorId(self.next_color);
        self.next_color += 1;
        color
    }

    /// Adds a new loop with a fresh id and color.
    pub fn insert(&mut self, shape: LoopShape) -> Result<LoopId, SimError> {
        shape.validate()?;
        if self.is_full() {
            return Err(SimError::InvalidShape(format!(
                "cannot hold more than {} loops",
                self.max_loops
            )));
        }
        let id = self.issue_id();
        let color = self.issue_color();
        self.loops.insert(id, LoopState::from_shape(id, color, shape));
        Ok(id)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.loops.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    #[inline]
    pub fn max_loops(&self) -> usize {
        self.max_loops
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.loops.len() >= self.max_loops
    }

    /// Ids of all active loops in insertion order.
    pub fn ids(&self) -> Vec<LoopId> {
        self.loops.keys().copied().collect()
    }

    pub fn get(&self, id: LoopId) -> Option<&LoopState> {
        self.loops.get(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LoopState> {
        self.loops.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut LoopState> {
        self.loops.values_mut()
    }

    /// Removes `parent` and inserts both daughters in one operation.
    ///
    /// `shares` are the daughters' point counts as cut from the parent; the
    /// larger share (the first on a tie) inherits the parent's color and the
    /// other receives a fresh one. Both daughters get fresh ids. Nothing is
    /// changed if the call fails.
    pub fn replace(
        &mut self,
        parent: LoopId,
        daughters: [LoopShape; 2],
        shares: [usize; 2],
    ) -> Result<[(LoopId, ColorId); 2], PoolError> {
        if self.is_full() {
            return Err(PoolError::Saturated(self.len()));
        }
        let Some(old) = self.loops.remove(&parent) else {
            return Err(PoolError::UnknownLoop(parent));
        };

        let inherit_first = shares[0] >= shares[1];
        let [first, second] = daughters;

        let first_id = self.issue_id();
        let second_id = self.issue_id();
        let (first_color, second_color) = if inherit_first {
            (old.color, self.issue_color())
        } else {
            (self.issue_color(), old.color)
        };

        self.loops.insert(
            first_id,
            LoopState::from_shape(first_id, first_color, first),
        );
        self.loops.insert(
            second_id,
            LoopState::from_shape(second_id, second_color, second),
        );

        Ok([(first_id, first_color), (second_id, second_color)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shape(n: usize) -> LoopShape {
        LoopShape::circle(n, 1.0, 1.0)
    }

    #[test]
    fn insert_issues_monotonic_ids_and_colors() {
        let mut pool = LoopPool::new(MAX_LOOPS);
        let a = pool.insert(shape(8)).unwrap();
        let b = pool.insert(shape(8)).unwrap();

        assert_eq!(a, LoopId(0));
        assert_eq!(b, LoopId(1));
        assert_eq!(pool.get(b).unwrap().color, ColorId(1));
        assert_eq!(pool.ids(), vec![a, b]);
    }

    #[test]
    fn insert_rejects_invalid_shapes_and_overflow() {
        let mut pool = LoopPool::new(1);
        let bad = LoopShape {
            points: shape(8).points,
            velocities: Vec::new(),
        };
        assert!(pool.insert(bad).is_err());
        assert!(pool.is_empty());

        pool.insert(shape(8)).unwrap();
        assert!(pool.insert(shape(8)).is_err());
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn replace_hands_color_to_larger_daughter() {
        let mut pool = LoopPool::new(MAX_LOOPS);
        let parent = pool.insert(shape(10)).unwrap();
        let parent_color = pool.get(parent).unwrap().color;

        let [(small_id, small_color), (big_id, big_color)] = pool
            .replace(parent, [shape(12), shape(12)], [3, 7])
            .unwrap();

        assert!(pool.get(parent).is_none());
        assert_eq!(pool.len(), 2);
        assert_eq!(big_color, parent_color);
        assert_ne!(small_color, parent_color);
        assert!(small_id > parent && big_id > small_id);
        // Daughters are appended after existing loops.
        assert_eq!(pool.ids(), vec![small_id, big_id]);
    }

    #[test]
    fn replace_ties_favor_first_daughter() {
        let mut pool = LoopPool::new(MAX_LOOPS);
        let parent = pool.insert(shape(10)).unwrap();
        let [(_, first_color), _] = pool
            .replace(parent, [shape(5), shape(5)], [5, 5])
            .unwrap();
        assert_eq!(first_color, ColorId(0));
    }

    #[test]
    fn replace_is_refused_when_saturated() {
        let mut pool = LoopPool::new(2);
        let parent = pool.insert(shape(8)).unwrap();
        pool.insert(shape(8)).unwrap();

        let err = pool
            .replace(parent, [shape(8), shape(8)], [4, 4])
            .unwrap_err();

        assert_eq!(err, PoolError::Saturated(2));
        assert!(pool.get(parent).is_some());
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn replace_unknown_parent_leaves_pool_untouched() {
        let mut pool = LoopPool::new(MAX_LOOPS);
        pool.insert(shape(8)).unwrap();
        let err = pool
            .replace(LoopId(42), [shape(8), shape(8)], [4, 4])
            .unwrap_err();
        assert_eq!(err, PoolError::UnknownLoop(LoopId(42)));
        assert_eq!(pool.len(), 1);
    }
}
