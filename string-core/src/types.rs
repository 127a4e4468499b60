use std::fmt;

/// Hard upper bound on simultaneously active loops.
pub const MAX_LOOPS: usize = 8;

/// Identifier for a loop in a [`crate::pool::LoopPool`].
///
/// Ids are issued from a monotonically increasing counter and never reused
/// within a process, so ordering by id is the same as ordering by insertion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LoopId(pub u64);

/// Visual identity of a loop.
///
/// Unlike [`LoopId`], a color survives a split: it is handed to the larger
/// daughter while the other daughter gets a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColorId(pub u32);

impl fmt::Display for LoopId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "loop#{}", self.0)
    }
}

impl fmt::Display for ColorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "color#{}", self.0)
    }
}
