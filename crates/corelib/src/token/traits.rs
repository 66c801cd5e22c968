//! The token abstraction.

use std::fmt::Debug;
use std::hash::Hash;

/// A position on the hash ring.
///
/// Tokens wrap around: the successor of the largest token is the smallest.
pub trait Token: Copy + Ord + Hash + Send + Sync + Debug + 'static {
    /// Clockwise distance from `self` to `other`, wrapping past the end.
    fn distance_to(&self, other: &Self) -> Self;

    /// This token read as a share of the whole ring, in `[0, 1]`.
    ///
    /// Mostly useful on distances, to report how much of the ring an arc covers.
    fn ring_fraction(&self) -> f64;
}
