//! 128-bit ring token.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::token::traits::Token;

/// Position on a 128-bit ring.
///
/// Produced by the 128-bit partitioners; the width keeps vnode collisions
/// practically impossible even for very large rings.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct RingToken(pub u128);

impl Token for RingToken {
    fn distance_to(&self, other: &Self) -> Self {
        RingToken(other.0.wrapping_sub(self.0))
    }

    fn ring_fraction(&self) -> f64 {
        self.0 as f64 / u128::MAX as f64
    }
}

impl fmt::Display for RingToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_forward() {
        assert_eq!(RingToken(100).distance_to(&RingToken(250)), RingToken(150));
    }

    #[test]
    fn test_distance_wraps() {
        let d = RingToken(u128::MAX - 9).distance_to(&RingToken(5));
        assert_eq!(d, RingToken(15));
    }

    #[test]
    fn test_ring_fraction_bounds() {
        assert_eq!(RingToken(0).ring_fraction(), 0.0);
        assert_eq!(RingToken(u128::MAX).ring_fraction(), 1.0);
        let half = RingToken(u128::MAX / 2).ring_fraction();
        assert!((half - 0.5).abs() < 1e-9);
    }
}
