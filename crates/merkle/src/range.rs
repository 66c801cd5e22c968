//! Key ranges over the 64-bit position space.

use std::fmt;

use corelib::hash::{KeyHasher, Xxh3Hasher};
use serde::{Deserialize, Serialize};

/// One past the last key position.
pub const KEY_SPACE_END: u128 = 1 << 64;

/// Position of `key` in the Merkle key space.
///
/// Every replica must use the same function, otherwise equal keys land in
/// different leaves and the trees never line up.
pub fn key_position(key: &[u8]) -> u64 {
    Xxh3Hasher::default().hash64(key)
}

/// Half-open range `[low, high)` of key positions.
///
/// Bounds are `u128` so the last range can end at 2^64.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct KeyRange {
    pub low: u128,
    pub high: u128,
}

impl KeyRange {
    pub fn new(low: u128, high: u128) -> Self {
        Self { low, high }
    }

    /// The whole key space.
    pub fn full() -> Self {
        Self::new(0, KEY_SPACE_END)
    }

    pub fn width(&self) -> u128 {
        self.high.saturating_sub(self.low)
    }

    pub fn contains_position(&self, position: u64) -> bool {
        let position = position as u128;
        position >= self.low && position < self.high
    }

    pub fn contains_key(&self, key: &[u8]) -> bool {
        self.contains_position(key_position(key))
    }

    /// Split into `parts` contiguous ranges covering `self` exactly.
    pub fn split(&self, parts: usize) -> Vec<KeyRange> {
        let parts = parts as u128;
        let width = self.width();
        (0..parts)
            .map(|i| {
                KeyRange::new(
                    self.low + width * i / parts,
                    self.low + width * (i + 1) / parts,
                )
            })
            .collect()
    }
}

impl fmt::Display for KeyRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#x}, {:#x})", self.low, self.high)
    }
}
