//! Bloom filter.
//!
//! Answers "was this item possibly added?" with no false negatives and a
//! false-positive rate bounded by the `error_rate` chosen at construction,
//! as long as no more than `capacity` items are added.
//!
//! The filter never grows and has no removal. Adding more than `capacity`
//! items is allowed: nothing fails, the false-positive rate just climbs
//! (see [`BloomFilter::estimated_false_positive_rate`]).

use std::f64::consts::LN_2;

use corelib::hash::{KeyHasher, Xxh3Hasher};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SketchError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawBloomFilter<H>")]
pub struct BloomFilter<H = Xxh3Hasher> {
    words: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    capacity: usize,
    error_rate: f64,
    items: usize,
    hasher: H,
}

/// Wire form, checked before it becomes a [`BloomFilter`].
#[derive(Deserialize)]
struct RawBloomFilter<H> {
    words: Vec<u64>,
    num_bits: u64,
    num_hashes: u32,
    capacity: usize,
    error_rate: f64,
    items: usize,
    hasher: H,
}

impl<H> TryFrom<RawBloomFilter<H>> for BloomFilter<H> {
    type Error = SketchError;

    fn try_from(raw: RawBloomFilter<H>) -> Result<Self> {
        if raw.capacity == 0 {
            return Err(SketchError::InvalidCapacity);
        }
        if !(raw.error_rate > 0.0 && raw.error_rate < 1.0) {
            return Err(SketchError::InvalidErrorRate(raw.error_rate));
        }
        if raw.num_bits == 0 || raw.words.len() as u64 != raw.num_bits.div_ceil(64) {
            return Err(SketchError::Malformed("bit count does not match word count"));
        }
        if raw.num_hashes == 0 || raw.num_hashes as u64 > raw.num_bits {
            return Err(SketchError::Malformed("hash count out of range"));
        }
        Ok(Self {
            words: raw.words,
            num_bits: raw.num_bits,
            num_hashes: raw.num_hashes,
            capacity: raw.capacity,
            error_rate: raw.error_rate,
            items: raw.items,
            hasher: raw.hasher,
        })
    }
}

/// `m = -n ln(p) / (ln 2)^2`, at least 1.
pub fn optimal_num_bits(capacity: usize, error_rate: f64) -> u64 {
    let m = -(capacity as f64) * error_rate.ln() / (LN_2 * LN_2);
    (m.ceil() as u64).max(1)
}

/// `k = (m / n) ln 2`, rounded, at least 1.
pub fn optimal_num_hashes(capacity: usize, num_bits: u64) -> u32 {
    let k = (num_bits as f64 / capacity as f64) * LN_2;
    (k.round() as u32).max(1)
}

impl BloomFilter<Xxh3Hasher> {
    /// Filter sized for `capacity` items at `error_rate` false positives.
    pub fn new(capacity: usize, error_rate: f64) -> Result<Self> {
        Self::with_hasher(capacity, error_rate, Xxh3Hasher::default())
    }
}

impl<H: KeyHasher + Clone + PartialEq> BloomFilter<H> {
    pub fn with_hasher(capacity: usize, error_rate: f64, hasher: H) -> Result<Self> {
        if capacity == 0 {
            return Err(SketchError::InvalidCapacity);
        }
        if !(error_rate > 0.0 && error_rate < 1.0) {
            return Err(SketchError::InvalidErrorRate(error_rate));
        }
        let num_bits = optimal_num_bits(capacity, error_rate);
        let num_hashes = optimal_num_hashes(capacity, num_bits);
        Ok(Self {
            words: vec![0; num_bits.div_ceil(64) as usize],
            num_bits,
            num_hashes,
            capacity,
            error_rate,
            items: 0,
            hasher,
        })
    }

    /// Bit positions for `item`: double hashing `h1 + i·h2` over the two
    /// halves of one 128-bit hash. `h2` is forced odd so the probes never
    /// collapse onto one position.
    fn positions(&self, item: &[u8]) -> impl Iterator<Item = u64> + '_ {
        let h = self.hasher.hash128(item);
        let h1 = h as u64;
        let h2 = ((h >> 64) as u64) | 1;
        (0..self.num_hashes as u64)
            .map(move |i| h1.wrapping_add(i.wrapping_mul(h2)) % self.num_bits)
    }

    pub fn add(&mut self, item: &[u8]) {
        let positions: Vec<u64> = self.positions(item).collect();
        for bit in positions {
            self.words[(bit / 64) as usize] |= 1 << (bit % 64);
        }
        self.items += 1;
    }

    /// `false` means definitely never added.
    pub fn contains(&self, item: &[u8]) -> bool {
        self.positions(item)
            .all(|bit| self.words[(bit / 64) as usize] & (1 << (bit % 64)) != 0)
    }

    /// Number of `add` calls, duplicates included.
    pub fn len(&self) -> usize {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn error_rate(&self) -> f64 {
        self.error_rate
    }

    pub fn num_bits(&self) -> u64 {
        self.num_bits
    }

    pub fn num_hashes(&self) -> u32 {
        self.num_hashes
    }

    /// More items were added than the filter was sized for.
    pub fn is_saturated(&self) -> bool {
        self.items > self.capacity
    }

    /// `(1 - e^(-k·n/m))^k` for the current item count.
    pub fn estimated_false_positive_rate(&self) -> f64 {
        let k = self.num_hashes as f64;
        let exponent = -k * self.items as f64 / self.num_bits as f64;
        (1.0 - exponent.exp()).powf(k)
    }

    /// Union with a filter of identical geometry and hasher.
    pub fn union_from(&mut self, other: &Self) -> Result<()> {
        if self.num_bits != other.num_bits || self.num_hashes != other.num_hashes {
            return Err(SketchError::IncompatibleGeometry);
        }
        if self.hasher != other.hasher {
            return Err(SketchError::IncompatibleHasher);
        }
        for (mine, theirs) in self.words.iter_mut().zip(&other.words) {
            *mine |= *theirs;
        }
        self.items += other.items;
        Ok(())
    }
}
