//! HyperLogLog distinct-count estimator.
//!
//! Memory is fixed at `2^p` one-byte registers. The standard error of
//! [`HyperLogLog::estimate`] is about `1.04 / sqrt(2^p)`: 1.6% at the
//! default `p = 12`.
//!
//! Items are hashed to 64 bits. The top `p` bits select a register; the
//! register keeps the longest run of leading zeros (plus one) seen in the
//! remaining bits.

use corelib::hash::{KeyHasher, Xxh3Hasher};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SketchError};

pub const MIN_PRECISION: u8 = 4;
pub const MAX_PRECISION: u8 = 16;

/// 2^64 as a float, the size of the hash space.
const HASH_SPACE: f64 = 18_446_744_073_709_551_616.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawHyperLogLog<H>")]
pub struct HyperLogLog<H = Xxh3Hasher> {
    precision: u8,
    registers: Vec<u8>,
    hasher: H,
}

#[derive(Deserialize)]
struct RawHyperLogLog<H> {
    precision: u8,
    registers: Vec<u8>,
    hasher: H,
}

impl<H> TryFrom<RawHyperLogLog<H>> for HyperLogLog<H> {
    type Error = SketchError;

    fn try_from(raw: RawHyperLogLog<H>) -> Result<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&raw.precision) {
            return Err(SketchError::InvalidPrecision(raw.precision));
        }
        if raw.registers.len() != 1 << raw.precision {
            return Err(SketchError::Malformed("register count is not 2^precision"));
        }
        Ok(Self {
            precision: raw.precision,
            registers: raw.registers,
            hasher: raw.hasher,
        })
    }
}

impl HyperLogLog<Xxh3Hasher> {
    pub fn new(precision: u8) -> Result<Self> {
        Self::with_hasher(precision, Xxh3Hasher::default())
    }
}

impl<H: KeyHasher + Clone + PartialEq> HyperLogLog<H> {
    pub fn with_hasher(precision: u8, hasher: H) -> Result<Self> {
        if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
            return Err(SketchError::InvalidPrecision(precision));
        }
        Ok(Self {
            precision,
            registers: vec![0; 1 << precision],
            hasher,
        })
    }

    pub fn add(&mut self, item: &[u8]) {
        let hash = self.hasher.hash64(item);
        let p = self.precision as u32;
        let index = (hash >> (64 - p)) as usize;
        let rest = hash << p;
        let rank = if rest == 0 {
            (64 - p + 1) as u8
        } else {
            (rest.leading_zeros() + 1) as u8
        };
        if rank > self.registers[index] {
            self.registers[index] = rank;
        }
    }

    fn alpha(m: f64) -> f64 {
        match m as usize {
            16 => 0.673,
            32 => 0.697,
            64 => 0.709,
            _ => 0.7213 / (1.0 + 1.079 / m),
        }
    }

    /// Approximate number of distinct items added. Never negative.
    ///
    /// Applies the usual range corrections on top of the harmonic mean:
    /// linear counting while the raw estimate is below `5m/2` and registers
    /// are still empty, and the collision correction once the estimate
    /// approaches the size of the hash space.
    pub fn estimate(&self) -> f64 {
        let m = self.registers.len() as f64;
        let mut sum = 0.0;
        let mut zeros = 0usize;
        for &register in &self.registers {
            sum += 2f64.powi(-(register as i32));
            if register == 0 {
                zeros += 1;
            }
        }
        let raw = Self::alpha(m) * m * m / sum;

        if raw <= 2.5 * m {
            if zeros > 0 {
                return m * (m / zeros as f64).ln();
            }
            return raw;
        }
        if raw > HASH_SPACE / 30.0 {
            return -HASH_SPACE * (1.0 - raw / HASH_SPACE).ln();
        }
        raw
    }

    /// Union of `self` and `other`, leaving both untouched.
    pub fn merge(&self, other: &Self) -> Result<Self> {
        let mut merged = self.clone();
        merged.merge_from(other)?;
        Ok(merged)
    }

    /// Fold `other` into `self` by per-register max.
    ///
    /// Commutative and idempotent; merging a sketch into itself is a no-op.
    pub fn merge_from(&mut self, other: &Self) -> Result<()> {
        if self.precision != other.precision {
            return Err(SketchError::IncompatiblePrecision {
                left: self.precision,
                right: other.precision,
            });
        }
        if self.hasher != other.hasher {
            return Err(SketchError::IncompatibleHasher);
        }
        for (mine, theirs) in self.registers.iter_mut().zip(&other.registers) {
            *mine = (*mine).max(*theirs);
        }
        Ok(())
    }

    pub fn precision(&self) -> u8 {
        self.precision
    }

    pub fn registers(&self) -> &[u8] {
        &self.registers
    }

    /// Expected relative standard error, `1.04 / sqrt(2^p)`.
    pub fn relative_error(&self) -> f64 {
        1.04 / (self.registers.len() as f64).sqrt()
    }

    /// Nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.registers.iter().all(|r| *r == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(precision: u8, seed: u64, items: std::ops::Range<u32>) -> HyperLogLog {
        let mut hll = HyperLogLog::with_hasher(precision, Xxh3Hasher::with_seed(seed)).unwrap();
        for i in items {
            hll.add(&i.to_le_bytes());
        }
        hll
    }

    fn relative_gap(estimate: f64, truth: f64) -> f64 {
        (estimate - truth).abs() / truth
    }

    #[test]
    fn test_precision_bounds() {
        assert_eq!(HyperLogLog::new(3).unwrap_err(), SketchError::InvalidPrecision(3));
        assert_eq!(HyperLogLog::new(17).unwrap_err(), SketchError::InvalidPrecision(17));
        assert_eq!(HyperLogLog::new(4).unwrap().registers().len(), 16);
        assert_eq!(HyperLogLog::new(16).unwrap().registers().len(), 65_536);
    }

    #[test]
    fn test_empty_estimates_zero() {
        let hll = HyperLogLog::new(12).unwrap();
        assert!(hll.is_empty());
        assert_eq!(hll.estimate(), 0.0);
    }

    #[test]
    fn test_duplicates_do_not_count() {
        let mut hll = HyperLogLog::new(12).unwrap();
        for _ in 0..1_000 {
            hll.add(b"same");
        }
        assert!(hll.estimate() < 1.5);
    }

    #[test]
    fn test_small_range_uses_linear_counting() {
        let hll = filled(12, 0, 0..1_000);
        assert!(relative_gap(hll.estimate(), 1_000.0) < 0.05);
    }

    #[test]
    fn test_estimate_within_error_bound_over_trials() {
        let n = 50_000u32;
        let trials = 16;
        let mut within_two = 0;
        for seed in 0..trials {
            let hll = filled(12, seed, 0..n);
            let gap = relative_gap(hll.estimate(), n as f64);
            let bound = hll.relative_error();
            assert!(gap < 4.0 * bound, "seed {} gap {} bound {}", seed, gap, bound);
            if gap < 2.0 * bound {
                within_two += 1;
            }
        }
        assert!(within_two >= 13, "only {} of {} trials within 2σ", within_two, trials);
    }

    #[test]
    fn test_merge_of_disjoint_sets_estimates_union() {
        let a = filled(12, 7, 0..25_000);
        let b = filled(12, 7, 25_000..50_000);
        let union = a.merge(&b).unwrap();

        // Per-register max is exactly the sketch of the union.
        assert_eq!(union, filled(12, 7, 0..50_000));
        assert!(relative_gap(union.estimate(), 50_000.0) < 4.0 * union.relative_error());
    }

    #[test]
    fn test_merge_is_commutative_and_idempotent() {
        let a = filled(10, 1, 0..3_000);
        let b = filled(10, 1, 2_000..6_000);
        assert_eq!(a.merge(&b).unwrap(), b.merge(&a).unwrap());
        assert_eq!(a.merge(&a).unwrap(), a);
    }

    #[test]
    fn test_merge_rejects_mismatched_precision() {
        let a = HyperLogLog::new(10).unwrap();
        let b = HyperLogLog::new(12).unwrap();
        assert_eq!(
            a.merge(&b).unwrap_err(),
            SketchError::IncompatiblePrecision { left: 10, right: 12 }
        );
    }

    #[test]
    fn test_merge_rejects_mismatched_hasher() {
        let a = filled(10, 1, 0..10);
        let b = filled(10, 2, 0..10);
        assert_eq!(a.merge(&b).unwrap_err(), SketchError::IncompatibleHasher);
    }
}
