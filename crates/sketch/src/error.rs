//! Error types for the probabilistic sketches.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, SketchError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SketchError {
    #[error("bloom filter capacity must be at least 1")]
    InvalidCapacity,
    #[error("bloom filter error rate {0} is not in (0, 1)")]
    InvalidErrorRate(f64),
    #[error("hyperloglog precision {0} is not in 4..=16")]
    InvalidPrecision(u8),
    /// Registers of different sizes cannot be merged.
    #[error("cannot merge hyperloglogs of precision {left} and {right}")]
    IncompatiblePrecision { left: u8, right: u8 },
    /// Filters with different bit counts or probe counts cannot be combined.
    #[error("bloom filters differ in size or hash count")]
    IncompatibleGeometry,
    /// Decoded fields contradict each other.
    #[error("malformed sketch: {0}")]
    Malformed(&'static str),
    /// Sketches hashed with different functions are not comparable.
    #[error("sketches were built with different hashers")]
    IncompatibleHasher,
}
