//! Probabilistic sketches used as cheap divergence pre-filters.
//!
//! - [`BloomFilter`]: "is this key possibly present on the other replica?"
//! - [`HyperLogLog`]: "roughly how many distinct keys does it hold?"
//!
//! Both are approximate by construction. Overfilling them degrades accuracy
//! but never fails. Neither is internally synchronized: callers ingesting
//! from several threads must serialize `add` or keep one sketch per thread
//! and merge.

pub mod bloom;
pub mod error;
pub mod hll;

pub use bloom::BloomFilter;
pub use error::{Result, SketchError};
pub use hll::HyperLogLog;
