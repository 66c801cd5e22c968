//! Sync engine configuration.
//!
//! Every field has a default, so a partial JSON document is enough:
//!
//! ```rust
//! use corelib::SyncConfig;
//!
//! let json = r#"{ "replication_factor": 2, "merkle_fanout": 8 }"#;
//! let config = SyncConfig::from_json(json).unwrap();
//! assert_eq!(config.replication_factor, 2);
//! assert_eq!(config.hll_precision, 12);
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Upper bound on Merkle leaves, keeps a misconfigured tree from eating memory.
pub const MAX_MERKLE_LEAVES: u64 = 1 << 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Owners per partition, primary included.
    pub replication_factor: usize,
    /// Vnodes for a node of weight 1.
    pub vnodes_per_weight: u32,
    /// Target Bloom false-positive rate at `bloom_capacity`.
    pub bloom_error_rate: f64,
    pub bloom_capacity: usize,
    /// HyperLogLog uses `2^hll_precision` registers.
    pub hll_precision: u8,
    /// Relative cardinality gap still treated as "agreeing".
    pub hll_tolerance: f64,
    /// Keys sampled from each replica for Bloom spot checks.
    pub bloom_sample_size: usize,
    pub merkle_fanout: usize,
    pub merkle_depth: u32,
    pub delta_block_size: usize,
    /// Retries per range before the session fails.
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    /// Deadline for each storage/transport call.
    pub io_timeout_ms: u64,
    pub parallel_diff: bool,
    /// Short-circuit on sketch agreement alone, without comparing roots.
    pub trust_estimates: bool,
    /// Cardinality gap ratio above which a whole partition is shipped at once.
    pub full_transfer_ratio: f64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            replication_factor: 3,
            vnodes_per_weight: 128,
            bloom_error_rate: 0.01,
            bloom_capacity: 100_000,
            hll_precision: 12,
            hll_tolerance: 0.05,
            bloom_sample_size: 64,
            merkle_fanout: 16,
            merkle_depth: 3,
            delta_block_size: 512,
            max_retries: 3,
            retry_backoff_ms: 50,
            io_timeout_ms: 5_000,
            parallel_diff: true,
            trust_estimates: false,
            full_transfer_ratio: 0.5,
        }
    }
}

impl SyncConfig {
    /// Parse and validate a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: SyncConfig =
            serde_json::from_str(json).map_err(|e| Error::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| Error::InvalidConfig(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        if self.replication_factor < 1 {
            return invalid("replication_factor must be >= 1".into());
        }
        if self.vnodes_per_weight < 1 {
            return invalid("vnodes_per_weight must be >= 1".into());
        }
        if !(self.bloom_error_rate > 0.0 && self.bloom_error_rate < 1.0) {
            return invalid(format!("bloom_error_rate {} not in (0, 1)", self.bloom_error_rate));
        }
        if self.bloom_capacity < 1 {
            return invalid("bloom_capacity must be >= 1".into());
        }
        if !(4..=16).contains(&self.hll_precision) {
            return invalid(format!("hll_precision {} not in 4..=16", self.hll_precision));
        }
        if self.hll_tolerance < 0.0 || self.hll_tolerance.is_nan() {
            return invalid("hll_tolerance must be >= 0".into());
        }
        if self.merkle_fanout < 2 {
            return invalid("merkle_fanout must be >= 2".into());
        }
        if !(1..=8).contains(&self.merkle_depth) {
            return invalid(format!("merkle_depth {} not in 1..=8", self.merkle_depth));
        }
        let leaves = (self.merkle_fanout as u64).checked_pow(self.merkle_depth);
        if leaves.map_or(true, |n| n > MAX_MERKLE_LEAVES) {
            return invalid(format!(
                "merkle_fanout^merkle_depth exceeds {} leaves",
                MAX_MERKLE_LEAVES
            ));
        }
        if self.delta_block_size < 1 {
            return invalid("delta_block_size must be >= 1".into());
        }
        if !(self.full_transfer_ratio > 0.0) {
            return invalid("full_transfer_ratio must be > 0".into());
        }
        Ok(())
    }
}
