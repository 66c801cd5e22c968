//! Tree geometry.

use corelib::config::{SyncConfig, MAX_MERKLE_LEAVES};
use serde::{Deserialize, Serialize};

use crate::error::{MerkleError, Result};

/// Fan-out and depth of a Merkle tree.
///
/// The shape alone decides how the key space is partitioned, independent of
/// the data, so two replicas built with the same shape always align.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TreeShape {
    fanout: usize,
    depth: u32,
}

impl TreeShape {
    pub fn new(fanout: usize, depth: u32) -> Result<Self> {
        if fanout < 2 {
            return Err(MerkleError::InvalidShape(format!("fanout {} < 2", fanout)));
        }
        if depth < 1 {
            return Err(MerkleError::InvalidShape("depth must be >= 1".into()));
        }
        match (fanout as u64).checked_pow(depth) {
            Some(leaves) if leaves <= MAX_MERKLE_LEAVES => Ok(Self { fanout, depth }),
            _ => Err(MerkleError::InvalidShape(format!(
                "{}^{} leaves exceeds {}",
                fanout, depth, MAX_MERKLE_LEAVES
            ))),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        Self::new(config.merkle_fanout, config.merkle_depth)
    }

    pub fn fanout(&self) -> usize {
        self.fanout
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn leaf_count(&self) -> usize {
        self.fanout.pow(self.depth)
    }
}
