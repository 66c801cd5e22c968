//! Partition identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A unit of replication. Its owners are the ring nodes for [`ring_key`].
///
/// [`ring_key`]: PartitionId::ring_key
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct PartitionId(pub u64);

impl PartitionId {
    pub fn ring_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for PartitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{}", self.0)
    }
}

impl From<u64> for PartitionId {
    fn from(id: u64) -> Self {
        PartitionId(id)
    }
}

/// Directed replica pair within one partition.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct SyncPair {
    pub partition: PartitionId,
    pub source: corelib::NodeId,
    pub target: corelib::NodeId,
}

impl fmt::Display for SyncPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} -> {}", self.partition, self.source, self.target)
    }
}
