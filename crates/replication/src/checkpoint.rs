//! Persisted coordinator state.
//!
//! A checkpoint holds the ring membership, the last agreed Merkle root of
//! every synced partition and the last sync point of every replica pair.
//! Vnode tokens are not stored; restoring rebuilds them from membership.

use std::collections::BTreeMap;
use std::path::Path;

use corelib::hash::Digest;
use corelib::ring::MembershipSnapshot;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::partition::{PartitionId, SyncPair};

/// Marker left by the last successful sync of a pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncPoint {
    /// Source root both replicas agreed on.
    pub source_root: Digest,
    pub ring_version: u64,
    /// Wall clock, milliseconds since the Unix epoch.
    pub completed_at_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub ring: MembershipSnapshot,
    pub merkle_roots: BTreeMap<PartitionId, Digest>,
    pub sync_points: BTreeMap<SyncPair, SyncPoint>,
}

impl Checkpoint {
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(bytes)?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, self.to_bytes()?)?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_bytes(&std::fs::read(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use corelib::node::{Node, NodeId};
    use corelib::ring::HashRing;

    fn checkpoint() -> Checkpoint {
        let ring = HashRing::with_vnodes(16);
        ring.add_node(Node::new(NodeId(1), "a"), 1).unwrap();
        ring.add_node(Node::new(NodeId(2), "b"), 3).unwrap();

        let pair = SyncPair {
            partition: PartitionId(4),
            source: NodeId(1),
            target: NodeId(2),
        };
        Checkpoint {
            ring: ring.membership(),
            merkle_roots: BTreeMap::from([(PartitionId(4), Digest([7; 32]))]),
            sync_points: BTreeMap::from([(
                pair,
                SyncPoint {
                    source_root: Digest([7; 32]),
                    ring_version: 2,
                    completed_at_ms: 1_700_000_000_000,
                },
            )]),
        }
    }

    #[test]
    fn test_bytes_round_trip_exactly() {
        let checkpoint = checkpoint();
        let bytes = checkpoint.to_bytes().unwrap();
        let restored = Checkpoint::from_bytes(&bytes).unwrap();
        assert_eq!(restored, checkpoint);
        assert_eq!(restored.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_file_round_trip() {
        let path = std::env::temp_dir().join(format!("checkpoint-{}.bin", std::process::id()));
        let checkpoint = checkpoint();
        checkpoint.save(&path).unwrap();
        let restored = Checkpoint::load(&path);
        let _ = std::fs::remove_file(&path);
        assert_eq!(restored.unwrap(), checkpoint);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(Checkpoint::from_bytes(&[1, 2, 3]).is_err());
    }
}
