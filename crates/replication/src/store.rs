//! Storage collaborator seen by the coordinator.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bytes::Bytes;
use corelib::hash::{Blake3Hasher, Digest, StrongHasher};
use corelib::SyncConfig;
use merkle::{KeyRange, MerkleTree, TreeShape};
use parking_lot::RwLock;
use sketch::{BloomFilter, HyperLogLog};
use tracing::debug;

use crate::error::Result;
use crate::partition::PartitionId;

/// Key/value pairs of one key range, in key order.
pub type RangeContent = BTreeMap<Vec<u8>, Bytes>;

/// Digest of a stored value as fed to the Merkle tree.
pub fn content_digest(value: &[u8]) -> Digest {
    Blake3Hasher.digest(value)
}

/// Compact summary of one replica of a partition.
///
/// The sketches bound how much two replicas can differ; the tree localizes
/// where they do.
#[derive(Debug, Clone)]
pub struct ReplicaDigest {
    pub hll: HyperLogLog,
    pub bloom: BloomFilter,
    /// Keys spread evenly over the replica, spot-checked against the peer's
    /// Bloom filter.
    pub sample: Vec<Vec<u8>>,
    pub tree: MerkleTree,
}

impl ReplicaDigest {
    pub fn from_entries(entries: &RangeContent, config: &SyncConfig) -> Result<Self> {
        let mut hll = HyperLogLog::new(config.hll_precision)?;
        let mut bloom = BloomFilter::new(config.bloom_capacity, config.bloom_error_rate)?;
        for key in entries.keys() {
            hll.add(key);
            bloom.add(key);
        }

        let sample = if config.bloom_sample_size == 0 {
            Vec::new()
        } else {
            let step = (entries.len() / config.bloom_sample_size).max(1);
            entries
                .keys()
                .step_by(step)
                .take(config.bloom_sample_size)
                .cloned()
                .collect()
        };

        let shape = TreeShape::from_config(config)?;
        let tree = MerkleTree::build(
            shape,
            entries
                .iter()
                .map(|(key, value)| (key.clone(), content_digest(value))),
        );

        Ok(Self {
            hll,
            bloom,
            sample,
            tree,
        })
    }

    pub fn root(&self) -> Digest {
        self.tree.root_digest()
    }
}

/// Range-oriented access to one replica's partitions.
///
/// Implementations wrap local storage or a remote peer; failures should be
/// reported as [`SyncError::Transport`](crate::SyncError::Transport) so the
/// coordinator can retry them.
#[async_trait]
pub trait ReplicaStore: Send + Sync {
    /// Every entry of `partition` whose key falls in `range`.
    async fn read_range(&self, partition: PartitionId, range: &KeyRange) -> Result<RangeContent>;

    /// Replace the entries of `partition` within `range` with `content`.
    ///
    /// Keys in the range that are absent from `content` are deleted.
    async fn write_range(
        &self,
        partition: PartitionId,
        range: &KeyRange,
        content: RangeContent,
    ) -> Result<()>;

    /// Sketches and Merkle tree of the whole partition.
    async fn digest(&self, partition: PartitionId, config: &SyncConfig) -> Result<ReplicaDigest> {
        let entries = self.read_range(partition, &KeyRange::full()).await?;
        ReplicaDigest::from_entries(&entries, config)
    }
}

/// In-memory replica store backed by a `RwLock<HashMap>`.
///
/// Useful for tests and as the reference collaborator.
#[derive(Debug, Default)]
pub struct MemoryStore {
    partitions: RwLock<HashMap<PartitionId, RangeContent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, partition: PartitionId, key: impl Into<Vec<u8>>, value: impl Into<Bytes>) {
        self.partitions
            .write()
            .entry(partition)
            .or_default()
            .insert(key.into(), value.into());
    }

    pub fn delete(&self, partition: PartitionId, key: &[u8]) -> Option<Bytes> {
        self.partitions.write().get_mut(&partition)?.remove(key)
    }

    pub fn get(&self, partition: PartitionId, key: &[u8]) -> Option<Bytes> {
        self.partitions.read().get(&partition)?.get(key).cloned()
    }

    /// Snapshot of every entry in `partition`.
    pub fn entries(&self, partition: PartitionId) -> RangeContent {
        self.partitions
            .read()
            .get(&partition)
            .cloned()
            .unwrap_or_default()
    }

    pub fn len(&self, partition: PartitionId) -> usize {
        self.partitions.read().get(&partition).map_or(0, |p| p.len())
    }

    pub fn is_empty(&self, partition: PartitionId) -> bool {
        self.len(partition) == 0
    }
}

#[async_trait]
impl ReplicaStore for MemoryStore {
    async fn read_range(&self, partition: PartitionId, range: &KeyRange) -> Result<RangeContent> {
        let map = self.partitions.read();
        Ok(map
            .get(&partition)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(key, _)| range.contains_key(key))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn write_range(
        &self,
        partition: PartitionId,
        range: &KeyRange,
        content: RangeContent,
    ) -> Result<()> {
        let mut map = self.partitions.write();
        let entries = map.entry(partition).or_default();
        entries.retain(|key, _| !range.contains_key(key));
        let written = content.len();
        entries.extend(content.into_iter().filter(|(key, _)| range.contains_key(key)));
        debug!(%partition, %range, written, "replaced range in memory");
        Ok(())
    }
}
