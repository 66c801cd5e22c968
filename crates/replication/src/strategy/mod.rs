//! Replication strategy abstractions.
//!
//! A strategy decides how many owners a partition has and which ring nodes
//! they are. The first owner is the primary and acts as the source of truth
//! when replicas are repaired.

pub mod simple;

pub use simple::SimpleStrategy;

use corelib::node::Node;
use corelib::partitioner::Partitioner;
use corelib::ring::RingSnapshot;
use corelib::Result;

/// Trait for replication strategies.
///
/// Implementations are shared across sync tasks, hence `Send + Sync`.
pub trait ReplicationStrategy<P: Partitioner>: Send + Sync + 'static {
    /// Owners per key, primary included.
    fn replication_factor(&self) -> usize;

    /// Owner nodes for `key` on one consistent ring view, primary first.
    ///
    /// Fails with `NoAvailableNode` on an empty ring.
    fn replicas_for_key(&self, ring: &RingSnapshot<P>, key: &[u8]) -> Result<Vec<Node>>;

    /// Human-readable strategy name for logging.
    fn name(&self) -> &'static str;
}
