//! Simple replication strategy.
//!
//! Places N replicas on the first N distinct nodes clockwise from the key's
//! token. Good for single data center clusters where failure domains do not
//! matter.
//!
//! # Performance
//!
//! - **Time**: O(log v + w) where v = vnodes and w = vnodes walked until N
//!   distinct nodes are seen
//! - **Space**: O(N)

use corelib::node::Node;
use corelib::partitioner::Partitioner;
use corelib::ring::RingSnapshot;
use corelib::Result;

use crate::strategy::ReplicationStrategy;

/// N replicas placed sequentially around the ring.
///
/// # Example
///
/// ```rust
/// use corelib::{HashRing, Node, NodeId};
/// use replication::{ReplicationStrategy, SimpleStrategy};
///
/// let ring = HashRing::new();
/// for id in 1..=4u128 {
///     ring.add_node(Node::new(NodeId(id), format!("node{id}")), 1).unwrap();
/// }
///
/// let strategy = SimpleStrategy::new(3);
/// let replicas = strategy.replicas_for_key(&ring.snapshot(), b"my-key").unwrap();
/// assert_eq!(replicas.len(), 3);
/// assert_eq!(replicas[0], ring.lookup(b"my-key").unwrap());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleStrategy {
    replication_factor: usize,
}

impl SimpleStrategy {
    /// `replication_factor` counts the primary: 1 means no replication.
    pub fn new(replication_factor: usize) -> Self {
        Self { replication_factor }
    }
}

impl Default for SimpleStrategy {
    fn default() -> Self {
        Self::new(3)
    }
}

impl<P: Partitioner> ReplicationStrategy<P> for SimpleStrategy {
    fn replication_factor(&self) -> usize {
        self.replication_factor
    }

    fn replicas_for_key(&self, ring: &RingSnapshot<P>, key: &[u8]) -> Result<Vec<Node>> {
        Ok(ring
            .nodes_for(key, self.replication_factor)?
            .into_iter()
            .cloned()
            .collect())
    }

    fn name(&self) -> &'static str {
        "SimpleStrategy"
    }
}
