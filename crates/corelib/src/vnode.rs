//! Virtual node abstractions.
//!
//! # Virtual Nodes (VNodes) Concept
//!
//! Virtual nodes are a technique to improve load distribution in consistent hashing.
//! Instead of each physical node having a single token on the ring, each node has
//! multiple tokens (virtual nodes). This provides:
//!
//! 1. **Better Load Distribution**: More tokens = smoother distribution of keys
//! 2. **Gradual Rebalancing**: When nodes join/leave, only a fraction of keys move
//! 3. **Fault Tolerance**: Failure of one node affects fewer keys (distributed across vnodes)
//!
//! # Performance Characteristics
//!
//! - **Memory**: O(v) where v = number of vnodes per node
//! - **Lookup**: O(log n) where n = total vnodes (not affected by vnode count per node)
//! - **Rebalancing**: O(k/v) keys move when a node joins/leaves (k = total keys, v = vnodes/node)
//!
//! A node's vnode count is `weight × vnodes_per_weight`, so a node of weight 2
//! takes roughly twice the keys of a node of weight 1.

use crate::node::NodeId;
use crate::partitioner::Partitioner;
use crate::token::{RingToken, Token};

/// A virtual node on the hash ring.
///
/// Represents a single token position owned by a physical node.
///
/// # Invariants
///
/// - Inside a ring index every `VirtualNode` has a unique token; on a hash
///   collision the vnode of the lower `NodeId` is kept
/// - Every `VirtualNode` belongs to exactly one physical node
/// - Ordering is by token first, then node id, which is the tie-break order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct VirtualNode<T: Token = RingToken> {
    /// Token position on the ring.
    ///
    /// This is the hash of "node_id:vnode_index".
    pub token: T,

    /// The physical node that owns this virtual node.
    pub node_id: NodeId,
}

impl<T: Token> VirtualNode<T> {
    /// Create a new virtual node.
    #[inline]
    pub fn new(token: T, node_id: NodeId) -> Self {
        Self { token, node_id }
    }

    /// Create a virtual node from a node ID and vnode index.
    ///
    /// The token is the partitioner's hash of "node_id:vnode_index", so the
    /// same node always lands on the same positions.
    pub fn from_index<P>(partitioner: &P, node_id: NodeId, vnode_index: u32) -> Self
    where
        P: Partitioner<TokenType = T>,
    {
        let vnode_key = format!("{}:{}", node_id, vnode_index);
        Self::new(partitioner.partition(vnode_key.as_bytes()), node_id)
    }

    /// Get the token position.
    #[inline]
    pub fn token(&self) -> T {
        self.token
    }

    /// Get the owning node ID.
    #[inline]
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Clockwise distance to another virtual node.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> T {
        self.token.distance_to(&other.token)
    }
}

impl<T: Token + std::fmt::Display> std::fmt::Display for VirtualNode<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VNode(token={}, node={})", self.token, self.node_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partitioner::Xxh3Partitioner;

    #[test]
    fn test_vnode_creation() {
        let vnode = VirtualNode::new(RingToken(100), NodeId(1));
        assert_eq!(vnode.token(), RingToken(100));
        assert_eq!(vnode.node_id(), NodeId(1));
    }

    #[test]
    fn test_vnode_from_index() {
        let p = Xxh3Partitioner::default();
        let vnode0 = VirtualNode::from_index(&p, NodeId(1), 0);
        let vnode1 = VirtualNode::from_index(&p, NodeId(1), 1);

        assert_ne!(vnode0.token(), vnode1.token());
        assert_eq!(vnode0.node_id(), vnode1.node_id());
        assert_eq!(vnode0, VirtualNode::from_index(&p, NodeId(1), 0));
    }

    #[test]
    fn test_vnode_distance() {
        let vnode1 = VirtualNode::new(RingToken(100), NodeId(1));
        let vnode2 = VirtualNode::new(RingToken(200), NodeId(2));

        assert_eq!(vnode1.distance_to(&vnode2), RingToken(100));
    }

    #[test]
    fn test_vnode_ordering_breaks_ties_by_node() {
        let a = VirtualNode::new(RingToken(100), NodeId(1));
        let b = VirtualNode::new(RingToken(100), NodeId(2));
        let c = VirtualNode::new(RingToken(50), NodeId(9));

        assert!(c < a);
        assert!(a < b);
    }
}
