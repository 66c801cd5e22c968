//! Hash ring with copy-on-write membership.
//!
//! Readers grab an `Arc<RingSnapshot>` under a short read lock and then work
//! lock-free on an immutable view. Writers are serialized by a dedicated
//! mutex, build a new snapshot off to the side, and publish it with a single
//! pointer swap. A reader therefore observes either the old or the new ring,
//! never a half-applied change.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::partitioner::{Partitioner, Xxh3Partitioner};
use crate::ring::snapshot::{Member, MembershipSnapshot, RingSnapshot};

/// Default vnode count for a node of weight 1.
pub const DEFAULT_VNODES_PER_WEIGHT: u32 = 128;

/// Consistent hash ring mapping keys to nodes.
pub struct HashRing<P: Partitioner = Xxh3Partitioner> {
    partitioner: Arc<P>,
    vnodes_per_weight: u32,
    current: RwLock<Arc<RingSnapshot<P>>>,
    writer: Mutex<()>,
}

impl HashRing<Xxh3Partitioner> {
    /// Empty ring with the xxh3 partitioner and default vnode density.
    pub fn new() -> Self {
        Self::with_partitioner(Xxh3Partitioner::default(), DEFAULT_VNODES_PER_WEIGHT)
    }

    /// Empty ring with the xxh3 partitioner.
    pub fn with_vnodes(vnodes_per_weight: u32) -> Self {
        Self::with_partitioner(Xxh3Partitioner::default(), vnodes_per_weight)
    }
}

impl Default for HashRing<Xxh3Partitioner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Partitioner> HashRing<P> {
    /// Empty ring using `partitioner`. A `vnodes_per_weight` of 0 is raised to 1.
    pub fn with_partitioner(partitioner: P, vnodes_per_weight: u32) -> Self {
        let partitioner = Arc::new(partitioner);
        let vnodes_per_weight = vnodes_per_weight.max(1);
        let empty = RingSnapshot::build(
            Arc::clone(&partitioner),
            vnodes_per_weight,
            0,
            BTreeMap::new(),
        );
        Self {
            partitioner,
            vnodes_per_weight,
            current: RwLock::new(Arc::new(empty)),
            writer: Mutex::new(()),
        }
    }

    /// Rebuild a ring from a checkpointed membership.
    ///
    /// Fails if the membership was recorded with a different partitioner,
    /// since every vnode position would differ.
    pub fn from_membership(partitioner: P, membership: &MembershipSnapshot) -> Result<Self> {
        if membership.partitioner != partitioner.name() {
            return Err(Error::InvalidConfig(format!(
                "membership was built with {}, not {}",
                membership.partitioner,
                partitioner.name()
            )));
        }
        let ring = Self::with_partitioner(partitioner, membership.vnodes_per_weight);
        let mut members = BTreeMap::new();
        for member in &membership.members {
            ring.check_weight(&member.node, member.weight)?;
            members.insert(member.node.id, member.clone());
        }
        let snapshot = RingSnapshot::build(
            Arc::clone(&ring.partitioner),
            ring.vnodes_per_weight,
            membership.version,
            members,
        );
        *ring.current.write() = Arc::new(snapshot);
        Ok(ring)
    }

    /// Current consistent view of the ring.
    pub fn snapshot(&self) -> Arc<RingSnapshot<P>> {
        self.current.read().clone()
    }

    fn check_weight(&self, node: &Node, weight: u32) -> Result<()> {
        if weight == 0 {
            return Err(Error::InvalidNode(format!("{} has weight 0", node)));
        }
        if weight.checked_mul(self.vnodes_per_weight).is_none() {
            return Err(Error::InvalidNode(format!("{} weight {} is too large", node, weight)));
        }
        Ok(())
    }

    /// Apply `change` to a copy of the membership and publish the result.
    fn update<F>(&self, change: F) -> Arc<RingSnapshot<P>>
    where
        F: FnOnce(&mut BTreeMap<NodeId, Member>),
    {
        let _writer = self.writer.lock();
        let old = self.snapshot();
        let mut members = old.members_map().clone();
        change(&mut members);
        let next = Arc::new(RingSnapshot::build(
            Arc::clone(&self.partitioner),
            self.vnodes_per_weight,
            old.version() + 1,
            members,
        ));
        *self.current.write() = Arc::clone(&next);
        next
    }

    /// Add `node` with `weight` (≥ 1). Re-adding a known node replaces its
    /// metadata and weight.
    ///
    /// Only keys in the arcs taken over by the new vnodes change owner.
    pub fn add_node(&self, node: Node, weight: u32) -> Result<()> {
        self.check_weight(&node, weight)?;
        let node_id = node.id;
        let next = self.update(|members| {
            members.insert(node.id, Member { node, weight });
        });
        debug!(
            %node_id,
            weight,
            vnodes = next.token_count(),
            version = next.version(),
            "added node to ring"
        );
        Ok(())
    }

    /// Remove a node and all its vnodes. Returns false if it was unknown.
    ///
    /// Only keys previously owned by the removed node change owner.
    pub fn remove_node(&self, node_id: &NodeId) -> bool {
        if self.snapshot().get_node(node_id).is_none() {
            return false;
        }
        let mut removed = false;
        let next = self.update(|members| {
            removed = members.remove(node_id).is_some();
        });
        if removed {
            debug!(%node_id, version = next.version(), "removed node from ring");
        }
        removed
    }

    /// Node owning `key`.
    pub fn lookup(&self, key: &[u8]) -> Result<Node> {
        self.snapshot().lookup(key).cloned()
    }

    /// Up to `replication_factor` distinct owners of `key`, primary first.
    pub fn nodes_for(&self, key: &[u8], replication_factor: usize) -> Result<Vec<Node>> {
        let snapshot = self.snapshot();
        let owners = snapshot.nodes_for(key, replication_factor)?;
        Ok(owners.into_iter().cloned().collect())
    }

    pub fn get_node(&self, id: &NodeId) -> Option<Node> {
        self.snapshot().get_node(id).cloned()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.snapshot().nodes().into_iter().cloned().collect()
    }

    pub fn tokens(&self) -> Vec<(P::TokenType, NodeId)> {
        self.snapshot().tokens()
    }

    pub fn node_count(&self) -> usize {
        self.snapshot().node_count()
    }

    pub fn token_count(&self) -> usize {
        self.snapshot().token_count()
    }

    pub fn ownership(&self) -> BTreeMap<NodeId, f64> {
        self.snapshot().ownership()
    }

    pub fn balance_quality(&self) -> f64 {
        self.snapshot().balance_quality()
    }

    pub fn membership(&self) -> MembershipSnapshot {
        self.snapshot().membership()
    }

    pub fn partitioner_name(&self) -> &'static str {
        self.partitioner.name()
    }

    pub fn vnodes_per_weight(&self) -> u32 {
        self.vnodes_per_weight
    }
}

impl<P: Partitioner> std::fmt::Debug for HashRing<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("snapshot", &self.snapshot())
            .finish()
    }
}

/// Builder for a ring with an initial membership.
///
/// ```rust
/// use corelib::{Node, NodeId, RingBuilder};
///
/// let ring = RingBuilder::new()
///     .with_vnodes(16)
///     .add_node(Node::new(NodeId(1), "a"))
///     .add_node_with_weight(Node::new(NodeId(2), "b"), 2)
///     .build()
///     .unwrap();
/// assert_eq!(ring.token_count(), 48);
/// ```
pub struct RingBuilder<P: Partitioner = Xxh3Partitioner> {
    partitioner: P,
    vnodes_per_weight: u32,
    nodes: Vec<(Node, u32)>,
}

impl RingBuilder<Xxh3Partitioner> {
    pub fn new() -> Self {
        Self {
            partitioner: Xxh3Partitioner::default(),
            vnodes_per_weight: DEFAULT_VNODES_PER_WEIGHT,
            nodes: Vec::new(),
        }
    }
}

impl Default for RingBuilder<Xxh3Partitioner> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Partitioner> RingBuilder<P> {
    /// Swap the partitioner.
    pub fn with_partitioner<Q: Partitioner>(self, partitioner: Q) -> RingBuilder<Q> {
        RingBuilder {
            partitioner,
            vnodes_per_weight: self.vnodes_per_weight,
            nodes: self.nodes,
        }
    }

    /// Vnodes per unit of weight.
    pub fn with_vnodes(mut self, vnodes_per_weight: u32) -> Self {
        self.vnodes_per_weight = vnodes_per_weight;
        self
    }

    /// Add a node of weight 1.
    pub fn add_node(self, node: Node) -> Self {
        self.add_node_with_weight(node, 1)
    }

    pub fn add_node_with_weight(mut self, node: Node, weight: u32) -> Self {
        self.nodes.push((node, weight));
        self
    }

    pub fn build(self) -> Result<HashRing<P>> {
        let ring = HashRing::with_partitioner(self.partitioner, self.vnodes_per_weight);
        for (node, weight) in self.nodes {
            ring.add_node(node, weight)?;
        }
        Ok(ring)
    }
}
