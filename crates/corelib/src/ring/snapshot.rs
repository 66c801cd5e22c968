//! Immutable ring state.
//!
//! A [`RingSnapshot`] is never mutated after construction. Membership changes
//! build a fresh snapshot and swap it in, so a reader holding an
//! `Arc<RingSnapshot>` always sees one consistent ring.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::{Node, NodeId};
use crate::partitioner::Partitioner;
use crate::token::Token;
use crate::vnode::VirtualNode;

/// A physical node together with its placement weight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub node: Node,
    /// Relative capacity; the node gets `weight × vnodes_per_weight` vnodes.
    pub weight: u32,
}

/// Serializable ring membership, used for checkpoints.
///
/// Vnode positions are not stored; they are a pure function of membership
/// and the partitioner, and are recomputed on restore.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub partitioner: String,
    pub vnodes_per_weight: u32,
    pub version: u64,
    pub members: Vec<Member>,
}

/// One consistent view of the ring.
pub struct RingSnapshot<P: Partitioner> {
    partitioner: Arc<P>,
    vnodes_per_weight: u32,
    version: u64,
    members: BTreeMap<NodeId, Member>,
    /// Sorted by token; tokens are unique.
    vnodes: Vec<VirtualNode<P::TokenType>>,
}

impl<P: Partitioner> RingSnapshot<P> {
    /// Build the sorted vnode index for `members`.
    pub(crate) fn build(
        partitioner: Arc<P>,
        vnodes_per_weight: u32,
        version: u64,
        members: BTreeMap<NodeId, Member>,
    ) -> Self {
        let total: usize = members
            .values()
            .map(|m| (m.weight * vnodes_per_weight) as usize)
            .sum();
        let mut vnodes = Vec::with_capacity(total);
        for (id, member) in &members {
            for i in 0..member.weight * vnodes_per_weight {
                vnodes.push(VirtualNode::from_index(partitioner.as_ref(), *id, i));
            }
        }
        // (token, node_id) order; dedup keeps the first entry of each token,
        // i.e. the lowest node id wins a collision.
        vnodes.sort_unstable();
        vnodes.dedup_by(|later, earlier| later.token == earlier.token);

        Self {
            partitioner,
            vnodes_per_weight,
            version,
            members,
            vnodes,
        }
    }

    pub(crate) fn members_map(&self) -> &BTreeMap<NodeId, Member> {
        &self.members
    }

    /// Index of the first vnode at or after `token`, wrapping to 0.
    fn successor(&self, token: P::TokenType) -> Result<usize> {
        if self.vnodes.is_empty() {
            return Err(Error::NoAvailableNode);
        }
        let idx = self.vnodes.partition_point(|v| v.token < token);
        Ok(if idx == self.vnodes.len() { 0 } else { idx })
    }

    fn member(&self, id: &NodeId) -> Result<&Node> {
        self.members
            .get(id)
            .map(|m| &m.node)
            .ok_or(Error::NoAvailableNode)
    }

    /// Node owning `key`: the first vnode clockwise from the key's token.
    ///
    /// O(log V) over the vnode count.
    pub fn lookup(&self, key: &[u8]) -> Result<&Node> {
        let idx = self.successor(self.partitioner.partition(key))?;
        self.member(&self.vnodes[idx].node_id)
    }

    /// Up to `replication_factor` distinct nodes for `key`, primary first.
    ///
    /// Walks clockwise from the key's token skipping vnodes of nodes already
    /// collected. Returns every node when fewer than `replication_factor`
    /// nodes exist.
    pub fn nodes_for(&self, key: &[u8], replication_factor: usize) -> Result<Vec<&Node>> {
        let start = self.successor(self.partitioner.partition(key))?;
        let wanted = replication_factor.min(self.members.len());
        let mut owners: Vec<&Node> = Vec::with_capacity(wanted);

        for offset in 0..self.vnodes.len() {
            if owners.len() == wanted {
                break;
            }
            let vnode = &self.vnodes[(start + offset) % self.vnodes.len()];
            if owners.iter().any(|n| n.id == vnode.node_id) {
                continue;
            }
            owners.push(self.member(&vnode.node_id)?);
        }

        Ok(owners)
    }

    /// Fraction of the ring (and so of uniformly hashed keys) each node owns.
    pub fn ownership(&self) -> BTreeMap<NodeId, f64> {
        let mut shares: BTreeMap<NodeId, f64> =
            self.members.keys().map(|id| (*id, 0.0)).collect();
        if self.vnodes.len() == 1 {
            shares.insert(self.vnodes[0].node_id, 1.0);
            return shares;
        }
        for (i, vnode) in self.vnodes.iter().enumerate() {
            let prev = if i == 0 {
                &self.vnodes[self.vnodes.len() - 1]
            } else {
                &self.vnodes[i - 1]
            };
            *shares.entry(vnode.node_id).or_insert(0.0) += prev.distance_to(vnode).ring_fraction();
        }
        shares
    }

    /// Standard deviation of each node's ownership relative to its
    /// weight-proportional fair share. `0.0` is a perfectly balanced ring.
    pub fn balance_quality(&self) -> f64 {
        let total_weight: u64 = self.members.values().map(|m| m.weight as u64).sum();
        if total_weight == 0 {
            return 0.0;
        }
        let ownership = self.ownership();
        let ratios: Vec<f64> = self
            .members
            .iter()
            .map(|(id, m)| {
                let fair = m.weight as f64 / total_weight as f64;
                ownership.get(id).copied().unwrap_or(0.0) / fair
            })
            .collect();
        let mean = ratios.iter().sum::<f64>() / ratios.len() as f64;
        let variance = ratios.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / ratios.len() as f64;
        variance.sqrt()
    }

    pub fn get_node(&self, id: &NodeId) -> Option<&Node> {
        self.members.get(id).map(|m| &m.node)
    }

    pub fn weight_of(&self, id: &NodeId) -> Option<u32> {
        self.members.get(id).map(|m| m.weight)
    }

    pub fn nodes(&self) -> Vec<&Node> {
        self.members.values().map(|m| &m.node).collect()
    }

    /// All `(token, owner)` pairs in ring order.
    pub fn tokens(&self) -> Vec<(P::TokenType, NodeId)> {
        self.vnodes.iter().map(|v| (v.token, v.node_id)).collect()
    }

    pub fn node_count(&self) -> usize {
        self.members.len()
    }

    pub fn token_count(&self) -> usize {
        self.vnodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vnodes.is_empty()
    }

    /// Incremented on every membership change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn vnodes_per_weight(&self) -> u32 {
        self.vnodes_per_weight
    }

    pub fn partitioner(&self) -> &Arc<P> {
        &self.partitioner
    }

    pub fn membership(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            partitioner: self.partitioner.name().to_string(),
            vnodes_per_weight: self.vnodes_per_weight,
            version: self.version,
            members: self.members.values().cloned().collect(),
        }
    }
}

impl<P: Partitioner> fmt::Debug for RingSnapshot<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingSnapshot")
            .field("partitioner", &self.partitioner.name())
            .field("version", &self.version)
            .field("nodes", &self.members.len())
            .field("vnodes", &self.vnodes.len())
            .finish()
    }
}
