//! Node abstractions for the consistent hash ring.
//!
//! Nodes represent logical participants in the ring. They are identified by a
//! compact `NodeId` that is cheap to compare and hash.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Compact identifier for a node in the cluster.
///
/// Newtype over `u128` so a UUID fits without loss. Ordering of the numeric
/// value matches lexicographic ordering of the fixed-width hex form, which is
/// what the ring uses to break vnode hash ties.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub u128);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = Error;

    /// Parses 32 hex digits, with or without UUID dashes.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != '-').collect();
        if hex.len() != 32 {
            return Err(Error::InvalidNodeId(s.to_string()));
        }
        u128::from_str_radix(&hex, 16)
            .map(NodeId)
            .map_err(|_| Error::InvalidNodeId(s.to_string()))
    }
}

/// Logical node participating in the ring.
///
/// Keep this struct small and cheap to clone; replica storage handles live
/// in the replication layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Human‑readable name or hostname.
    pub name: String,
}

impl Node {
    /// Construct a new node with basic metadata.
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.id)
    }
}
