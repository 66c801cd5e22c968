//! Anti-entropy synchronization of replicated partitions.
//!
//! The [`SyncCoordinator`] finds the owners of a partition on the hash ring,
//! uses HyperLogLog and Bloom filter sketches to skip replicas that already
//! agree, localizes divergence with Merkle trees and ships only the changed
//! bytes of each divergent range as a rolling-checksum delta.
//!
//! Storage is abstracted behind [`ReplicaStore`]; [`MemoryStore`] is the
//! in-memory reference implementation.

pub mod checkpoint;
pub mod codec;
pub mod coordinator;
pub mod error;
pub mod partition;
pub mod session;
pub mod store;
pub mod strategy;

pub use checkpoint::{Checkpoint, SyncPoint};
pub use coordinator::SyncCoordinator;
pub use error::{Result, SyncError};
pub use partition::{PartitionId, SyncPair};
pub use session::{PartitionReport, SessionStats, SyncSession, SyncState};
pub use store::{content_digest, MemoryStore, RangeContent, ReplicaDigest, ReplicaStore};
pub use strategy::{ReplicationStrategy, SimpleStrategy};
