//! Core library for the partition sync engine.
//!
//! This crate provides the fundamental abstractions shared by every layer:
//! - Token types and partitioners
//! - Node and virtual node abstractions
//! - The consistent hash ring with copy-on-write snapshots
//! - Key hashers and strong digests
//! - Sync configuration

pub mod config;
pub mod error;
pub mod hash;
pub mod node;
pub mod partitioner;
pub mod ring;
pub mod token;
pub mod vnode;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use hash::{Blake3Hasher, Digest, KeyHasher, StrongHasher, Xxh3Hasher};
pub use node::{Node, NodeId};
pub use partitioner::Partitioner;
pub use ring::{HashRing, MembershipSnapshot, Ring, RingBuilder, RingSnapshot};
pub use token::{RingToken, Token};
pub use vnode::VirtualNode;
