//! Merkle trees for anti-entropy.
//!
//! Each replica keeps a [`MerkleTree`] over its partition. Trees built with
//! the same [`TreeShape`] partition the key space identically, so comparing
//! two of them with [`diff`] points straight at the [`KeyRange`]s whose
//! content differs.

pub mod diff;
pub mod error;
pub mod proof;
pub mod range;
pub mod shape;
pub mod tree;

pub use diff::{diff, par_diff, TreeDiff};
pub use error::{MerkleError, Result};
pub use proof::{MerkleProof, ProofLevel};
pub use range::{key_position, KeyRange, KEY_SPACE_END};
pub use shape::TreeShape;
pub use tree::{MerkleNode, MerkleTree, NodeKind};
