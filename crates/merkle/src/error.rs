//! Error types for Merkle tree construction and comparison.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MerkleError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MerkleError {
    /// The two trees partition the key space differently, so their digests
    /// cannot be compared node by node.
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),
    #[error("invalid tree shape: {0}")]
    InvalidShape(String),
    #[error("a parallel diff worker panicked")]
    WorkerPanicked,
}
