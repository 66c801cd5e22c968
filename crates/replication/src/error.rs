//! Error types for partition synchronization.

use std::time::Duration;

use corelib::node::NodeId;
use delta::DeltaError;
use merkle::{KeyRange, MerkleError};
use sketch::SketchError;
use thiserror::Error;

use crate::partition::{PartitionId, SyncPair};

pub type Result<T> = std::result::Result<T, SyncError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SyncError {
    #[error(transparent)]
    Ring(#[from] corelib::Error),
    #[error(transparent)]
    Sketch(#[from] SketchError),
    #[error(transparent)]
    Merkle(#[from] MerkleError),
    #[error(transparent)]
    Delta(#[from] DeltaError),
    /// A storage or transport collaborator failed.
    #[error("sync transport failure: {0}")]
    Transport(String),
    #[error("collaborator call timed out after {0:?}")]
    Timeout(Duration),
    #[error("range codec: {0}")]
    Codec(String),
    #[error("no replica store registered for node {0}")]
    UnknownStore(NodeId),
    /// The ring no longer makes `source` the primary and `target` an owner.
    #[error("ring ownership changed under {0}")]
    StaleOwnership(SyncPair),
    #[error("checkpoint io: {0}")]
    Io(String),
    /// The retry budget ran out during transfer. The listed ranges are still
    /// divergent; a later sync of the same partition resumes from them.
    #[error(
        "partition {partition}: retries exhausted towards {target}, {} ranges unreconciled",
        .unreconciled.len()
    )]
    RetriesExhausted {
        partition: PartitionId,
        target: NodeId,
        unreconciled: Vec<KeyRange>,
    },
}

impl SyncError {
    /// Transient collaborator failures. Everything else is a programming or
    /// configuration error and is surfaced without retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SyncError::Transport(_) | SyncError::Timeout(_))
    }
}

impl From<bincode::Error> for SyncError {
    fn from(err: bincode::Error) -> Self {
        SyncError::Codec(err.to_string())
    }
}

impl From<std::io::Error> for SyncError {
    fn from(err: std::io::Error) -> Self {
        SyncError::Io(err.to_string())
    }
}
