//! Error types for the core library.

use thiserror::Error;

/// Result type alias for the core library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the core library.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// The ring holds no nodes, so no key can be placed.
    #[error("no available node: the ring is empty")]
    NoAvailableNode,
    /// Invalid node configuration
    #[error("invalid node: {0}")]
    InvalidNode(String),
    /// Configuration value out of range
    #[error("invalid config: {0}")]
    InvalidConfig(String),
    /// Malformed node identifier
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),
}
