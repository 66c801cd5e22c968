//! The partitioner abstraction.

use crate::token::Token;

/// Maps keys (and vnode labels) to ring tokens.
///
/// Implementations hold no mutable state and are shared freely between
/// threads.
pub trait Partitioner: Send + Sync + 'static {
    type TokenType: Token;

    /// Must be stable: the same key always lands on the same token, on every
    /// node and across restarts.
    fn partition(&self, key: &[u8]) -> Self::TokenType;

    /// Stored in membership snapshots so a ring is only ever restored with
    /// the partitioner that built it.
    fn name(&self) -> &'static str;
}
