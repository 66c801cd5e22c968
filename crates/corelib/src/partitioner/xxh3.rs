//! xxh3-128 partitioner implementation.

use crate::hash::{KeyHasher, Xxh3Hasher};
use crate::partitioner::traits::Partitioner;
use crate::token::RingToken;

/// Partitioner hashing keys with xxh3-128. The ring default.
#[derive(Clone, Debug, Default)]
pub struct Xxh3Partitioner {
    hasher: Xxh3Hasher,
}

impl Xxh3Partitioner {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            hasher: Xxh3Hasher::with_seed(seed),
        }
    }
}

impl Partitioner for Xxh3Partitioner {
    type TokenType = RingToken;

    fn partition(&self, key: &[u8]) -> Self::TokenType {
        RingToken(self.hasher.hash128(key))
    }

    fn name(&self) -> &'static str {
        "Xxh3Partitioner"
    }
}
