//! SipHash-1-3 partitioner implementation.

use crate::hash::{KeyHasher, SipKeyHasher};
use crate::partitioner::traits::Partitioner;
use crate::token::RingToken;

/// Keyed SipHash partitioner.
///
/// Slower than xxh3 but resistant to adversarial key choice when the keys are
/// kept secret.
#[derive(Clone, Debug, Default)]
pub struct SipPartitioner {
    hasher: SipKeyHasher,
}

impl SipPartitioner {
    pub fn with_keys(k0: u64, k1: u64) -> Self {
        Self {
            hasher: SipKeyHasher { k0, k1 },
        }
    }
}

impl Partitioner for SipPartitioner {
    type TokenType = RingToken;

    fn partition(&self, key: &[u8]) -> Self::TokenType {
        RingToken(self.hasher.hash128(key))
    }

    fn name(&self) -> &'static str {
        "SipPartitioner"
    }
}
