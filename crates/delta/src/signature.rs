//! Block signatures of the receiver's base content.
//!
//! The receiver cuts its base into fixed-size blocks and sends only a weak
//! and a strong checksum per block. The last block may be shorter.

use corelib::hash::{Blake3Hasher, Digest, StrongHasher};
use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, Result};
use crate::rolling::weak_checksum;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSignature {
    pub index: u32,
    pub offset: u64,
    pub len: u32,
    pub weak: u32,
    pub strong: Digest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub block_size: usize,
    pub base_len: u64,
    pub blocks: Vec<BlockSignature>,
}

impl Signature {
    /// Signature of `base` with the BLAKE3 strong hash.
    pub fn generate(base: &[u8], block_size: usize) -> Result<Self> {
        Self::generate_with_hasher(&Blake3Hasher, base, block_size)
    }

    pub fn generate_with_hasher<H: StrongHasher>(
        hasher: &H,
        base: &[u8],
        block_size: usize,
    ) -> Result<Self> {
        if block_size == 0 {
            return Err(DeltaError::InvalidBlockSize);
        }
        let blocks = base
            .chunks(block_size)
            .enumerate()
            .map(|(index, block)| BlockSignature {
                index: index as u32,
                offset: (index * block_size) as u64,
                len: block.len() as u32,
                weak: weak_checksum(block),
                strong: hasher.digest(block),
            })
            .collect();
        Ok(Self {
            block_size,
            base_len: base.len() as u64,
            blocks,
        })
    }

    /// Trailing block shorter than `block_size`, if any.
    pub fn tail(&self) -> Option<&BlockSignature> {
        self.blocks
            .last()
            .filter(|block| (block.len as usize) < self.block_size)
    }
}
