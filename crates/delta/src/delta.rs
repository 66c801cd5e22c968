//! Delta computation and replay.
//!
//! The sender slides a window of `block_size` bytes over its content. At
//! each offset the weak checksum is looked up in the receiver's signature;
//! a hit is confirmed with the strong hash before a reference is emitted and
//! the window jumps past the block. On a miss one byte becomes literal and
//! the window rolls forward by one. Matches are found at any offset, so
//! insertions and deletions only cost the bytes around the edit.

use std::collections::HashMap;

use bytes::Bytes;
use corelib::hash::{Blake3Hasher, Digest, StrongHasher};
use serde::{Deserialize, Serialize};

use crate::error::{DeltaError, Result};
use crate::rolling::{weak_checksum, RollingChecksum};
use crate::signature::{BlockSignature, Signature};

/// One instruction for rebuilding the target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeltaBlock {
    /// Bytes the receiver does not have.
    Literal(Bytes),
    /// `len` bytes of the receiver's base starting at `offset`.
    Copy { offset: u64, len: u64 },
}

/// Ordered instructions whose replay reproduces the target byte for byte.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delta {
    pub blocks: Vec<DeltaBlock>,
    pub target_len: u64,
    pub target_digest: Digest,
}

impl Delta {
    pub fn literal_bytes(&self) -> u64 {
        self.blocks
            .iter()
            .map(|block| match block {
                DeltaBlock::Literal(bytes) => bytes.len() as u64,
                DeltaBlock::Copy { .. } => 0,
            })
            .sum()
    }

    pub fn copied_bytes(&self) -> u64 {
        self.target_len.saturating_sub(self.literal_bytes())
    }

    /// The target is already identical to the base.
    pub fn is_identity(&self, base_len: u64) -> bool {
        match self.blocks.as_slice() {
            [] => base_len == 0,
            [DeltaBlock::Copy { offset: 0, len }] => *len == base_len,
            _ => false,
        }
    }
}

/// Accumulates output, merging adjacent copies and consecutive literals.
#[derive(Default)]
struct DeltaWriter {
    blocks: Vec<DeltaBlock>,
    literal: Vec<u8>,
}

impl DeltaWriter {
    fn literal(&mut self, bytes: &[u8]) {
        self.literal.extend_from_slice(bytes);
    }

    fn flush_literal(&mut self) {
        if !self.literal.is_empty() {
            let bytes = Bytes::from(std::mem::take(&mut self.literal));
            self.blocks.push(DeltaBlock::Literal(bytes));
        }
    }

    fn copy(&mut self, offset: u64, len: u64) {
        self.flush_literal();
        if let Some(DeltaBlock::Copy {
            offset: last_offset,
            len: last_len,
        }) = self.blocks.last_mut()
        {
            if *last_offset + *last_len == offset {
                *last_len += len;
                return;
            }
        }
        self.blocks.push(DeltaBlock::Copy { offset, len });
    }

    fn finish(mut self) -> Vec<DeltaBlock> {
        self.flush_literal();
        self.blocks
    }
}

/// Delta turning the signed base into `target`, BLAKE3 strong hash.
pub fn compute_delta(signature: &Signature, target: &[u8]) -> Delta {
    compute_delta_with(&Blake3Hasher, signature, target)
}

pub fn compute_delta_with<H: StrongHasher>(
    hasher: &H,
    signature: &Signature,
    target: &[u8],
) -> Delta {
    let block_size = signature.block_size;
    let mut table: HashMap<u32, Vec<&BlockSignature>> = HashMap::new();
    for block in &signature.blocks {
        if block.len as usize == block_size {
            table.entry(block.weak).or_default().push(block);
        }
    }

    let mut out = DeltaWriter::default();
    let mut pos = 0usize;

    if !table.is_empty() && block_size > 0 && target.len() >= block_size {
        let mut rolling = RollingChecksum::new(&target[..block_size]);
        loop {
            let window = &target[pos..pos + block_size];
            let matched = table.get(&rolling.value()).and_then(|candidates| {
                let strong = hasher.digest(window);
                candidates.iter().find(|block| block.strong == strong).copied()
            });

            if let Some(block) = matched {
                out.copy(block.offset, block.len as u64);
                pos += block_size;
                if pos + block_size > target.len() {
                    break;
                }
                rolling = RollingChecksum::new(&target[pos..pos + block_size]);
                continue;
            }

            out.literal(&target[pos..pos + 1]);
            if pos + block_size >= target.len() {
                pos += 1;
                break;
            }
            rolling.roll(target[pos], target[pos + block_size]);
            pos += 1;
        }
    }

    // Fewer than block_size bytes left; the base's short tail block can
    // still match the very end of the target.
    let rest = &target[pos..];
    match signature.tail() {
        Some(tail) if rest.len() >= tail.len as usize && tail.len > 0 => {
            let split = rest.len() - tail.len as usize;
            let suffix = &rest[split..];
            if weak_checksum(suffix) == tail.weak && hasher.digest(suffix) == tail.strong {
                out.literal(&rest[..split]);
                out.copy(tail.offset, tail.len as u64);
            } else {
                out.literal(rest);
            }
        }
        _ => out.literal(rest),
    }

    Delta {
        blocks: out.finish(),
        target_len: target.len() as u64,
        target_digest: hasher.digest(target),
    }
}

/// Replay `delta` over `base`, BLAKE3 strong hash.
pub fn apply_delta(base: &[u8], delta: &Delta) -> Result<Vec<u8>> {
    apply_delta_with(&Blake3Hasher, base, delta)
}

/// Concatenate literals and referenced base ranges in order.
///
/// Fails with [`DeltaError::CorruptDelta`] on an out-of-bounds reference and
/// verifies length and digest of the result.
pub fn apply_delta_with<H: StrongHasher>(
    hasher: &H,
    base: &[u8],
    delta: &Delta,
) -> Result<Vec<u8>> {
    // `target_len` comes off the wire; never reserve more than one pass over
    // the base plus the literals could produce.
    let bound = (base.len() as u64).saturating_add(delta.literal_bytes());
    let mut out = Vec::with_capacity(delta.target_len.min(bound) as usize);
    for block in &delta.blocks {
        match block {
            DeltaBlock::Literal(bytes) => out.extend_from_slice(bytes),
            DeltaBlock::Copy { offset, len } => {
                let corrupt = DeltaError::CorruptDelta {
                    offset: *offset,
                    len: *len,
                    base_len: base.len() as u64,
                };
                let end = offset.checked_add(*len).ok_or(corrupt.clone())?;
                if end > base.len() as u64 {
                    return Err(corrupt);
                }
                out.extend_from_slice(&base[*offset as usize..end as usize]);
            }
        }
        if out.len() as u64 > delta.target_len {
            return Err(DeltaError::LengthMismatch {
                expected: delta.target_len,
                actual: out.len() as u64,
            });
        }
    }

    if out.len() as u64 != delta.target_len {
        return Err(DeltaError::LengthMismatch {
            expected: delta.target_len,
            actual: out.len() as u64,
        });
    }
    if hasher.digest(&out) != delta.target_digest {
        return Err(DeltaError::ChecksumMismatch);
    }
    Ok(out)
}
