//! Error types for delta computation and replay.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DeltaError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeltaError {
    #[error("block size must be at least 1")]
    InvalidBlockSize,
    /// A reference points outside the base content.
    #[error("corrupt delta: reference [{offset}, +{len}) outside base of {base_len} bytes")]
    CorruptDelta { offset: u64, len: u64, base_len: u64 },
    #[error("reconstructed {actual} bytes, delta promised {expected}")]
    LengthMismatch { expected: u64, actual: u64 },
    /// Replay produced bytes that do not hash to the sender's digest, e.g.
    /// the delta was computed against a different base.
    #[error("reconstructed content does not match the target digest")]
    ChecksumMismatch,
}
