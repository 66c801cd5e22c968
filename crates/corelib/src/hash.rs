//! Hash functions shared by every layer of the sync engine.
//!
//! Two families are used:
//!
//! - [`KeyHasher`]: fast non-cryptographic 64/128-bit hashes for ring
//!   placement, Bloom filter probes and HyperLogLog registers.
//! - [`StrongHasher`]: collision-resistant 256-bit digests for Merkle nodes
//!   and delta block verification.
//!
//! Both are traits so callers can plug their own hash in; the defaults are
//! xxh3 and BLAKE3.

use std::fmt::{self, Debug};
use std::hash::Hasher as _;

use serde::{Deserialize, Serialize};
use siphasher::sip128::{Hasher128, SipHasher13};
use xxhash_rust::xxh3::{xxh3_128_with_seed, xxh3_64_with_seed};

/// Fast, uniform, stable hash over raw bytes.
pub trait KeyHasher: Send + Sync + Debug + 'static {
    /// Full 128-bit hash.
    fn hash128(&self, data: &[u8]) -> u128;

    /// 64-bit hash; defaults to the low half of [`hash128`](Self::hash128).
    fn hash64(&self, data: &[u8]) -> u64 {
        self.hash128(data) as u64
    }
}

/// xxh3 with a fixed seed. The default key hasher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Xxh3Hasher {
    pub seed: u64,
}

impl Xxh3Hasher {
    pub fn with_seed(seed: u64) -> Self {
        Self { seed }
    }
}

impl KeyHasher for Xxh3Hasher {
    fn hash128(&self, data: &[u8]) -> u128 {
        xxh3_128_with_seed(data, self.seed)
    }

    fn hash64(&self, data: &[u8]) -> u64 {
        xxh3_64_with_seed(data, self.seed)
    }
}

/// SipHash-1-3 with 128-bit output, keyed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SipKeyHasher {
    pub k0: u64,
    pub k1: u64,
}

impl KeyHasher for SipKeyHasher {
    fn hash128(&self, data: &[u8]) -> u128 {
        let mut hasher = SipHasher13::new_with_keys(self.k0, self.k1);
        hasher.write(data);
        hasher.finish128().as_u128()
    }
}

/// A 256-bit content digest.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct Digest(pub [u8; 32]);

impl Digest {
    /// All-zero digest, used as the digest of "nothing".
    pub const ZERO: Digest = Digest([0; 32]);

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0; 32]
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Eight hex chars are enough to tell digests apart in logs.
        write!(f, "Digest(")?;
        for byte in &self.0[..4] {
            write!(f, "{:02x}", byte)?;
        }
        write!(f, "..)")
    }
}

/// Collision-resistant hash producing a [`Digest`].
pub trait StrongHasher: Send + Sync + Debug + 'static {
    /// Digest of the concatenation of `parts`, each prefixed with its length
    /// so that part boundaries cannot be shifted without changing the digest.
    fn digest_parts(&self, parts: &[&[u8]]) -> Digest;

    /// Digest of a single byte string.
    fn digest(&self, data: &[u8]) -> Digest {
        self.digest_parts(&[data])
    }
}

/// BLAKE3. The default strong hasher.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Blake3Hasher;

impl StrongHasher for Blake3Hasher {
    fn digest_parts(&self, parts: &[&[u8]]) -> Digest {
        let mut hasher = blake3::Hasher::new();
        for part in parts {
            hasher.update(&(part.len() as u64).to_le_bytes());
            hasher.update(part);
        }
        Digest(*hasher.finalize().as_bytes())
    }
}
