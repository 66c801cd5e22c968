//! Rolling-checksum delta transfer.
//!
//! The receiver of a divergent range sends a [`Signature`] of what it has;
//! the sender answers with a [`Delta`] that references the receiver's blocks
//! wherever they still match and carries literal bytes elsewhere;
//! [`apply_delta`] rebuilds the sender's content on the receiver.
//!
//! ```rust
//! use delta::{apply_delta, compute_delta, Signature};
//!
//! let base = b"the quick brown fox jumps over the lazy dog".repeat(20);
//! let mut target = base.clone();
//! target.splice(100..100, b"NEW".iter().copied());
//!
//! let signature = Signature::generate(&base, 32).unwrap();
//! let delta = compute_delta(&signature, &target);
//! assert!(delta.literal_bytes() < 100);
//! assert_eq!(apply_delta(&base, &delta).unwrap(), target);
//! ```

pub mod delta;
pub mod error;
pub mod rolling;
pub mod signature;

pub use delta::{
    apply_delta, apply_delta_with, compute_delta, compute_delta_with, Delta, DeltaBlock,
};
pub use error::{DeltaError, Result};
pub use rolling::{weak_checksum, RollingChecksum};
pub use signature::{BlockSignature, Signature};
