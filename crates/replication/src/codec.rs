//! Canonical byte encoding of range content.
//!
//! Delta transfer works on byte strings, so both sides serialize the range
//! with the same encoding before signatures are computed. Entries are in
//! key order, so equal content always encodes to equal bytes.

use crate::error::Result;
use crate::store::RangeContent;

pub fn encode_range(content: &RangeContent) -> Result<Vec<u8>> {
    Ok(bincode::serialize(content)?)
}

pub fn decode_range(bytes: &[u8]) -> Result<RangeContent> {
    Ok(bincode::deserialize(bytes)?)
}
