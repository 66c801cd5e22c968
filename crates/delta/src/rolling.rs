//! Weak rolling checksum.
//!
//! The rsync checksum: `a` is the byte sum and `b` the position-weighted
//! byte sum of the window, both mod 2^16. Sliding the window by one byte
//! updates both in O(1), which is what makes probing every offset cheap.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingChecksum {
    a: u32,
    b: u32,
    len: u32,
}

impl RollingChecksum {
    pub fn new(window: &[u8]) -> Self {
        let len = window.len() as u32;
        let mut a = 0u32;
        let mut b = 0u32;
        for (i, &byte) in window.iter().enumerate() {
            a = a.wrapping_add(byte as u32);
            b = b.wrapping_add((len - i as u32).wrapping_mul(byte as u32));
        }
        Self { a, b, len }
    }

    /// Slide one byte: drop `outgoing` from the front, append `incoming`.
    #[inline]
    pub fn roll(&mut self, outgoing: u8, incoming: u8) {
        self.a = self
            .a
            .wrapping_sub(outgoing as u32)
            .wrapping_add(incoming as u32);
        self.b = self
            .b
            .wrapping_sub(self.len.wrapping_mul(outgoing as u32))
            .wrapping_add(self.a);
    }

    #[inline]
    pub fn value(&self) -> u32 {
        (self.a & 0xffff) | ((self.b & 0xffff) << 16)
    }
}

/// Checksum of a whole block.
pub fn weak_checksum(block: &[u8]) -> u32 {
    RollingChecksum::new(block).value()
}
