//! Tagged sub-blocks of the chunk command stream.
//!
//! The stream is a sequence of 32-bit words. Packed sub-streams begin with a
//! tag word whose top three bits are `011`; the rest of the command byte
//! describes the element layout and bits 16..24 hold the element count.

/// Command byte prefix of row-register writes that carry LOD anchors.
pub const STROW_MARKER: u32 = 0x3000_0000;

/// A packed sub-stream header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedStream {
    /// Bytes per element.
    pub element_size: usize,
    /// Number of elements.
    pub count: usize,
}

impl PackedStream {
    /// Parse a tag word, or `None` if it does not start a packed sub-stream.
    #[must_use]
    pub fn from_tag(tag: u32) -> Option<Self> {
        if tag >> 29 != 0b011 {
            return None;
        }
        let command = tag >> 24;
        let components = ((command >> 2) & 0x3) as usize + 1;
        let element_bits = match command & 0x3 {
            0 => components * 32,
            1 => components * 16,
            2 => components * 8,
            // 5-bit packing only exists for four components, in 16 bits.
            _ if components == 4 => 16,
            _ => return None,
        };
        let count = match (tag >> 16) & 0xff {
            0 => 256,
            n => n as usize,
        };
        Some(Self {
            element_size: element_bits / 8,
            count,
        })
    }

    /// Payload length, padded to a word boundary.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        (self.element_size * self.count).next_multiple_of(4)
    }

    /// Tag word plus payload.
    #[must_use]
    pub fn block_len(&self) -> usize {
        4 + self.payload_len()
    }

    /// Whether each element is three 16-bit components.
    #[must_use]
    pub fn is_displacement(&self) -> bool {
        self.element_size == 6
    }
}
