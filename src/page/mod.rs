//! Page layer: raw page buffers and the index node layout.
//!
//! Every index page starts with a fixed [`NodeHeader`] followed by two
//! fixed-capacity arrays:
//! - Leaf: `keys[LEAF_MAX]` then `locations[LEAF_MAX]`
//! - Internal: `keys[INTERNAL_MAX]` then `children[INTERNAL_MAX + 1]`
//!
//! All integers are stored big-endian.

mod header;
mod node;

pub use header::NodeHeader;
pub use node::{InternalNode, LeafNode, Node};

use crate::types::PAGE_SIZE;

/// A raw page buffer
#[derive(Clone)]
pub struct PageBuf {
    data: [u8; PAGE_SIZE],
}

impl PageBuf {
    /// Create a new zeroed page buffer
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    /// Create a page buffer from raw bytes, zero-filling anything past `bytes`
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut data = [0u8; PAGE_SIZE];
        let len = bytes.len().min(PAGE_SIZE);
        data[..len].copy_from_slice(&bytes[..len]);
        Self { data }
    }

    /// Get a reference to the raw bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Get a mutable reference to the raw bytes
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Read a big-endian `u32` at `offset`
    pub fn read_u32(&self, offset: usize) -> u32 {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.data[offset..offset + 4]);
        u32::from_be_bytes(raw)
    }

    /// Write a big-endian `u32` at `offset`
    pub fn write_u32(&mut self, offset: usize, value: u32) {
        self.data[offset..offset + 4].copy_from_slice(&value.to_be_bytes());
    }

    /// Read a big-endian `u64` at `offset`
    pub fn read_u64(&self, offset: usize) -> u64 {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&self.data[offset..offset + 8]);
        u64::from_be_bytes(raw)
    }

    /// Write a big-endian `u64` at `offset`
    pub fn write_u64(&mut self, offset: usize, value: u64) {
        self.data[offset..offset + 8].copy_from_slice(&value.to_be_bytes());
    }
}

impl Default for PageBuf {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for PageBuf {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.data
    }
}

impl std::ops::DerefMut for PageBuf {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.data
    }
}

impl AsRef<[u8]> for PageBuf {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_short_bytes_zero_fills() {
        let page = PageBuf::from_bytes(b"abc");
        assert_eq!(&page[..3], b"abc");
        assert!(page[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_integer_helpers_are_big_endian() {
        let mut page = PageBuf::new();
        page.write_u32(8, 0x0102_0304);
        page.write_u64(16, 0x0A0B_0C0D_0E0F_1011);

        assert_eq!(&page[8..12], &[1, 2, 3, 4]);
        assert_eq!(page.read_u32(8), 0x0102_0304);
        assert_eq!(page.read_u64(16), 0x0A0B_0C0D_0E0F_1011);
    }
}
