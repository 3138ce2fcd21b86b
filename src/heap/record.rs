//! Heap record framing.
//!
//! A record is a 4-byte big-endian length prefix followed by the payload.
//! Deleting a record sets [`TOMBSTONE_FLAG`] on its prefix; the low bits
//! keep the payload length so the page can still be walked record by
//! record. A zero prefix marks the unused tail of a page.

use crate::types::PAGE_SIZE;

/// High bit of the length prefix, set on deleted records
pub const TOMBSTONE_FLAG: u32 = 0x8000_0000;

/// Decoded length prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordPrefix {
    /// No record here; the rest of the page is unused
    End,
    /// A live record with this payload length
    Live(u32),
    /// A tombstoned record that used to hold this many bytes
    Deleted(u32),
}

impl RecordPrefix {
    /// Interpret a raw length prefix read from a page
    pub fn decode(raw: u32) -> Self {
        if raw == 0 {
            Self::End
        } else if raw & TOMBSTONE_FLAG != 0 {
            Self::Deleted(raw & !TOMBSTONE_FLAG)
        } else {
            Self::Live(raw)
        }
    }

    /// Raw prefix value to store in front of the payload
    pub fn encode(self) -> u32 {
        match self {
            Self::End => 0,
            Self::Live(len) => len,
            Self::Deleted(len) => len | TOMBSTONE_FLAG,
        }
    }

    /// Payload length, `0` for `End`
    pub fn payload_len(self) -> usize {
        match self {
            Self::End => 0,
            Self::Live(len) | Self::Deleted(len) => len as usize,
        }
    }
}

/// Whether a length read at `offset` describes a record that fits in its page
pub fn fits_in_page(offset: usize, payload_len: usize) -> bool {
    payload_len >= 1 && payload_len <= PAGE_SIZE && offset + 4 + payload_len <= PAGE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_decoding() {
        assert_eq!(RecordPrefix::decode(0), RecordPrefix::End);
        assert_eq!(RecordPrefix::decode(5), RecordPrefix::Live(5));
        assert_eq!(
            RecordPrefix::decode(5 | TOMBSTONE_FLAG),
            RecordPrefix::Deleted(5)
        );
    }

    #[test]
    fn test_tombstone_never_looks_like_a_valid_length() {
        for len in [1u32, 5, PAGE_SIZE as u32] {
            let raw = RecordPrefix::Deleted(len).encode();
            assert!(raw as usize > PAGE_SIZE);
            assert_eq!(RecordPrefix::decode(raw).payload_len(), len as usize);
        }
    }

    #[test]
    fn test_fits_in_page() {
        assert!(fits_in_page(0, PAGE_SIZE - 4));
        assert!(!fits_in_page(0, PAGE_SIZE - 3));
        assert!(!fits_in_page(100, 0));
        assert!(fits_in_page(PAGE_SIZE - 5, 1));
    }
}
