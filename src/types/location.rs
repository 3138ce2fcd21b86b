//! Heap record locations.

use std::fmt;

use crate::types::PageId;

/// Position of a record in the heap file: `(page, byte offset within page)`.
///
/// The index stores it as one opaque `u64`: page number in the high 32 bits,
/// offset in the low 32 bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Location {
    pub page_id: PageId,
    pub offset: u32,
}

impl Location {
    pub const fn new(page_id: PageId, offset: u32) -> Self {
        Self { page_id, offset }
    }

    /// Pack into the value stored by the index
    pub const fn to_u64(self) -> u64 {
        ((self.page_id.value() as u64) << 32) | self.offset as u64
    }

    /// Unpack a value previously produced by [`Location::to_u64`]
    pub const fn from_u64(raw: u64) -> Self {
        Self {
            page_id: PageId::new((raw >> 32) as u32),
            offset: (raw & 0xFFFF_FFFF) as u32,
        }
    }
}

impl From<Location> for u64 {
    fn from(loc: Location) -> Self {
        loc.to_u64()
    }
}

impl From<u64> for Location {
    fn from(raw: u64) -> Self {
        Self::from_u64(raw)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.page_id, self.offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_packing() {
        let loc = Location::new(PageId::new(3), 120);
        assert_eq!(loc.to_u64(), (3u64 << 32) | 120);
        assert_eq!(Location::from_u64(loc.to_u64()), loc);
    }

    #[test]
    fn test_location_uses_full_width() {
        let loc = Location::new(PageId::new(u32::MAX - 1), u32::MAX);
        let raw: u64 = loc.into();
        assert_eq!(Location::from(raw), loc);
    }
}
