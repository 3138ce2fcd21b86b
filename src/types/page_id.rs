//! Page identifier type.

use std::fmt;

/// Number of a page within one backing file.
///
/// Page numbers are 0-indexed and every page, including page 0, holds data:
/// there is no reserved header page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PageId(pub u32);

impl PageId {
    /// "No page", used for the parent reference of a root node
    pub const INVALID: PageId = PageId(u32::MAX);

    /// Create a new page ID
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the raw page ID value
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Check if this refers to a page
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }

    /// Byte offset of this page in its file
    pub const fn file_offset(self, page_size: usize) -> u64 {
        self.0 as u64 * page_size as u64
    }

    /// Position of this page in a cache indexed by page number
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "INVALID")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

impl From<u32> for PageId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl From<PageId> for u32 {
    fn from(id: PageId) -> Self {
        id.0
    }
}
