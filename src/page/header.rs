//! Node header structure.
//!
//! The node header occupies the first bytes of each index page and is
//! shared by leaf and internal nodes.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::{PageId, PageType, NODE_HEADER_SIZE};

/// Node header structure
///
/// Layout (12 bytes):
/// ```text
/// Offset  Size  Description
/// 0       1     Node type tag
/// 1       1     Root flag (1 if this node is the root)
/// 2       2     Reserved
/// 4       4     Parent page number (INVALID for the root)
/// 8       4     Cell count (leaf) or key count (internal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeHeader {
    /// Type of this node
    pub page_type: PageType,
    /// Whether this node is the root of its tree
    pub is_root: bool,
    /// Page holding the parent node
    pub parent: PageId,
    /// Number of cells (leaf) or separator keys (internal)
    pub count: u32,
}

impl NodeHeader {
    /// Create an empty header of the given type
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            is_root: false,
            parent: PageId::INVALID,
            count: 0,
        }
    }

    /// Read a node header from a page
    pub fn read(page: &PageBuf) -> Result<Self> {
        let page_type = PageType::from_byte(page[0]).ok_or_else(|| {
            StorageError::invalid_page(format!("unknown node type tag {:#04x}", page[0]))
        })?;

        Ok(Self {
            page_type,
            is_root: page[1] != 0,
            parent: PageId::new(page.read_u32(4)),
            count: page.read_u32(8),
        })
    }

    /// Write this header to a page
    pub fn write(&self, page: &mut PageBuf) {
        page[0] = self.page_type as u8;
        page[1] = u8::from(self.is_root);
        page[2..4].fill(0);
        page.write_u32(4, self.parent.value());
        page.write_u32(8, self.count);
    }

    /// Offset of the key array that follows the header
    pub const fn keys_offset() -> usize {
        NODE_HEADER_SIZE
    }
}
