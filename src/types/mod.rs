//! Common types used throughout the storage engine.

mod location;
mod page_id;

pub use location::Location;
pub use page_id::PageId;

use serde::{Deserialize, Serialize};

/// Page size in bytes (4KB)
pub const PAGE_SIZE: usize = 4096;

/// Default number of page slots held by a page manager
pub const DEFAULT_CACHE_PAGES: usize = 100;

/// Size of the common node header at the start of every index page
pub const NODE_HEADER_SIZE: usize = 12;

/// Cell slots laid out in a leaf page
pub const LEAF_MAX: usize = 31;

/// Separator key slots laid out in an internal page (children: one more)
pub const INTERNAL_MAX: usize = 30;

/// Lower bound for configured node limits, so a split always leaves both halves non-empty
pub const MIN_KEYS: usize = 2;

/// Size of the length prefix in front of every heap record
pub const RECORD_PREFIX_SIZE: usize = 4;

/// Largest payload a single heap page can hold
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE - RECORD_PREFIX_SIZE;

/// BTree configuration for customizable node limits
///
/// The on-disk layout always reserves [`LEAF_MAX`] and [`INTERNAL_MAX`]
/// slots; these limits only decide when a node is considered full.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BTreeConfig {
    /// Maximum cells per leaf node
    pub max_leaf_cells: usize,
    /// Maximum separator keys per internal node
    pub max_internal_keys: usize,
}

impl Default for BTreeConfig {
    fn default() -> Self {
        Self {
            max_leaf_cells: LEAF_MAX,
            max_internal_keys: INTERNAL_MAX,
        }
    }
}

impl BTreeConfig {
    /// Create a new config, clamping both limits into what a page can hold
    pub fn new(max_leaf_cells: usize, max_internal_keys: usize) -> Self {
        Self {
            max_leaf_cells: max_leaf_cells.clamp(MIN_KEYS, LEAF_MAX),
            max_internal_keys: max_internal_keys.clamp(MIN_KEYS, INTERNAL_MAX),
        }
    }

    /// This config with both limits clamped, for values built without [`BTreeConfig::new`]
    pub fn clamped(&self) -> Self {
        Self::new(self.max_leaf_cells, self.max_internal_keys)
    }
}

/// Node type tag stored in the first byte of an index page
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageType {
    /// Internal node (separator keys + child pointers)
    Internal = 0x02,
    /// Leaf node (keys + locations)
    Leaf = 0x0D,
}

impl PageType {
    /// Check if this is a leaf page type
    pub fn is_leaf(self) -> bool {
        matches!(self, Self::Leaf)
    }

    /// Convert from byte value
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0x02 => Some(Self::Internal),
            0x0D => Some(Self::Leaf),
            _ => None,
        }
    }
}
