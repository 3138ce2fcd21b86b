//! Leaf and internal node encoding.
//!
//! Nodes are decoded from their page into owned vectors, edited, and encoded
//! back. Arrays are fixed-capacity on disk; slots past the live count are
//! zeroed on every write so a node's bytes depend only on its contents.

use crate::error::{Result, StorageError};
use crate::page::{NodeHeader, PageBuf};
use crate::types::{PageId, PageType, INTERNAL_MAX, LEAF_MAX};

const KEYS_OFFSET: usize = NodeHeader::keys_offset();
const LEAF_LOCATIONS_OFFSET: usize = KEYS_OFFSET + LEAF_MAX * 4;
const INTERNAL_CHILDREN_OFFSET: usize = KEYS_OFFSET + INTERNAL_MAX * 4;

/// Leaf node: sorted `(key, location)` cells
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeafNode {
    pub is_root: bool,
    pub parent: PageId,
    pub keys: Vec<u32>,
    pub locations: Vec<u64>,
}

impl LeafNode {
    /// Create an empty, parentless leaf
    pub fn new() -> Self {
        Self {
            is_root: false,
            parent: PageId::INVALID,
            keys: Vec::new(),
            locations: Vec::new(),
        }
    }

    /// Decode a leaf from a page
    pub fn read(page: &PageBuf) -> Result<Self> {
        let header = NodeHeader::read(page)?;
        if header.page_type != PageType::Leaf {
            return Err(StorageError::invalid_page("expected a leaf node"));
        }
        Self::from_header(page, header)
    }

    fn from_header(page: &PageBuf, header: NodeHeader) -> Result<Self> {
        let count = header.count as usize;
        if count > LEAF_MAX {
            return Err(StorageError::invalid_page(format!(
                "leaf cell count {} exceeds {}",
                count, LEAF_MAX
            )));
        }

        let keys = (0..count)
            .map(|i| page.read_u32(KEYS_OFFSET + i * 4))
            .collect();
        let locations = (0..count)
            .map(|i| page.read_u64(LEAF_LOCATIONS_OFFSET + i * 8))
            .collect();

        Ok(Self {
            is_root: header.is_root,
            parent: header.parent,
            keys,
            locations,
        })
    }

    /// Encode this leaf into a page
    pub fn write(&self, page: &mut PageBuf) {
        debug_assert!(self.keys.len() <= LEAF_MAX);
        debug_assert_eq!(self.keys.len(), self.locations.len());

        let header = NodeHeader {
            page_type: PageType::Leaf,
            is_root: self.is_root,
            parent: self.parent,
            count: self.keys.len() as u32,
        };
        header.write(page);

        page[KEYS_OFFSET..LEAF_LOCATIONS_OFFSET + LEAF_MAX * 8].fill(0);
        for (i, &key) in self.keys.iter().enumerate() {
            page.write_u32(KEYS_OFFSET + i * 4, key);
        }
        for (i, &location) in self.locations.iter().enumerate() {
            page.write_u64(LEAF_LOCATIONS_OFFSET + i * 8, location);
        }
    }

    /// Number of cells
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the leaf holds no cells
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Binary search for `key`: `Ok(index)` if present, `Err(insertion point)` otherwise
    pub fn search(&self, key: u32) -> std::result::Result<usize, usize> {
        self.keys.binary_search(&key)
    }

    /// Insert a cell at `index`, shifting higher cells right
    pub fn insert(&mut self, index: usize, key: u32, location: u64) {
        self.keys.insert(index, key);
        self.locations.insert(index, location);
    }

    /// Remove the cell at `index`, shifting higher cells left
    pub fn remove(&mut self, index: usize) -> (u32, u64) {
        (self.keys.remove(index), self.locations.remove(index))
    }

    /// Move cells `at..` into a new right sibling sharing this leaf's parent
    pub fn split_off(&mut self, at: usize) -> LeafNode {
        LeafNode {
            is_root: false,
            parent: self.parent,
            keys: self.keys.split_off(at),
            locations: self.locations.split_off(at),
        }
    }
}

impl Default for LeafNode {
    fn default() -> Self {
        Self::new()
    }
}

/// Internal node: `n` separator keys routing into `n + 1` children
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InternalNode {
    pub is_root: bool,
    pub parent: PageId,
    pub keys: Vec<u32>,
    pub children: Vec<PageId>,
}

impl InternalNode {
    /// Create a root with a single separator between two children
    pub fn new_root(left: PageId, separator: u32, right: PageId) -> Self {
        Self {
            is_root: true,
            parent: PageId::INVALID,
            keys: vec![separator],
            children: vec![left, right],
        }
    }

    /// Decode an internal node from a page
    pub fn read(page: &PageBuf) -> Result<Self> {
        let header = NodeHeader::read(page)?;
        if header.page_type != PageType::Internal {
            return Err(StorageError::invalid_page("expected an internal node"));
        }
        Self::from_header(page, header)
    }

    fn from_header(page: &PageBuf, header: NodeHeader) -> Result<Self> {
        let count = header.count as usize;
        if count == 0 || count > INTERNAL_MAX {
            return Err(StorageError::invalid_page(format!(
                "internal key count {} outside 1..={}",
                count, INTERNAL_MAX
            )));
        }

        let keys = (0..count)
            .map(|i| page.read_u32(KEYS_OFFSET + i * 4))
            .collect();
        let children = (0..=count)
            .map(|i| PageId::new(page.read_u32(INTERNAL_CHILDREN_OFFSET + i * 4)))
            .collect();

        Ok(Self {
            is_root: header.is_root,
            parent: header.parent,
            keys,
            children,
        })
    }

    /// Encode this node into a page
    pub fn write(&self, page: &mut PageBuf) {
        debug_assert!(self.keys.len() <= INTERNAL_MAX);
        debug_assert_eq!(self.keys.len() + 1, self.children.len());

        let header = NodeHeader {
            page_type: PageType::Internal,
            is_root: self.is_root,
            parent: self.parent,
            count: self.keys.len() as u32,
        };
        header.write(page);

        page[KEYS_OFFSET..INTERNAL_CHILDREN_OFFSET + (INTERNAL_MAX + 1) * 4].fill(0);
        for (i, &key) in self.keys.iter().enumerate() {
            page.write_u32(KEYS_OFFSET + i * 4, key);
        }
        for (i, child) in self.children.iter().enumerate() {
            page.write_u32(INTERNAL_CHILDREN_OFFSET + i * 4, child.value());
        }
    }

    /// Index of the child whose subtree may hold `key`.
    ///
    /// This is the number of separators `<= key`, so a key equal to a
    /// separator routes to the right of it.
    pub fn child_index(&self, key: u32) -> usize {
        self.keys.partition_point(|&sep| sep <= key)
    }

    /// Child page that may hold `key`
    pub fn child_for(&self, key: u32) -> PageId {
        self.children[self.child_index(key)]
    }

    /// Slot of `child` among this node's children
    pub fn position_of(&self, child: PageId) -> Option<usize> {
        self.children.iter().position(|&c| c == child)
    }

    /// Insert `separator` and its right child just after the child at `slot`
    pub fn insert_after(&mut self, slot: usize, separator: u32, right: PageId) {
        self.keys.insert(slot, separator);
        self.children.insert(slot + 1, right);
    }

    /// Split around the middle key.
    ///
    /// Returns the promoted key and the new right sibling. The promoted key
    /// leaves both halves; this node keeps `keys[..mid]` and the children
    /// to their left.
    pub fn split(&mut self) -> (u32, InternalNode) {
        let mid = self.keys.len() / 2;
        let mut right_keys = self.keys.split_off(mid);
        let promoted = right_keys.remove(0);
        let right_children = self.children.split_off(mid + 1);

        let right = InternalNode {
            is_root: false,
            parent: self.parent,
            keys: right_keys,
            children: right_children,
        };
        (promoted, right)
    }
}

/// A decoded index node of either type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Leaf(LeafNode),
    Internal(InternalNode),
}

impl Node {
    /// Decode whichever node type the page holds
    pub fn read(page: &PageBuf) -> Result<Self> {
        let header = NodeHeader::read(page)?;
        match header.page_type {
            PageType::Leaf => Ok(Node::Leaf(LeafNode::from_header(page, header)?)),
            PageType::Internal => Ok(Node::Internal(InternalNode::from_header(page, header)?)),
        }
    }

    /// Encode into a page
    pub fn write(&self, page: &mut PageBuf) {
        match self {
            Node::Leaf(leaf) => leaf.write(page),
            Node::Internal(internal) => internal.write(page),
        }
    }

    /// Whether this node is the tree root
    pub fn is_root(&self) -> bool {
        match self {
            Node::Leaf(leaf) => leaf.is_root,
            Node::Internal(internal) => internal.is_root,
        }
    }

    /// Set or clear the root flag
    pub fn set_root(&mut self, is_root: bool) {
        match self {
            Node::Leaf(leaf) => leaf.is_root = is_root,
            Node::Internal(internal) => internal.is_root = is_root,
        }
    }

    /// Parent page, `PageId::INVALID` for the root
    pub fn parent(&self) -> PageId {
        match self {
            Node::Leaf(leaf) => leaf.parent,
            Node::Internal(internal) => internal.parent,
        }
    }

    /// Point this node at a new parent page
    pub fn set_parent(&mut self, parent: PageId) {
        match self {
            Node::Leaf(leaf) => leaf.parent = parent,
            Node::Internal(internal) => internal.parent = parent,
        }
    }
}
