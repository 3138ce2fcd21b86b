//! B-tree core implementation.
//!
//! This module provides the main BTree struct with operations for:
//! - find: Point lookups
//! - insert: Insertions, splitting full nodes on the way
//! - delete: Removals (no rebalancing)
//! - scan: Range queries
//!
//! Keys are `u32`, values are opaque `u64` locations. Every node occupies
//! one page of the index file and keeps a reference to its parent page, so
//! the root can be found again from page 0 after a reopen.

use crate::buffer::PageManager;
use crate::error::{Result, StorageError};
use crate::page::{InternalNode, LeafNode, Node};
use crate::types::{BTreeConfig, PageId};
use crate::TreeNode;
use std::io::Write;
use tracing::{debug, warn};

/// Upper bound on split-then-retry rounds for one insert
const MAX_INSERT_ATTEMPTS: usize = 8;

/// A disk-based B-tree
pub struct BTree {
    /// Page manager for the index file
    manager: PageManager,
    /// Root page ID
    root_page: PageId,
    /// Current height of the tree (a lone root leaf has height 1)
    height: usize,
    /// Node fan-out limits
    config: BTreeConfig,
}

impl BTree {
    /// Create a new tree: allocates one page and makes it an empty root leaf.
    ///
    /// Node limits outside what a page can hold are clamped.
    pub fn create(manager: PageManager, config: BTreeConfig) -> Result<Self> {
        let mut tree = Self {
            manager,
            root_page: PageId::INVALID,
            height: 1,
            config: config.clamped(),
        };

        let root_page = tree.manager.allocate_page()?;
        let mut root = LeafNode::new();
        root.is_root = true;
        tree.write_leaf(root_page, &root)?;
        tree.root_page = root_page;

        Ok(tree)
    }

    /// Load the tree stored in `manager`, or create one if the file is empty
    pub fn open(manager: PageManager, config: BTreeConfig) -> Result<Self> {
        if manager.page_count() == 0 {
            return Self::create(manager, config);
        }

        let mut tree = Self {
            manager,
            root_page: PageId::INVALID,
            height: 0,
            config: config.clamped(),
        };
        tree.root_page = tree.locate_root()?;
        tree.height = tree.measure_height()?;

        debug!(root = %tree.root_page, height = tree.height, "opened index");
        Ok(tree)
    }

    /// Follow parent references up from page 0
    fn locate_root(&mut self) -> Result<PageId> {
        let mut page_id = PageId::new(0);
        for _ in 0..=self.manager.page_count() {
            let node = self.read_node(page_id)?;
            if node.is_root() {
                return Ok(page_id);
            }
            page_id = node.parent();
            if !page_id.is_valid() {
                return Err(StorageError::corrupt_file(
                    "index node has no parent but is not marked as root",
                ));
            }
        }
        Err(StorageError::corrupt_file("cycle in index parent references"))
    }

    /// Count levels along the leftmost path
    fn measure_height(&mut self) -> Result<usize> {
        let mut page_id = self.root_page;
        for height in 1..=self.manager.page_count() as usize {
            match self.read_node(page_id)? {
                Node::Leaf(_) => return Ok(height),
                Node::Internal(node) => page_id = node.children[0],
            }
        }
        Err(StorageError::corrupt_file("index descent does not reach a leaf"))
    }

    /// Get the height of the tree
    pub fn height(&self) -> usize {
        self.height
    }

    /// Get the root page ID
    pub fn root_page(&self) -> PageId {
        self.root_page
    }

    /// Get the node fan-out limits
    pub fn config(&self) -> &BTreeConfig {
        &self.config
    }

    /// Number of pages in the index file
    pub fn page_count(&self) -> u32 {
        self.manager.page_count()
    }

    /// Page cache capacity of the index file
    pub fn capacity(&self) -> usize {
        self.manager.capacity()
    }

    fn read_node(&mut self, page_id: PageId) -> Result<Node> {
        Node::read(self.manager.get_page(page_id)?)
    }

    fn read_internal(&mut self, page_id: PageId) -> Result<InternalNode> {
        InternalNode::read(self.manager.get_page(page_id)?)
    }

    fn write_node(&mut self, page_id: PageId, node: &Node) -> Result<()> {
        node.write(self.manager.get_page_mut(page_id)?);
        Ok(())
    }

    fn write_leaf(&mut self, page_id: PageId, leaf: &LeafNode) -> Result<()> {
        leaf.write(self.manager.get_page_mut(page_id)?);
        Ok(())
    }

    fn write_internal(&mut self, page_id: PageId, node: &InternalNode) -> Result<()> {
        node.write(self.manager.get_page_mut(page_id)?);
        Ok(())
    }

    /// Walk from the root to the leaf that may hold `key`.
    ///
    /// Returns the internal pages passed on the way (root first), the leaf's
    /// page and the decoded leaf.
    fn descend(&mut self, key: u32) -> Result<(Vec<PageId>, PageId, LeafNode)> {
        let mut path = Vec::with_capacity(self.height);
        let mut page_id = self.root_page;

        for _ in 0..=self.manager.page_count() {
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => return Ok((path, page_id, leaf)),
                Node::Internal(node) => {
                    path.push(page_id);
                    page_id = node.child_for(key);
                }
            }
        }
        Err(StorageError::corrupt_file("index descent does not reach a leaf"))
    }

    /// Look up the location stored for `key`
    pub fn find(&mut self, key: u32) -> Result<u64> {
        let (_, _, leaf) = self.descend(key)?;
        match leaf.search(key) {
            Ok(idx) => Ok(leaf.locations[idx]),
            Err(_) => Err(StorageError::KeyNotFound),
        }
    }

    /// Check whether `key` is present
    pub fn contains(&mut self, key: u32) -> Result<bool> {
        match self.find(key) {
            Ok(_) => Ok(true),
            Err(StorageError::KeyNotFound) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Debug search - traces the path through the tree
    pub fn trace_find(&mut self, key: u32) -> Result<Vec<String>> {
        let mut trace = vec![
            format!("Searching for key: {}", key),
            format!("Root page: {}, Height: {}", self.root_page, self.height),
        ];

        let mut page_id = self.root_page;
        for _ in 0..=self.manager.page_count() {
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => {
                    trace.push(format!("  Page {}: leaf, {} cells", page_id, leaf.len()));
                    match leaf.search(key) {
                        Ok(idx) => trace.push(format!(
                            "  FOUND at index {}, location {:#x}",
                            idx, leaf.locations[idx]
                        )),
                        Err(_) => trace.push("  NOT FOUND in leaf".to_string()),
                    }
                    return Ok(trace);
                }
                Node::Internal(node) => {
                    let idx = node.child_index(key);
                    trace.push(format!(
                        "  Page {}: internal, separators {:?}",
                        page_id, node.keys
                    ));
                    trace.push(format!(
                        "  -> Descending to child {} (page {})",
                        idx, node.children[idx]
                    ));
                    page_id = node.children[idx];
                }
            }
        }
        Err(StorageError::corrupt_file("index descent does not reach a leaf"))
    }

    /// Insert a new key.
    ///
    /// A full leaf is split first and the insert retried against the
    /// restructured tree. Fails with `DuplicateKey` if the key exists and
    /// with `PageCacheExhausted` if the split would need more pages than the
    /// cache has left; neither failure modifies the tree.
    pub fn insert(&mut self, key: u32, location: u64) -> Result<()> {
        for _ in 0..MAX_INSERT_ATTEMPTS {
            let (path, leaf_id, mut leaf) = self.descend(key)?;
            let idx = match leaf.search(key) {
                Ok(_) => return Err(StorageError::DuplicateKey(key)),
                Err(idx) => idx,
            };

            if leaf.len() < self.config.max_leaf_cells {
                leaf.insert(idx, key, location);
                return self.write_leaf(leaf_id, &leaf);
            }

            self.split_leaf(path, leaf_id, leaf)?;
        }

        Err(StorageError::invalid_operation(format!(
            "leaf for key {} still full after {} splits",
            key, MAX_INSERT_ATTEMPTS
        )))
    }

    /// Pages a leaf split along `path` will allocate: the new leaf, one per
    /// full ancestor, and a new root if every ancestor is full.
    fn pages_needed_for_split(&mut self, path: &[PageId]) -> Result<usize> {
        let mut needed = 1;
        for &page_id in path.iter().rev() {
            let node = self.read_internal(page_id)?;
            if node.keys.len() < self.config.max_internal_keys {
                return Ok(needed);
            }
            needed += 1;
        }
        Ok(needed + 1)
    }

    /// Split a full leaf in two and push the separator up the tree
    fn split_leaf(&mut self, path: Vec<PageId>, leaf_id: PageId, mut leaf: LeafNode) -> Result<()> {
        let needed = self.pages_needed_for_split(&path)?;
        if self.manager.free_slots() < needed {
            warn!(
                needed,
                available = self.manager.free_slots(),
                "not enough free pages to split leaf"
            );
            return Err(StorageError::PageCacheExhausted {
                capacity: self.manager.capacity(),
            });
        }

        let right = leaf.split_off(leaf.len() / 2);
        let separator = right.keys[0];
        let right_id = self.manager.allocate_page()?;

        self.write_leaf(leaf_id, &leaf)?;
        self.write_leaf(right_id, &right)?;
        debug!(
            left = %leaf_id,
            right = %right_id,
            separator,
            left_cells = leaf.len(),
            right_cells = right.len(),
            "split leaf"
        );

        self.promote(path, leaf_id, separator, right_id)
    }

    /// Insert `separator` / `right_id` next to `left_id` in its parent,
    /// splitting full internal nodes upward until one absorbs the key.
    fn promote(
        &mut self,
        mut path: Vec<PageId>,
        mut left_id: PageId,
        mut separator: u32,
        mut right_id: PageId,
    ) -> Result<()> {
        while let Some(parent_id) = path.pop() {
            let mut parent = self.read_internal(parent_id)?;
            let slot = parent.position_of(left_id).ok_or_else(|| {
                StorageError::corrupt_file(format!(
                    "page {} is not a child of its parent {}",
                    left_id, parent_id
                ))
            })?;
            parent.insert_after(slot, separator, right_id);

            if parent.keys.len() <= self.config.max_internal_keys {
                return self.write_internal(parent_id, &parent);
            }

            let (promoted, sibling) = parent.split();
            let sibling_id = self.manager.allocate_page()?;
            self.write_internal(parent_id, &parent)?;
            self.write_internal(sibling_id, &sibling)?;
            for &child in &sibling.children {
                self.set_parent(child, sibling_id)?;
            }
            debug!(
                left = %parent_id,
                right = %sibling_id,
                separator = promoted,
                "split internal node"
            );

            left_id = parent_id;
            separator = promoted;
            right_id = sibling_id;
        }

        self.grow_root(left_id, separator, right_id)
    }

    /// Put a new internal root above the two halves of the old root
    fn grow_root(&mut self, left_id: PageId, separator: u32, right_id: PageId) -> Result<()> {
        let root_id = self.manager.allocate_page()?;
        let root = InternalNode::new_root(left_id, separator, right_id);
        self.write_internal(root_id, &root)?;

        for child in [left_id, right_id] {
            let mut node = self.read_node(child)?;
            node.set_root(false);
            node.set_parent(root_id);
            self.write_node(child, &node)?;
        }

        self.root_page = root_id;
        self.height += 1;
        debug!(root = %root_id, separator, height = self.height, "split root");
        Ok(())
    }

    fn set_parent(&mut self, page_id: PageId, parent: PageId) -> Result<()> {
        let mut node = self.read_node(page_id)?;
        node.set_parent(parent);
        self.write_node(page_id, &node)
    }

    /// Delete `key`, returning the location it mapped to.
    ///
    /// The cell is removed from its leaf and the leaf is flushed at once.
    /// Underfull leaves are left as they are: no merge or redistribution.
    pub fn delete(&mut self, key: u32) -> Result<u64> {
        let (_, leaf_id, mut leaf) = self.descend(key)?;
        let idx = leaf.search(key).map_err(|_| StorageError::KeyNotFound)?;

        let (_, location) = leaf.remove(idx);
        self.write_leaf(leaf_id, &leaf)?;
        self.manager.flush_page(leaf_id)?;

        Ok(location)
    }

    /// Scan a range of keys
    ///
    /// Returns all `(key, location)` pairs where start <= key < end, in key
    /// order. A `None` bound is unbounded on that side.
    pub fn scan(&mut self, start: Option<u32>, end: Option<u32>) -> Result<Vec<(u32, u64)>> {
        let mut results = Vec::new();
        self.scan_recursive(self.root_page, start, end, &mut results)?;
        Ok(results)
    }

    fn scan_recursive(
        &mut self,
        page_id: PageId,
        start: Option<u32>,
        end: Option<u32>,
        results: &mut Vec<(u32, u64)>,
    ) -> Result<()> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => {
                for (&key, &location) in leaf.keys.iter().zip(&leaf.locations) {
                    if start.is_some_and(|s| key < s) {
                        continue;
                    }
                    if end.is_some_and(|e| key >= e) {
                        break;
                    }
                    results.push((key, location));
                }
            }
            Node::Internal(node) => {
                // children[i] covers [keys[i - 1], keys[i])
                let count = node.keys.len();
                for (i, &child) in node.children.iter().enumerate() {
                    let below_start = i < count && start.is_some_and(|s| node.keys[i] <= s);
                    let past_end = i > 0 && end.is_some_and(|e| node.keys[i - 1] >= e);
                    if below_start || past_end {
                        continue;
                    }
                    self.scan_recursive(child, start, end, results)?;
                }
            }
        }
        Ok(())
    }

    /// Number of keys stored
    pub fn len(&mut self) -> Result<usize> {
        Ok(self.scan(None, None)?.len())
    }

    /// Whether the tree holds no keys
    pub fn is_empty(&mut self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write a depth-first dump of the tree, one node per line
    pub fn print<W: Write>(&mut self, out: &mut W) -> Result<()> {
        writeln!(out, "B-Tree Structure:")?;

        let mut stack = vec![(self.root_page, 0usize)];
        while let Some((page_id, level)) = stack.pop() {
            let indent = "  ".repeat(level);
            match self.read_node(page_id)? {
                Node::Leaf(leaf) => {
                    writeln!(out, "{}Leaf[{}]: {}", indent, page_id, join_keys(&leaf.keys))?;
                }
                Node::Internal(node) => {
                    writeln!(out, "{}Internal[{}]: {}", indent, page_id, join_keys(&node.keys))?;
                    for &child in node.children.iter().rev() {
                        stack.push((child, level + 1));
                    }
                }
            }
        }
        Ok(())
    }

    /// Export the tree structure for visualization
    pub fn export(&mut self) -> Result<TreeNode> {
        self.export_node(self.root_page)
    }

    fn export_node(&mut self, page_id: PageId) -> Result<TreeNode> {
        match self.read_node(page_id)? {
            Node::Leaf(leaf) => Ok(TreeNode {
                page_id: page_id.value(),
                is_leaf: true,
                keys: leaf.keys,
                locations: leaf.locations,
                children: Vec::new(),
            }),
            Node::Internal(node) => {
                let children = node
                    .children
                    .iter()
                    .map(|&child| self.export_node(child))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TreeNode {
                    page_id: page_id.value(),
                    is_leaf: false,
                    keys: node.keys,
                    locations: Vec::new(),
                    children,
                })
            }
        }
    }

    /// Check the structural invariants of the whole tree.
    ///
    /// Verifies key ordering within and across nodes, that every leaf sits
    /// at the same depth, and that root flags and parent references agree
    /// with the actual shape. Violations are reported as `CorruptFile`.
    pub fn verify(&mut self) -> Result<()> {
        let mut leaf_depth = None;
        self.verify_node(self.root_page, PageId::INVALID, None, None, 1, &mut leaf_depth)?;

        if leaf_depth != Some(self.height) {
            return Err(StorageError::corrupt_file(format!(
                "leaves at depth {:?}, tree height is {}",
                leaf_depth, self.height
            )));
        }
        Ok(())
    }

    fn verify_node(
        &mut self,
        page_id: PageId,
        parent: PageId,
        lower: Option<u32>,
        upper: Option<u32>,
        depth: usize,
        leaf_depth: &mut Option<usize>,
    ) -> Result<()> {
        let node = self.read_node(page_id)?;
        let is_root = page_id == self.root_page;
        if node.is_root() != is_root || node.parent() != parent {
            return Err(StorageError::corrupt_file(format!(
                "page {}: root flag {} / parent {} do not match position",
                page_id,
                node.is_root(),
                node.parent()
            )));
        }

        let keys = match &node {
            Node::Leaf(leaf) => &leaf.keys,
            Node::Internal(internal) => &internal.keys,
        };
        check_keys(page_id, keys, lower, upper)?;

        match node {
            Node::Leaf(_) => match *leaf_depth {
                Some(d) if d != depth => Err(StorageError::corrupt_file(format!(
                    "leaf {} at depth {}, expected {}",
                    page_id, depth, d
                ))),
                _ => {
                    *leaf_depth = Some(depth);
                    Ok(())
                }
            },
            Node::Internal(internal) => {
                let count = internal.keys.len();
                for (i, &child) in internal.children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(internal.keys[i - 1]) };
                    let child_upper = if i == count { upper } else { Some(internal.keys[i]) };
                    self.verify_node(child, page_id, child_lower, child_upper, depth + 1, leaf_depth)?;
                }
                Ok(())
            }
        }
    }

    /// Flush every cached index page
    pub fn flush(&mut self) -> Result<()> {
        self.manager.flush_all()
    }

    /// Flush and release the index file
    pub fn close(self) -> Result<()> {
        self.manager.close()
    }
}

fn join_keys(keys: &[u32]) -> String {
    keys.iter()
        .map(|k| k.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Keys must be strictly increasing and inside `[lower, upper)`
fn check_keys(page_id: PageId, keys: &[u32], lower: Option<u32>, upper: Option<u32>) -> Result<()> {
    if keys.windows(2).any(|w| w[0] >= w[1]) {
        return Err(StorageError::corrupt_file(format!(
            "page {}: keys not strictly increasing",
            page_id
        )));
    }
    let out_of_range = keys
        .iter()
        .any(|&k| lower.is_some_and(|l| k < l) || upper.is_some_and(|u| k >= u));
    if out_of_range {
        return Err(StorageError::corrupt_file(format!(
            "page {}: key outside the range routed to it",
            page_id
        )));
    }
    Ok(())
}
