//! # Paged KV
//!
//! An embedded key-value store backed by two flat page files: an ordered
//! index (`<path>.idx`) and a variable-length record heap (`<path>.dat`).
//!
//! ## Architecture
//!
//! - **Page Layer** (`page`): Page buffers and the fixed leaf/internal node layout
//! - **Storage Layer** (`storage`): Disk I/O abstraction for page files
//! - **Page Cache** (`buffer`): Bounded page manager every other layer goes through
//! - **B-Tree Layer** (`btree`): `u32` key to `u64` location index with node splits
//! - **Heap Layer** (`heap`): Append-only record heap producing locations
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paged_kv::{Config, Store};
//!
//! let store = Store::open(Config::new("mydb"))?;
//!
//! store.put(42, b"hello")?;
//! assert_eq!(store.get(42)?, Some(b"hello".to_vec()));
//!
//! store.delete(42)?;
//! store.close()?;
//! ```

pub mod btree;
pub mod buffer;
pub mod error;
pub mod heap;
pub mod page;
pub mod storage;
pub mod types;

pub use error::{Result, StorageError};
pub use types::{BTreeConfig, Location, PageId, PAGE_SIZE};

// Re-export main public API
pub use btree::BTree;
pub use buffer::PageManager;
pub use heap::{HeapStats, RecordHeap};
pub use storage::{DiskManager, DiskManagerImpl};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use tracing::debug;
use types::DEFAULT_CACHE_PAGES;

/// Store configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base path; the store uses `<path>.idx` and `<path>.dat`
    pub path: PathBuf,
    /// Page slots per file, the ceiling on each file's page count (default: 100)
    pub cache_pages: usize,
    /// Whether to sync every page write immediately (default: false)
    pub sync_on_write: bool,
    /// B-tree configuration for node limits
    pub btree_config: BTreeConfig,
}

impl Config {
    /// Create a new configuration with default settings
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self {
            path: path.into(),
            cache_pages: DEFAULT_CACHE_PAGES,
            sync_on_write: false,
            btree_config: BTreeConfig::default(),
        }
    }

    /// Set the number of page slots per file
    pub fn cache_pages(mut self, pages: usize) -> Self {
        self.cache_pages = pages;
        self
    }

    /// Enable sync on write for durability
    pub fn sync_on_write(mut self, enabled: bool) -> Self {
        self.sync_on_write = enabled;
        self
    }

    /// Set B-tree configuration
    pub fn btree_config(mut self, config: BTreeConfig) -> Self {
        self.btree_config = config;
        self
    }

    /// Path of the index file
    pub fn index_path(&self) -> PathBuf {
        self.with_extension("idx")
    }

    /// Path of the heap file
    pub fn heap_path(&self) -> PathBuf {
        self.with_extension("dat")
    }

    fn with_extension(&self, ext: &str) -> PathBuf {
        let mut path = self.path.clone().into_os_string();
        path.push(".");
        path.push(ext);
        PathBuf::from(path)
    }
}

/// Node type for visualization
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    /// Page ID
    pub page_id: u32,
    /// Whether this is a leaf node
    pub is_leaf: bool,
    /// Keys in this node (separators for internal nodes)
    pub keys: Vec<u32>,
    /// Raw locations (only for leaf nodes)
    pub locations: Vec<u64>,
    /// Child nodes (only for internal nodes)
    pub children: Vec<TreeNode>,
}

/// Store statistics
#[derive(Debug, Clone)]
pub struct StoreStats {
    /// Pages in the index file
    pub index_pages: u32,
    /// Pages in the heap file
    pub heap_pages: u32,
    /// Page slots per file
    pub cache_pages: usize,
    /// Height of the B-tree
    pub tree_height: usize,
    /// Keys in the index
    pub key_count: usize,
    /// Heap records that are still readable
    pub live_records: usize,
    /// Tombstoned heap records
    pub deleted_records: usize,
}

struct StoreInner {
    index: BTree,
    heap: RecordHeap,
}

/// Main store handle composing the index with the record heap
///
/// Every call locks the whole store, so concurrent callers are serialized.
/// Operations are not transactional: if the heap write of a `put` succeeds
/// and the index insert then fails, the record stays in the heap,
/// unreachable.
pub struct Store {
    inner: Mutex<StoreInner>,
    config: Config,
}

impl Store {
    /// Open or create the index and heap files of a store
    pub fn open(config: Config) -> Result<Self> {
        let index_manager =
            PageManager::open(&config.index_path(), config.cache_pages, config.sync_on_write)?;
        let heap_manager =
            PageManager::open(&config.heap_path(), config.cache_pages, config.sync_on_write)?;

        let index = BTree::open(index_manager, config.btree_config.clone())?;
        let heap = RecordHeap::open(heap_manager)?;

        debug!(
            path = %config.path.display(),
            index_pages = index.page_count(),
            heap_pages = heap.page_count(),
            "opened store"
        );

        Ok(Self {
            inner: Mutex::new(StoreInner { index, heap }),
            config,
        })
    }

    /// Get the store configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Store a new key-value pair
    ///
    /// Fails with `DuplicateKey` if the key is already present.
    pub fn put(&self, key: u32, value: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.index.contains(key)? {
            return Err(StorageError::DuplicateKey(key));
        }

        let location = inner.heap.write(value)?;
        inner.index.insert(key, location.to_u64())
    }

    /// Get a value by key
    ///
    /// Returns `None` if the key does not exist.
    pub fn get(&self, key: u32) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock();
        let location = match inner.index.find(key) {
            Ok(raw) => Location::from_u64(raw),
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        inner.heap.read_to_vec(location).map(Some)
    }

    /// Copy the value for `key` into `buf`, returning its length
    ///
    /// Fails with `BufferTooSmall` if `buf` cannot hold the value.
    pub fn get_into(&self, key: u32, buf: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.lock();
        let location = Location::from_u64(inner.index.find(key)?);
        inner.heap.read(location, buf)
    }

    /// Delete a key and tombstone its value
    ///
    /// Returns `true` if the key existed and was deleted.
    pub fn delete(&self, key: u32) -> Result<bool> {
        let mut inner = self.inner.lock();
        let location = match inner.index.delete(key) {
            Ok(raw) => Location::from_u64(raw),
            Err(e) if e.is_not_found() => return Ok(false),
            Err(e) => return Err(e),
        };
        inner.heap.delete(location)?;
        Ok(true)
    }

    /// Check if a key exists
    pub fn contains(&self, key: u32) -> Result<bool> {
        self.inner.lock().index.contains(key)
    }

    /// All key-value pairs in key order
    pub fn iter(&self) -> Result<Vec<(u32, Vec<u8>)>> {
        self.range(None, None)
    }

    /// Key-value pairs with `start <= key < end`, in key order
    ///
    /// Both bounds are optional; `None` means unbounded on that side.
    pub fn range(&self, start: Option<u32>, end: Option<u32>) -> Result<Vec<(u32, Vec<u8>)>> {
        let mut inner = self.inner.lock();
        let entries = inner.index.scan(start, end)?;
        entries
            .into_iter()
            .map(|(key, raw)| Ok((key, inner.heap.read_to_vec(Location::from_u64(raw))?)))
            .collect()
    }

    /// Flush all cached pages of both files to disk
    pub fn flush(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.index.flush()?;
        inner.heap.flush()
    }

    /// Flush and release both files
    ///
    /// Both files are closed even if closing the first one fails.
    pub fn close(self) -> Result<()> {
        let StoreInner { index, heap } = self.inner.into_inner();
        let index_result = index.close();
        let heap_result = heap.close();
        index_result.and(heap_result)
    }

    /// Debug trace a key lookup
    pub fn trace_find(&self, key: u32) -> Result<Vec<String>> {
        self.inner.lock().index.trace_find(key)
    }

    /// Write a depth-first dump of the index
    pub fn print_tree<W: Write>(&self, out: &mut W) -> Result<()> {
        self.inner.lock().index.print(out)
    }

    /// Export the tree structure for visualization
    pub fn export_tree(&self) -> Result<TreeNode> {
        self.inner.lock().index.export()
    }

    /// Check the index invariants
    pub fn verify(&self) -> Result<()> {
        self.inner.lock().index.verify()
    }

    /// Get statistics about the store
    pub fn stats(&self) -> Result<StoreStats> {
        let mut inner = self.inner.lock();
        let heap = inner.heap.stats()?;
        Ok(StoreStats {
            index_pages: inner.index.page_count(),
            heap_pages: heap.pages,
            cache_pages: self.config.cache_pages,
            tree_height: inner.index.height(),
            key_count: inner.index.len()?,
            live_records: heap.live_records,
            deleted_records: heap.deleted_records,
        })
    }
}
