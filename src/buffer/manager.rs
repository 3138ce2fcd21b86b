//! Page manager implementation.
//!
//! The page manager owns one backing file and a bounded, in-memory cache of
//! its pages. Every page ever allocated stays cached once loaded; there is
//! no eviction, so the cache capacity is also the ceiling on the file's
//! page count.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::storage::{DiskManager, DiskManagerImpl};
use crate::types::PageId;
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, warn};

/// A cached page
struct Frame {
    /// The page data
    page: Box<PageBuf>,
    /// Whether the page has been modified since it was last written
    dirty: bool,
}

/// Page manager: page-number-to-buffer cache over a [`DiskManager`]
pub struct PageManager {
    /// The disk manager for I/O
    disk: Box<dyn DiskManager>,
    /// Cached frames indexed by page number
    frames: HashMap<PageId, Frame>,
    /// Pages in use, cached or not (the allocation frontier)
    page_count: u32,
    /// Maximum number of pages
    capacity: usize,
    /// Set once `close` has flushed everything
    closed: bool,
}

impl PageManager {
    /// Open or create a page file with room for `capacity` pages
    pub fn open(path: &Path, capacity: usize, sync_on_write: bool) -> Result<Self> {
        let disk = DiskManagerImpl::open(path, sync_on_write)?;
        Self::with_disk(Box::new(disk), capacity)
    }

    /// Build a page manager on top of any disk manager
    pub fn with_disk(disk: Box<dyn DiskManager>, capacity: usize) -> Result<Self> {
        let page_count = disk.page_count();
        if page_count as usize > capacity {
            return Err(StorageError::PageOutOfRange {
                page_id: PageId::new(page_count - 1),
                capacity,
            });
        }

        Ok(Self {
            disk,
            frames: HashMap::with_capacity(capacity),
            page_count,
            capacity,
            closed: false,
        })
    }

    /// Number of pages in use
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Maximum number of pages this manager can hold
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Pages that can still be allocated
    pub fn free_slots(&self) -> usize {
        self.capacity - self.page_count as usize
    }

    /// Whether a page is currently held in memory
    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.frames.contains_key(&page_id)
    }

    /// Get a page for reading, loading it from disk on first access
    pub fn get_page(&mut self, page_id: PageId) -> Result<&PageBuf> {
        let frame = self.frame(page_id)?;
        Ok(&frame.page)
    }

    /// Get a page for writing; the page is flushed on the next `flush_*`
    pub fn get_page_mut(&mut self, page_id: PageId) -> Result<&mut PageBuf> {
        let frame = self.frame(page_id)?;
        frame.dirty = true;
        Ok(&mut frame.page)
    }

    fn frame(&mut self, page_id: PageId) -> Result<&mut Frame> {
        if page_id.index() >= self.capacity {
            return Err(StorageError::PageOutOfRange {
                page_id,
                capacity: self.capacity,
            });
        }
        if page_id.value() >= self.page_count {
            return Err(StorageError::PageNotFound(page_id));
        }

        if !self.frames.contains_key(&page_id) {
            let mut page = Box::new(PageBuf::new());
            self.disk.read_page(page_id, &mut page)?;
            self.frames.insert(page_id, Frame { page, dirty: false });
        }

        self.frames
            .get_mut(&page_id)
            .ok_or(StorageError::PageNotFound(page_id))
    }

    /// Allocate a zeroed page at the end of the file
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if self.page_count as usize >= self.capacity {
            warn!(capacity = self.capacity, "page cache exhausted");
            return Err(StorageError::PageCacheExhausted {
                capacity: self.capacity,
            });
        }

        let page_id = PageId::new(self.page_count);
        self.frames.insert(
            page_id,
            Frame {
                page: Box::new(PageBuf::new()),
                dirty: true,
            },
        );
        self.page_count += 1;

        debug!(page = %page_id, "allocated page");
        Ok(page_id)
    }

    /// Write a cached page back to its file offset; no-op if not cached or clean
    pub fn flush_page(&mut self, page_id: PageId) -> Result<()> {
        if let Some(frame) = self.frames.get_mut(&page_id) {
            if frame.dirty {
                self.disk.write_page(page_id, &frame.page)?;
                frame.dirty = false;
            }
        }
        Ok(())
    }

    /// Flush every cached page, then force the file to durable storage
    pub fn flush_all(&mut self) -> Result<()> {
        let mut dirty: Vec<PageId> = self
            .frames
            .iter()
            .filter(|(_, frame)| frame.dirty)
            .map(|(&page_id, _)| page_id)
            .collect();
        dirty.sort_unstable();

        for page_id in dirty {
            self.flush_page(page_id)?;
        }
        self.disk.sync()
    }

    /// Flush all pages and release the file
    pub fn close(mut self) -> Result<()> {
        self.closed = true;
        self.flush_all()
    }
}

impl Drop for PageManager {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Err(e) = self.flush_all() {
            warn!(error = %e, "failed to flush pages while dropping page manager");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PAGE_SIZE;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    /// Disk that accepts reads but fails every write
    struct FailingDisk {
        writes: Arc<AtomicUsize>,
    }

    impl DiskManager for FailingDisk {
        fn read_page(&mut self, _page_id: PageId, buf: &mut PageBuf) -> Result<()> {
            buf.fill(0);
            Ok(())
        }

        fn write_page(&mut self, _page_id: PageId, _data: &PageBuf) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            Err(io::Error::new(io::ErrorKind::Other, "disk full").into())
        }

        fn page_count(&self) -> u32 {
            0
        }

        fn sync(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_allocate_and_reopen() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut pm = PageManager::open(&path, 10, false)?;
            assert_eq!(pm.allocate_page()?, PageId::new(0));
            assert_eq!(pm.allocate_page()?, PageId::new(1));

            pm.get_page_mut(PageId::new(1))?[0..5].copy_from_slice(b"hello");
            pm.close()?;
        }

        assert_eq!(std::fs::metadata(&path)?.len(), 2 * PAGE_SIZE as u64);

        let mut pm = PageManager::open(&path, 10, false)?;
        assert_eq!(pm.page_count(), 2);
        assert!(!pm.is_cached(PageId::new(1)));
        assert_eq!(&pm.get_page(PageId::new(1))?[0..5], b"hello");
        assert!(pm.is_cached(PageId::new(1)));

        // New pages go after the existing ones
        assert_eq!(pm.allocate_page()?, PageId::new(2));

        Ok(())
    }

    #[test]
    fn test_allocated_page_is_zeroed() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut pm = PageManager::open(&dir.path().join("test.idx"), 4, false)?;

        let page_id = pm.allocate_page()?;
        assert!(pm.get_page(page_id)?.iter().all(|&b| b == 0));

        Ok(())
    }

    #[test]
    fn test_exhaustion() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut pm = PageManager::open(&dir.path().join("test.idx"), 3, false)?;

        for _ in 0..3 {
            pm.allocate_page()?;
        }
        assert_eq!(pm.free_slots(), 0);
        assert!(matches!(
            pm.allocate_page(),
            Err(StorageError::PageCacheExhausted { capacity: 3 })
        ));

        Ok(())
    }

    #[test]
    fn test_get_page_bounds() -> Result<()> {
        let dir = tempdir().unwrap();
        let mut pm = PageManager::open(&dir.path().join("test.idx"), 3, false)?;
        pm.allocate_page()?;

        assert!(matches!(
            pm.get_page(PageId::new(3)),
            Err(StorageError::PageOutOfRange { capacity: 3, .. })
        ));
        assert!(matches!(
            pm.get_page(PageId::new(1)),
            Err(StorageError::PageNotFound(_))
        ));

        Ok(())
    }

    #[test]
    fn test_flush_page_only_writes_dirty_pages() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        let mut pm = PageManager::open(&path, 4, false)?;

        let page_id = pm.allocate_page()?;
        pm.flush_page(page_id)?;
        assert_eq!(std::fs::metadata(&path)?.len(), PAGE_SIZE as u64);

        // Uncached and clean pages are no-ops
        pm.flush_page(PageId::new(3))?;
        pm.get_page(page_id)?;
        pm.flush_page(page_id)?;

        Ok(())
    }

    #[test]
    fn test_write_errors_propagate() -> Result<()> {
        let writes = Arc::new(AtomicUsize::new(0));
        let disk = FailingDisk {
            writes: Arc::clone(&writes),
        };
        let mut pm = PageManager::with_disk(Box::new(disk), 4)?;

        let page_id = pm.allocate_page()?;
        assert!(matches!(pm.flush_page(page_id), Err(StorageError::Io(_))));
        assert!(matches!(pm.flush_all(), Err(StorageError::Io(_))));
        assert!(pm.close().is_err());
        assert_eq!(writes.load(Ordering::SeqCst), 3);

        Ok(())
    }

    #[test]
    fn test_drop_flushes_pending_writes() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");

        {
            let mut pm = PageManager::open(&path, 4, false)?;
            let page_id = pm.allocate_page()?;
            pm.get_page_mut(page_id)?[0] = 42;
        }

        let mut pm = PageManager::open(&path, 4, false)?;
        assert_eq!(pm.get_page(PageId::new(0))?[0], 42);

        Ok(())
    }

    #[test]
    fn test_file_larger_than_capacity_is_rejected() -> Result<()> {
        let dir = tempdir().unwrap();
        let path = dir.path().join("test.idx");
        std::fs::write(&path, vec![0u8; 3 * PAGE_SIZE])?;

        assert!(matches!(
            PageManager::open(&path, 2, false),
            Err(StorageError::PageOutOfRange { .. })
        ));

        Ok(())
    }
}
