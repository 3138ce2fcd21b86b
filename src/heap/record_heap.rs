//! Append-only record heap.
//!
//! Records are packed one after another into the active page; when a record
//! does not fit in what is left of it, a new page is allocated and becomes
//! the active page. Deleted records are tombstoned in place and their space
//! is never reused.

use crate::buffer::PageManager;
use crate::error::{Result, StorageError};
use crate::heap::record::{fits_in_page, RecordPrefix};
use crate::types::{Location, PageId, MAX_RECORD_SIZE, PAGE_SIZE, RECORD_PREFIX_SIZE};
use tracing::{debug, trace};

/// Record counts gathered by walking every heap page
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeapStats {
    /// Pages in the heap file
    pub pages: u32,
    /// Records that can still be read
    pub live_records: usize,
    /// Tombstoned records
    pub deleted_records: usize,
    /// Payload bytes held by live records
    pub live_bytes: usize,
}

/// Result of walking one page's records
#[derive(Debug, Default)]
struct PageWalk {
    /// Offset just past the last record
    end: usize,
    live: usize,
    deleted: usize,
    live_bytes: usize,
}

/// Variable-length record store on top of a page manager
pub struct RecordHeap {
    /// Page manager for the heap file
    manager: PageManager,
    /// Page receiving new records
    active_page: Option<PageId>,
    /// Next free byte in the active page
    cursor: usize,
}

impl RecordHeap {
    /// Wrap a page manager with an empty write cursor.
    ///
    /// The first write allocates a fresh page.
    pub fn create(manager: PageManager) -> Self {
        Self {
            manager,
            active_page: None,
            cursor: 0,
        }
    }

    /// Wrap a page manager, resuming writes after the last record of its last page
    pub fn open(manager: PageManager) -> Result<Self> {
        let mut heap = Self::create(manager);
        if let Some(last) = heap.manager.page_count().checked_sub(1) {
            let page_id = PageId::new(last);
            heap.cursor = heap.walk_page(page_id)?.end;
            heap.active_page = Some(page_id);
            debug!(page = %page_id, cursor = heap.cursor, "resumed heap");
        }
        Ok(heap)
    }

    /// Number of pages in the heap file
    pub fn page_count(&self) -> u32 {
        self.manager.page_count()
    }

    /// Page cache capacity of the heap file
    pub fn capacity(&self) -> usize {
        self.manager.capacity()
    }

    /// Append a record, returning where it was written
    pub fn write(&mut self, data: &[u8]) -> Result<Location> {
        if data.is_empty() {
            return Err(StorageError::invalid_operation("cannot store an empty record"));
        }
        if data.len() > MAX_RECORD_SIZE {
            return Err(StorageError::RecordTooLarge {
                size: data.len(),
                max: MAX_RECORD_SIZE,
            });
        }

        let needed = RECORD_PREFIX_SIZE + data.len();
        let page_id = match self.active_page {
            Some(page_id) if self.cursor + needed <= PAGE_SIZE => page_id,
            _ => self.roll_over()?,
        };

        let offset = self.cursor;
        let page = self.manager.get_page_mut(page_id)?;
        page.write_u32(offset, RecordPrefix::Live(data.len() as u32).encode());
        page[offset + RECORD_PREFIX_SIZE..offset + needed].copy_from_slice(data);
        self.cursor += needed;

        Ok(Location::new(page_id, offset as u32))
    }

    fn roll_over(&mut self) -> Result<PageId> {
        let page_id = self.manager.allocate_page()?;
        debug!(
            previous = ?self.active_page,
            page = %page_id,
            "heap rolled over to a new page"
        );
        self.active_page = Some(page_id);
        self.cursor = 0;
        Ok(page_id)
    }

    /// Validated payload length of the live record at `location`
    fn record_len(&mut self, location: Location) -> Result<usize> {
        let Location { page_id, offset } = location;
        let start = offset as usize;
        if start + RECORD_PREFIX_SIZE > PAGE_SIZE {
            return Err(StorageError::InvalidRecord {
                page_id,
                offset,
                length: 0,
            });
        }

        let raw = self.manager.get_page(page_id)?.read_u32(start);
        match RecordPrefix::decode(raw) {
            RecordPrefix::Deleted(_) => Err(StorageError::RecordDeleted { page_id, offset }),
            RecordPrefix::Live(len) if fits_in_page(start, len as usize) => Ok(len as usize),
            _ => Err(StorageError::InvalidRecord {
                page_id,
                offset,
                length: raw,
            }),
        }
    }

    /// Copy the record at `location` into `out`, returning its length.
    ///
    /// Fails with `BufferTooSmall` (reporting the required size) without
    /// copying anything if `out` is shorter than the record.
    pub fn read(&mut self, location: Location, out: &mut [u8]) -> Result<usize> {
        let len = self.record_len(location)?;
        if out.len() < len {
            return Err(StorageError::BufferTooSmall {
                required: len,
                available: out.len(),
            });
        }

        let start = location.offset as usize + RECORD_PREFIX_SIZE;
        let page = self.manager.get_page(location.page_id)?;
        out[..len].copy_from_slice(&page[start..start + len]);
        Ok(len)
    }

    /// Read the record at `location` into a new buffer
    pub fn read_to_vec(&mut self, location: Location) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.record_len(location)?];
        self.read(location, &mut out)?;
        Ok(out)
    }

    /// Tombstone the record at `location`; its bytes stay in place
    pub fn delete(&mut self, location: Location) -> Result<()> {
        let len = self.record_len(location)?;
        let page = self.manager.get_page_mut(location.page_id)?;
        page.write_u32(
            location.offset as usize,
            RecordPrefix::Deleted(len as u32).encode(),
        );
        trace!(location = %location, "tombstoned record");
        Ok(())
    }

    fn walk_page(&mut self, page_id: PageId) -> Result<PageWalk> {
        let page = self.manager.get_page(page_id)?;
        let mut walk = PageWalk::default();

        while walk.end + RECORD_PREFIX_SIZE <= PAGE_SIZE {
            let prefix = RecordPrefix::decode(page.read_u32(walk.end));
            let len = prefix.payload_len();
            match prefix {
                RecordPrefix::End => break,
                _ if !fits_in_page(walk.end, len) => {
                    return Err(StorageError::corrupt_file(format!(
                        "heap page {}: record at offset {} overruns the page",
                        page_id, walk.end
                    )));
                }
                RecordPrefix::Live(_) => {
                    walk.live += 1;
                    walk.live_bytes += len;
                }
                RecordPrefix::Deleted(_) => walk.deleted += 1,
            }
            walk.end += RECORD_PREFIX_SIZE + len;
        }

        Ok(walk)
    }

    /// Walk every heap page and count live and deleted records
    pub fn stats(&mut self) -> Result<HeapStats> {
        let mut stats = HeapStats {
            pages: self.manager.page_count(),
            ..HeapStats::default()
        };
        for n in 0..stats.pages {
            let walk = self.walk_page(PageId::new(n))?;
            stats.live_records += walk.live;
            stats.deleted_records += walk.deleted;
            stats.live_bytes += walk.live_bytes;
        }
        Ok(stats)
    }

    /// Flush every cached heap page
    pub fn flush(&mut self) -> Result<()> {
        self.manager.flush_all()
    }

    /// Flush and release the heap file
    pub fn close(self) -> Result<()> {
        self.manager.close()
    }
}
