//! Disk manager implementation.
//!
//! The disk manager is responsible for reading and writing pages to one
//! backing file. It abstracts the file I/O operations behind a trait
//! so that the page manager can be tested with mock implementations.

use crate::error::{Result, StorageError};
use crate::page::PageBuf;
use crate::types::{PageId, PAGE_SIZE};
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::debug;

/// Trait for disk I/O operations
///
/// This abstraction allows swapping the storage backend or mocking for tests.
pub trait DiskManager: Send {
    /// Read a page from disk; pages past the end of the file read as zeros
    fn read_page(&mut self, page_id: PageId, buf: &mut PageBuf) -> Result<()>;

    /// Write a page to its offset, growing the file if needed
    fn write_page(&mut self, page_id: PageId, data: &PageBuf) -> Result<()>;

    /// Number of whole pages currently in the file
    fn page_count(&self) -> u32;

    /// Force written data to durable storage
    fn sync(&mut self) -> Result<()>;
}

/// File-based disk manager implementation
pub struct DiskManagerImpl {
    /// The backing file
    file: File,
    /// Current file length in bytes
    len: u64,
    /// Whether to sync on each write
    sync_on_write: bool,
}

impl DiskManagerImpl {
    /// Open or create a page file.
    ///
    /// Fails with `CorruptFile` if the file length is not a multiple of the
    /// page size.
    pub fn open(path: &Path, sync_on_write: bool) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;

        let len = file.metadata()?.len();
        if len % PAGE_SIZE as u64 != 0 {
            return Err(StorageError::corrupt_file(format!(
                "{}: length {} is not a multiple of the page size {}",
                path.display(),
                len,
                PAGE_SIZE
            )));
        }

        debug!(path = %path.display(), pages = len / PAGE_SIZE as u64, "opened page file");

        Ok(Self {
            file,
            len,
            sync_on_write,
        })
    }
}

impl DiskManager for DiskManagerImpl {
    fn read_page(&mut self, page_id: PageId, buf: &mut PageBuf) -> Result<()> {
        let offset = page_id.file_offset(PAGE_SIZE);
        if offset >= self.len {
            buf.fill(0);
            return Ok(());
        }

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(buf.as_bytes_mut())?;
        Ok(())
    }

    fn write_page(&mut self, page_id: PageId, data: &PageBuf) -> Result<()> {
        let offset = page_id.file_offset(PAGE_SIZE);

        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(data.as_bytes())?;
        self.len = self.len.max(offset + PAGE_SIZE as u64);

        if self.sync_on_write {
            self.file.sync_data()?;
        }

        Ok(())
    }

    fn page_count(&self) -> u32 {
        (self.len / PAGE_SIZE as u64) as u32
    }

    fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }
}
