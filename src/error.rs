//! Error types for the storage engine.

use thiserror::Error;
use crate::types::PageId;

/// Result type alias for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur in the storage engine
#[derive(Error, Debug)]
pub enum StorageError {
    /// I/O error from the underlying file system
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Key is not present in the index
    #[error("Key not found")]
    KeyNotFound,

    /// Key is already present in the index
    #[error("Duplicate key: {0}")]
    DuplicateKey(u32),

    /// Every page slot of the cache is in use
    #[error("Page cache exhausted: all {capacity} page slots are in use")]
    PageCacheExhausted { capacity: usize },

    /// Page number lies beyond what the cache can ever hold
    #[error("Page {page_id} is out of range (cache capacity: {capacity})")]
    PageOutOfRange { page_id: PageId, capacity: usize },

    /// Requested page was never allocated
    #[error("Page {0} not found")]
    PageNotFound(PageId),

    /// Backing file is not a whole number of pages, or its contents are inconsistent
    #[error("Corrupt file: {0}")]
    CorruptFile(String),

    /// Caller-supplied buffer cannot hold the record
    #[error("Buffer too small: record needs {required} bytes, buffer holds {available}")]
    BufferTooSmall { required: usize, available: usize },

    /// Record at this location has been tombstoned
    #[error("Record at page {page_id} offset {offset} has been deleted")]
    RecordDeleted { page_id: PageId, offset: u32 },

    /// Length prefix at this location does not describe a valid record
    #[error("Invalid record at page {page_id} offset {offset}: length {length}")]
    InvalidRecord {
        page_id: PageId,
        offset: u32,
        length: u32,
    },

    /// Payload cannot fit in a single heap page
    #[error("Record too large: {size} bytes (max: {max})")]
    RecordTooLarge { size: usize, max: usize },

    /// Invalid page format or type
    #[error("Invalid page: {0}")]
    InvalidPage(String),

    /// Invalid operation for the current state
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

impl StorageError {
    /// Create a corrupt file error with a message
    pub fn corrupt_file(msg: impl Into<String>) -> Self {
        Self::CorruptFile(msg.into())
    }

    /// Create an invalid page error
    pub fn invalid_page(msg: impl Into<String>) -> Self {
        Self::InvalidPage(msg.into())
    }

    /// Create an invalid operation error
    pub fn invalid_operation(msg: impl Into<String>) -> Self {
        Self::InvalidOperation(msg.into())
    }

    /// Whether this error only reports a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound)
    }
}
