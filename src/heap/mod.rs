//! Record heap: variable-length payloads packed into pages.
//!
//! Each record is addressed by a [`Location`](crate::types::Location), the
//! page it lives in and its byte offset there.

mod record;
mod record_heap;

pub use record::{RecordPrefix, TOMBSTONE_FLAG};
pub use record_heap::{HeapStats, RecordHeap};
