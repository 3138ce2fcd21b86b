//! Storage layer: disk I/O for page files.
//!
//! This module provides the abstraction for reading and writing whole pages
//! of a flat file. Files carry no header: page `n` lives at byte
//! `n * PAGE_SIZE`.

mod disk_manager;

pub use disk_manager::{DiskManager, DiskManagerImpl};
