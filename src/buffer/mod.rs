//! Page cache: the page manager every higher layer routes its bytes through.
//!
//! The cache is bounded and never evicts; callers borrow page buffers from
//! the manager for the duration of a single call.

mod manager;

pub use manager::PageManager;
