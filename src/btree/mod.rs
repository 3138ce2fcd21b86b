//! B-tree implementation.
//!
//! This module provides a disk-based B-tree mapping `u32` keys to opaque
//! `u64` locations. It supports:
//! - Point lookups (find)
//! - Insertions with leaf and internal node splits (insert)
//! - Deletions without rebalancing (delete)
//! - Range scans

mod tree;

pub use tree::BTree;
