//! Opaque handles identifying nodes and blocks.
//!
//! A node owns the block it instantiates, and a block's member list refers
//! back to nodes — modeling that cycle with owned references is awkward in
//! safe Rust, so both sides are plain `Copy` integers and the actual
//! node/block storage lives wherever the caller keeps it (a `Vec`, a
//! `slotmap`, a database row — this crate is agnostic).

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a node in a pangenome graph: an instantiation of some block
/// along a particular path, oriented and placed among its neighbors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub u64);

impl NodeId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node:{}", self.0)
    }
}

/// Identifies a block: a compressed multi-genome alignment record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u64);

impl BlockId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "block:{}", self.0)
    }
}

/// Issues fresh, process-unique `BlockId`s for blocks born of slicing,
/// concatenation, or combine — so callers never have to thread a counter
/// through those operations by hand.
#[derive(Debug, Default)]
pub struct Arena {
    next_block: AtomicU64,
}

impl Arena {
    pub fn new() -> Self {
        Self {
            next_block: AtomicU64::new(0),
        }
    }

    /// Allocate the next `BlockId` in sequence. Safe to call from multiple
    /// threads concurrently; ids are never reused.
    pub fn next_block_id(&self) -> BlockId {
        BlockId(self.next_block.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn arena_issues_distinct_increasing_ids() {
        let arena = Arena::new();
        let a = arena.next_block_id();
        let b = arena.next_block_id();
        let c = arena.next_block_id();
        assert_eq!(a, BlockId(0));
        assert_eq!(b, BlockId(1));
        assert_eq!(c, BlockId(2));
    }

    #[test]
    fn ids_display_with_kind_prefix() {
        assert_eq!(NodeId(7).to_string(), "node:7");
        assert_eq!(BlockId(7).to_string(), "block:7");
    }
}
