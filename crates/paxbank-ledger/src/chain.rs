//! The hash-linked block chain.

use paxbank_types::{Block, Transfer};

use crate::hash::GENESIS_HASH;

/// Ordered sequence of blocks indexed `0..depth`.
///
/// The link invariant (`blocks[i].value.prev_hash == blocks[i-1].value.hash`
/// for `i > 0`, and `blocks[0].value.prev_hash == "0"`) is the caller's to
/// uphold when composing values; the chain itself only tracks depth and the
/// tail hash.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Chain {
    blocks: Vec<Block>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restores a chain from persisted blocks.
    pub fn from_blocks(blocks: Vec<Block>) -> Self {
        Self { blocks }
    }

    /// Current chain length; also the next free slot number.
    pub fn depth(&self) -> u64 {
        self.blocks.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Hash of the last block, or `"0"` for an empty chain.
    pub fn prev_hash(&self) -> String {
        self.blocks
            .last()
            .map(|block| block.value.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string())
    }

    pub fn get(&self, depth: u64) -> Option<&Block> {
        self.blocks.get(depth as usize)
    }

    /// Appends a block at the next slot.
    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Promotes the block at `depth` to COMMITTED. Returns false when no
    /// block exists there.
    pub fn promote(&mut self, depth: u64) -> bool {
        match self.blocks.get_mut(depth as usize) {
            Some(block) => {
                block.promote();
                true
            }
            None => false,
        }
    }

    /// Replaces the block at `depth`. Used when a decided value supersedes a
    /// tentative one accepted under a lower ballot.
    pub fn replace(&mut self, depth: u64, block: Block) -> bool {
        match self.blocks.get_mut(depth as usize) {
            Some(slot) => {
                *slot = block;
                true
            }
            None => false,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    /// True when `value.prev_hash` links to the current tail.
    pub fn links_to_tail(&self, value: &Transfer) -> bool {
        value.prev_hash == self.prev_hash()
    }
}
