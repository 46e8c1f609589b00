use crate::memory::block::MemoryBlock;
use crate::memory::ledger::Ledger;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// What a compaction request did to one region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum DefragOutcome {
    /// Allocated blocks were packed to address 0 and the free space merged at the tail.
    Compacted { relocated: usize, free_size: usize },
    /// No free block, or a single free block already at the tail.
    AlreadyCompact,
    /// Fixed partitions never move.
    FixedLayout,
}

impl Ledger {
    /// True when there is no free block, or exactly one and it ends the region.
    pub fn is_compact(&self) -> bool {
        let mut free = self.free_blocks();
        match (free.next(), free.next()) {
            (None, _) => true,
            (Some(only), None) => only.end() == self.total_size(),
            _ => false,
        }
    }

    /// Slide every allocated block down to the low end, keeping their relative order,
    /// and replace all free space with one trailing free block.
    pub fn compact(&mut self) -> DefragOutcome {
        if !self.is_dynamic() {
            return DefragOutcome::FixedLayout;
        }
        if self.is_compact() {
            debug!("region already compact");
            return DefragOutcome::AlreadyCompact;
        }

        let free_size: usize = self.free_blocks().map(|b| b.size).sum();
        let mut packed: Vec<MemoryBlock> = Vec::with_capacity(self.len());
        let mut relocated = 0;
        let mut cursor = 0;

        for block in self.blocks().iter().filter(|b| !b.is_free()) {
            let mut moved = block.clone();
            if moved.start != cursor {
                relocated += 1;
            }
            moved.start = cursor;
            cursor += moved.size;
            packed.push(moved);
        }

        if free_size > 0 {
            let id = self.next_id();
            packed.push(MemoryBlock::free(id, cursor, free_size));
        }

        self.replace_blocks(packed);
        info!(relocated, free_size, "compacted region");
        DefragOutcome::Compacted {
            relocated,
            free_size,
        }
    }
}
