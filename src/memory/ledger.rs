use crate::error::{SimError, SimResult};
use crate::memory::block::{BlockId, MemoryBlock, ProcessId};
use serde::{Deserialize, Serialize};

/// How a region is carved into blocks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// One free block initially; blocks split on placement and coalesce on release.
    Dynamic,
    /// Fixed partitions of the given sizes, laid out in order. They never change.
    Fixed(Vec<usize>),
}

/// Address-ordered sequence of blocks covering `[0, total)`.
///
/// Every operation leaves the ledger satisfying [`Ledger::check_invariants`].
#[derive(Debug, Clone)]
pub struct Ledger {
    layout: Layout,
    total: usize,
    blocks: Vec<MemoryBlock>,
    next_block_id: BlockId,
}

impl Ledger {
    /// A dynamic region starting as one free block of `total` KB.
    pub fn dynamic(total: usize) -> Self {
        let mut ledger = Ledger {
            layout: Layout::Dynamic,
            total,
            blocks: Vec::new(),
            next_block_id: 1,
        };
        ledger.clear();
        ledger
    }

    /// A region made of fixed partitions, in the given address order.
    pub fn partitioned(sizes: &[usize]) -> SimResult<Self> {
        if sizes.is_empty() || sizes.contains(&0) {
            return Err(SimError::Validation(format!(
                "static partitions must be non-empty and at least 1KB each, got {:?}",
                sizes
            )));
        }
        let mut ledger = Ledger {
            layout: Layout::Fixed(sizes.to_vec()),
            total: sizes.iter().sum(),
            blocks: Vec::new(),
            next_block_id: 1,
        };
        ledger.clear();
        Ok(ledger)
    }

    /// Drop every allocation and restore the initial layout. Block ids restart at 1.
    pub fn clear(&mut self) {
        self.blocks.clear();
        self.next_block_id = 1;
        match self.layout.clone() {
            Layout::Dynamic => {
                if self.total > 0 {
                    let id = self.next_id();
                    self.blocks.push(MemoryBlock::free(id, 0, self.total));
                }
            }
            Layout::Fixed(sizes) => {
                let mut start = 0;
                for size in sizes {
                    let id = self.next_id();
                    self.blocks.push(MemoryBlock::free(id, start, size));
                    start += size;
                }
            }
        }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn is_dynamic(&self) -> bool {
        self.layout == Layout::Dynamic
    }

    pub fn total_size(&self) -> usize {
        self.total
    }

    /// Largest request this region could ever satisfy.
    pub fn capacity(&self) -> usize {
        match &self.layout {
            Layout::Dynamic => self.total,
            Layout::Fixed(sizes) => sizes.iter().copied().max().unwrap_or(0),
        }
    }

    pub fn blocks(&self) -> &[MemoryBlock] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn get(&self, idx: usize) -> Option<&MemoryBlock> {
        self.blocks.get(idx)
    }

    /// Current index of a block. Indices shift on every insert/remove, so
    /// callers re-derive them by id instead of holding on to one.
    pub fn index_of(&self, id: BlockId) -> Option<usize> {
        self.blocks.iter().position(|b| b.id == id)
    }

    pub fn block_of(&self, pid: ProcessId) -> Option<&MemoryBlock> {
        self.blocks.iter().find(|b| b.occupant == Some(pid))
    }

    /// Occupants in ascending address order.
    pub fn occupants(&self) -> Vec<ProcessId> {
        self.blocks.iter().filter_map(|b| b.occupant).collect()
    }

    pub fn free_blocks(&self) -> impl Iterator<Item = &MemoryBlock> {
        self.blocks.iter().filter(|b| b.is_free())
    }

    pub(crate) fn next_id(&mut self) -> BlockId {
        let id = self.next_block_id;
        self.next_block_id += 1;
        id
    }

    pub(crate) fn block_mut(&mut self, idx: usize) -> &mut MemoryBlock {
        &mut self.blocks[idx]
    }

    pub(crate) fn insert(&mut self, idx: usize, block: MemoryBlock) {
        self.blocks.insert(idx, block);
    }

    pub(crate) fn remove(&mut self, idx: usize) -> MemoryBlock {
        self.blocks.remove(idx)
    }

    pub(crate) fn replace_blocks(&mut self, blocks: Vec<MemoryBlock>) {
        self.blocks = blocks;
    }

    /// Verify coverage, ordering and (for dynamic regions) the coalescing rule.
    pub fn check_invariants(&self) -> SimResult<()> {
        let mut expected_start = 0;
        for (i, block) in self.blocks.iter().enumerate() {
            if block.size == 0 {
                return Err(SimError::Integrity(format!("block b{} has zero size", block.id)));
            }
            if block.start != expected_start {
                return Err(SimError::Integrity(format!(
                    "block b{} starts at {} but previous block ends at {}",
                    block.id, block.start, expected_start
                )));
            }
            expected_start = block.end();

            if self.is_dynamic() && i > 0 && block.is_free() && self.blocks[i - 1].is_free() {
                return Err(SimError::Integrity(format!(
                    "adjacent free blocks b{} and b{} were not coalesced",
                    self.blocks[i - 1].id,
                    block.id
                )));
            }
        }
        if expected_start != self.total {
            return Err(SimError::Integrity(format!(
                "blocks cover {}KB of a {}KB region",
                expected_start, self.total
            )));
        }
        if let Layout::Fixed(sizes) = &self.layout {
            let current: Vec<usize> = self.blocks.iter().map(|b| b.size).collect();
            if &current != sizes {
                return Err(SimError::Integrity(
                    "fixed partitions changed size".to_string(),
                ));
            }
        }
        Ok(())
    }
}
