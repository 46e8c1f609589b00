use serde::{Deserialize, Serialize};
use std::fmt;

pub type BlockId = u64;

pub type ProcessId = u64;

/// Which region of simulated memory a block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionTag {
    /// Predeclared fixed-size partitions.
    Static,
    /// Variable partitioning; blocks split and merge.
    Dynamic,
}

impl fmt::Display for RegionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionTag::Static => write!(f, "static"),
            RegionTag::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A contiguous span of a region, either free or held by one process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemoryBlock {
    pub id: BlockId,
    /// First address covered, in KB.
    pub start: usize,
    /// Length in KB, always > 0.
    pub size: usize,
    /// Present iff the block is allocated.
    pub occupant: Option<ProcessId>,
}

impl MemoryBlock {
    pub fn free(id: BlockId, start: usize, size: usize) -> Self {
        MemoryBlock {
            id,
            start,
            size,
            occupant: None,
        }
    }

    pub fn is_free(&self) -> bool {
        self.occupant.is_none()
    }

    /// One past the last address covered.
    pub fn end(&self) -> usize {
        self.start + self.size
    }
}

impl fmt::Display for MemoryBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.occupant {
            Some(pid) => write!(f, "b{} [{}..{}) P{}", self.id, self.start, self.end(), pid),
            None => write!(f, "b{} [{}..{}) free", self.id, self.start, self.end()),
        }
    }
}
