use crate::memory::{block::ProcessId, ledger::Ledger};
use serde::{Deserialize, Serialize};

/// Fragmentation figures for one region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryStats {
    pub total: usize,
    pub used: usize,
    pub free_total: usize,
    pub free_blocks: usize,
    pub largest_free: usize,
    /// Share of free space not in the largest free block, 0..=100.
    pub external_fragmentation_pct: f64,
    /// Slack inside occupied fixed partitions, in KB.
    pub internal_fragmentation: usize,
}

impl MemoryStats {
    /// `requested_of` maps an occupant to the KB it actually asked for.
    pub fn collect(ledger: &Ledger, requested_of: impl Fn(ProcessId) -> Option<usize>) -> Self {
        let mut free_total = 0;
        let mut free_blocks = 0;
        let mut largest_free = 0;
        let mut internal_fragmentation = 0;

        for block in ledger.blocks() {
            match block.occupant {
                None => {
                    free_total += block.size;
                    free_blocks += 1;
                    largest_free = largest_free.max(block.size);
                }
                Some(pid) => {
                    let requested = requested_of(pid).unwrap_or(block.size);
                    internal_fragmentation += block.size.saturating_sub(requested);
                }
            }
        }

        let external_fragmentation_pct = if free_total == 0 {
            0.0
        } else {
            (1.0 - largest_free as f64 / free_total as f64) * 100.0
        };

        MemoryStats {
            total: ledger.total_size(),
            used: ledger.total_size() - free_total,
            free_total,
            free_blocks,
            largest_free,
            external_fragmentation_pct,
            internal_fragmentation,
        }
    }

    /// Free space is split over more than one hole.
    pub fn is_fragmented(&self) -> bool {
        self.free_blocks > 1
    }
}
