use crate::error::{SimError, SimResult};
use crate::memory::block::{BlockId, MemoryBlock, ProcessId};
use crate::memory::ledger::Ledger;
use tracing::debug;

impl Ledger {
    /// Hand the block at `idx` to process `pid` needing `size` KB.
    ///
    /// Dynamic regions shrink the block to exactly `size` and insert the remainder as a
    /// free block right after it. Fixed partitions keep their size; the excess is
    /// internal fragmentation. Returns the id of the occupied block.
    pub fn place(&mut self, idx: usize, pid: ProcessId, size: usize) -> SimResult<BlockId> {
        let block = self.get(idx).ok_or_else(|| {
            SimError::Integrity(format!("no block at index {} to place P{}", idx, pid))
        })?;
        if !block.is_free() {
            return Err(SimError::Integrity(format!(
                "block b{} is already held by P{}",
                block.id,
                block.occupant.unwrap_or_default()
            )));
        }
        if size == 0 || block.size < size {
            return Err(SimError::Integrity(format!(
                "block b{} ({}KB) cannot hold {}KB",
                block.id, block.size, size
            )));
        }

        let (block_id, start, original) = (block.id, block.start, block.size);
        let remaining = original - size;

        if self.is_dynamic() && remaining > 0 {
            let hole_id = self.next_id();
            self.insert(idx + 1, MemoryBlock::free(hole_id, start + size, remaining));
            self.block_mut(idx).size = size;
            debug!(block = block_id, hole = hole_id, remaining, "split block");
        }
        self.block_mut(idx).occupant = Some(pid);
        debug!(pid, block = block_id, size, original, "placed process");
        Ok(block_id)
    }

    /// Free the block `id` held by `pid` and, in dynamic regions, merge it with free
    /// neighbours. Returns the id of the free block that now covers the released span.
    ///
    /// Nothing is modified unless the block exists and is held by `pid`.
    pub fn release(&mut self, id: BlockId, pid: ProcessId) -> SimResult<BlockId> {
        let idx = self.index_of(id).ok_or_else(|| {
            SimError::Integrity(format!("block b{} for P{} not found", id, pid))
        })?;
        let occupant = self.blocks()[idx].occupant;
        if occupant != Some(pid) {
            return Err(SimError::Integrity(format!(
                "block b{} is held by {:?}, not P{}",
                id, occupant, pid
            )));
        }

        self.block_mut(idx).occupant = None;
        debug!(pid, block = id, "released block");
        if self.is_dynamic() {
            Ok(self.coalesce(idx))
        } else {
            Ok(id)
        }
    }

    /// Merge the free block at `idx` with a free successor, then with a free predecessor.
    fn coalesce(&mut self, idx: usize) -> BlockId {
        let mut survivor = self.blocks()[idx].id;

        if idx + 1 < self.len() && self.blocks()[idx + 1].is_free() {
            let next = self.remove(idx + 1);
            self.block_mut(idx).size += next.size;
            debug!(block = survivor, merged = next.id, "merged with next block");
        }

        if idx > 0 && self.blocks()[idx - 1].is_free() {
            let current = self.remove(idx);
            let prev = self.block_mut(idx - 1);
            prev.size += current.size;
            survivor = prev.id;
            debug!(block = survivor, merged = current.id, "merged with previous block");
        }

        survivor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coalesce_keeps_previous_block_id() {
        let mut ledger = Ledger::dynamic(300);
        let a = ledger.place(0, 1, 100).unwrap();
        let b = ledger.place(1, 2, 100).unwrap();
        let c = ledger.place(2, 3, 100).unwrap();

        ledger.release(a, 1).unwrap();
        ledger.release(c, 3).unwrap();
        let survivor = ledger.release(b, 2).unwrap();

        assert_eq!(survivor, a);
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.blocks()[0].size, 300);
        ledger.check_invariants().unwrap();
    }

    #[test]
    fn test_coalesce_with_next_only() {
        let mut ledger = Ledger::dynamic(200);
        let a = ledger.place(0, 1, 50).unwrap();
        let survivor = ledger.release(a, 1).unwrap();
        assert_eq!(survivor, a);
        assert_eq!(ledger.blocks(), &[MemoryBlock::free(a, 0, 200)]);
    }
}
