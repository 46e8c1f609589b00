use crate::error::{SimError, SimResult};
use crate::memory::block::{BlockId, ProcessId, RegionTag};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lifecycle: `Waiting -> Placed -> Finished`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessState {
    Waiting,
    Placed,
    Finished,
}

/// Unvalidated process input as it arrives from a form, CSV row or request body.
///
/// Numbers are signed so that negative input is reported instead of wrapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessSpec {
    pub name: String,
    pub priority: i64,
    pub burst: i64,
    pub size: i64,
}

impl ProcessSpec {
    pub fn new(name: impl Into<String>, priority: i64, burst: i64, size: i64) -> Self {
        ProcessSpec {
            name: name.into(),
            priority,
            burst,
            size,
        }
    }

    /// Reject empty names and non-positive numbers.
    pub fn validate(&self) -> SimResult<()> {
        if self.name.trim().is_empty() {
            return Err(SimError::Validation("name must not be empty".to_string()));
        }
        let positive = |field: &str, value: i64, max: i64| {
            if value < 1 || value > max {
                Err(SimError::Validation(format!(
                    "{} must be between 1 and {}, got {}",
                    field, max, value
                )))
            } else {
                Ok(())
            }
        };
        positive("priority", self.priority, u32::MAX as i64)?;
        positive("burst", self.burst, u32::MAX as i64)?;
        positive("size", self.size, i64::MAX)?;
        Ok(())
    }
}

/// The canonical record of one process. Only the registry hands out `&mut`.
#[derive(Debug, Clone)]
pub struct Process {
    pub id: ProcessId,
    pub name: String,
    /// Higher is more urgent.
    pub priority: u32,
    /// Requested KB.
    pub size: usize,
    pub burst: u32,
    remaining: u32,
    state: ProcessState,
    /// At most one entry: a process occupies exactly one region.
    placements: BTreeMap<RegionTag, BlockId>,
    pub arrived_at: u64,
    pub finished_at: Option<u64>,
}

impl Process {
    /// Build from a spec that already passed [`ProcessSpec::validate`].
    pub(crate) fn from_spec(id: ProcessId, spec: &ProcessSpec, tick: u64) -> Self {
        let burst = spec.burst as u32;
        Process {
            id,
            name: spec.name.trim().to_string(),
            priority: spec.priority as u32,
            size: spec.size as usize,
            burst,
            remaining: burst,
            state: ProcessState::Waiting,
            placements: BTreeMap::new(),
            arrived_at: tick,
            finished_at: None,
        }
    }

    pub fn remaining(&self) -> u32 {
        self.remaining
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    /// Region and block currently held, if placed.
    pub fn placement(&self) -> Option<(RegionTag, BlockId)> {
        self.placements.iter().next().map(|(&tag, &id)| (tag, id))
    }

    pub(crate) fn mark_placed(&mut self, tag: RegionTag, block: BlockId) {
        self.placements.clear();
        self.placements.insert(tag, block);
        self.state = ProcessState::Placed;
    }

    /// One unit of work. Returns true once nothing is left.
    pub(crate) fn run_one(&mut self) -> bool {
        self.remaining = self.remaining.saturating_sub(1);
        self.remaining == 0
    }

    pub(crate) fn mark_finished(&mut self, tick: u64) {
        self.placements.clear();
        self.state = ProcessState::Finished;
        self.finished_at = Some(tick);
    }

    pub fn view(&self) -> ProcessView {
        let placement = self.placement();
        ProcessView {
            id: self.id,
            name: self.name.clone(),
            priority: self.priority,
            size: self.size,
            burst: self.burst,
            remaining: self.remaining,
            state: self.state,
            region: placement.map(|(tag, _)| tag),
            block: placement.map(|(_, id)| id),
            arrived_at: self.arrived_at,
            finished_at: self.finished_at,
        }
    }
}

/// Detached, read-only copy of a process for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessView {
    pub id: ProcessId,
    pub name: String,
    pub priority: u32,
    pub size: usize,
    pub burst: u32,
    pub remaining: u32,
    pub state: ProcessState,
    pub region: Option<RegionTag>,
    pub block: Option<BlockId>,
    pub arrived_at: u64,
    pub finished_at: Option<u64>,
}
