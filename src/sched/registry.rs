use crate::error::{SimError, SimResult};
use crate::memory::block::ProcessId;
use crate::sched::process::{Process, ProcessSpec, ProcessState};
use std::collections::BTreeMap;

/// Owner of every process ever admitted, plus the waiting queue and finished list.
///
/// The queue and finished list store ids only; the record in `processes` is the single
/// source of truth.
#[derive(Debug)]
pub struct Registry {
    processes: BTreeMap<ProcessId, Process>,
    waiting: Vec<ProcessId>,
    /// Completion order, oldest first.
    finished: Vec<ProcessId>,
    next_id: ProcessId,
}

impl Registry {
    pub fn new() -> Self {
        Registry {
            processes: BTreeMap::new(),
            waiting: Vec::new(),
            finished: Vec::new(),
            next_id: 1,
        }
    }

    /// Record a validated spec as a new waiting process.
    pub fn admit(&mut self, spec: &ProcessSpec, tick: u64) -> ProcessId {
        let id = self.next_id;
        self.next_id += 1;
        self.processes.insert(id, Process::from_spec(id, spec, tick));
        self.waiting.push(id);
        id
    }

    pub fn get(&self, id: ProcessId) -> Option<&Process> {
        self.processes.get(&id)
    }

    pub(crate) fn get_mut(&mut self, id: ProcessId) -> SimResult<&mut Process> {
        self.processes
            .get_mut(&id)
            .ok_or_else(|| SimError::Integrity(format!("process P{} is not registered", id)))
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }

    /// Waiting processes by priority descending, then arrival (id) ascending.
    pub fn admission_order(&self) -> Vec<ProcessId> {
        let mut order: Vec<&Process> = self
            .waiting
            .iter()
            .filter_map(|id| self.processes.get(id))
            .collect();
        order.sort_by(|a, b| b.priority.cmp(&a.priority).then(a.id.cmp(&b.id)));
        order.into_iter().map(|p| p.id).collect()
    }

    /// Placed processes in id order.
    pub fn placed(&self) -> Vec<ProcessId> {
        self.processes
            .values()
            .filter(|p| p.state() == ProcessState::Placed)
            .map(|p| p.id)
            .collect()
    }

    /// Finished processes, most recent first.
    pub fn finished(&self) -> Vec<ProcessId> {
        self.finished.iter().rev().copied().collect()
    }

    pub fn all(&self) -> impl Iterator<Item = &Process> {
        self.processes.values()
    }

    /// Move a process out of the waiting queue. The caller records the placement.
    pub(crate) fn dequeue(&mut self, id: ProcessId) {
        self.waiting.retain(|&w| w != id);
    }

    pub(crate) fn record_finished(&mut self, id: ProcessId) {
        if !self.finished.contains(&id) {
            self.finished.push(id);
        }
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
