use crate::config::Config;
use crate::error::{SimError, SimResult};
use crate::memory::{
    block::{ProcessId, RegionTag},
    defrag::DefragOutcome,
    fit::FitStrategy,
    ledger::Ledger,
};
use crate::sched::{
    process::{ProcessSpec, ProcessState},
    registry::Registry,
    snapshot::Snapshot,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};

/// Outcome of one clock tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickReport {
    /// Clock value after this tick.
    pub tick: u64,
    /// Processes that finished and released their blocks, in address order.
    pub completed: Vec<ProcessId>,
    /// Processes admitted by the pass that closed the tick.
    pub placed: Vec<ProcessId>,
    /// Still waiting, in admission order.
    pub still_waiting: Vec<ProcessId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefragReport {
    pub regions: Vec<(RegionTag, DefragOutcome)>,
}

impl DefragReport {
    /// True if at least one region was actually rearranged.
    pub fn changed(&self) -> bool {
        self.regions
            .iter()
            .any(|(_, o)| matches!(o, DefragOutcome::Compacted { .. }))
    }
}

/// The whole simulated machine: regions, processes, strategy and clock.
///
/// Entry points take `&mut self` and run to completion, so there is exactly one writer
/// at a time. A caller that shares a `Simulation` across tasks wraps it in a lock.
#[derive(Debug)]
pub struct Simulation {
    /// Iteration order (static before dynamic) is the order regions are tried in.
    regions: BTreeMap<RegionTag, Ledger>,
    registry: Registry,
    strategy: FitStrategy,
    initial_strategy: FitStrategy,
    running: bool,
    clock: u64,
}

impl Simulation {
    /// Build the regions described by `config`. Fails if there is no memory at all or a
    /// partition is empty.
    pub fn new(config: &Config) -> SimResult<Self> {
        let mut regions = BTreeMap::new();
        if !config.static_partitions_kb.is_empty() {
            regions.insert(
                RegionTag::Static,
                Ledger::partitioned(&config.static_partitions_kb)?,
            );
        }
        if config.total_memory_kb > 0 {
            regions.insert(RegionTag::Dynamic, Ledger::dynamic(config.total_memory_kb));
        }
        if regions.is_empty() {
            return Err(SimError::Validation(
                "no memory configured: need a dynamic region or static partitions".to_string(),
            ));
        }
        info!(
            dynamic_kb = config.total_memory_kb,
            partitions = config.static_partitions_kb.len(),
            strategy = %config.strategy,
            "initialized simulation"
        );
        Ok(Simulation {
            regions,
            registry: Registry::new(),
            strategy: config.strategy,
            initial_strategy: config.strategy,
            running: false,
            clock: 0,
        })
    }

    /// Pure dynamic layout of `total` KB using first-fit.
    pub fn with_memory(total: usize) -> SimResult<Self> {
        Self::new(&Config::with_memory(total))
    }

    /// Back to the initial layout: empty registry, clock 0, stopped.
    pub fn reset(&mut self) {
        for ledger in self.regions.values_mut() {
            ledger.clear();
        }
        self.registry = Registry::new();
        self.strategy = self.initial_strategy;
        self.running = false;
        self.clock = 0;
        info!("simulation reset");
    }

    pub fn strategy(&self) -> FitStrategy {
        self.strategy
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn clock(&self) -> u64 {
        self.clock
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn region(&self, tag: RegionTag) -> Option<&Ledger> {
        self.regions.get(&tag)
    }

    pub fn regions(&self) -> impl Iterator<Item = (RegionTag, &Ledger)> {
        self.regions.iter().map(|(&tag, ledger)| (tag, ledger))
    }

    /// Largest request any region could ever satisfy.
    pub fn capacity(&self) -> usize {
        self.regions.values().map(Ledger::capacity).max().unwrap_or(0)
    }

    /// True when nothing is placed and nothing is waiting.
    pub fn is_idle(&self) -> bool {
        self.registry.placed().is_empty() && self.registry.admission_order().is_empty()
    }

    /// Validate and enqueue a process, then run an admission pass.
    pub fn add_process(&mut self, spec: ProcessSpec) -> SimResult<ProcessId> {
        if let Err(e) = spec.validate() {
            warn!(error = %e, "rejected process");
            return Err(e);
        }
        let size = spec.size as usize;
        let capacity = self.capacity();
        if size > capacity {
            warn!(size, capacity, "process exceeds capacity");
            return Err(SimError::Capacity { size, capacity });
        }

        let id = self.registry.admit(&spec, self.clock);
        info!(pid = id, name = %spec.name, priority = spec.priority, size, burst = spec.burst, "process added");
        self.attempt_allocation()?;
        Ok(id)
    }

    pub fn set_strategy(&mut self, strategy: FitStrategy) -> SimResult<()> {
        if self.running {
            return Err(SimError::NotStopped("changing the strategy"));
        }
        info!(from = %self.strategy, to = %strategy, "strategy changed");
        self.strategy = strategy;
        Ok(())
    }

    /// Mark the clock as advancing and admit whatever fits.
    pub fn start(&mut self) -> SimResult<Vec<ProcessId>> {
        if self.running {
            return Ok(Vec::new());
        }
        self.running = true;
        info!(tick = self.clock, "simulation started");
        self.attempt_allocation()
    }

    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            info!(tick = self.clock, "simulation stopped");
        }
    }

    /// One sweep over the waiting queue in admission order. Each placement is visible to
    /// the processes after it. Returns the ids placed in this pass.
    pub fn attempt_allocation(&mut self) -> SimResult<Vec<ProcessId>> {
        let mut placed = Vec::new();
        for pid in self.registry.admission_order() {
            let size = self
                .registry
                .get(pid)
                .map(|p| p.size)
                .ok_or_else(|| SimError::Integrity(format!("queued P{} is not registered", pid)))?;

            for (&tag, ledger) in self.regions.iter_mut() {
                let Some(idx) = self.strategy.select(size, ledger.blocks()) else {
                    continue;
                };
                let block = ledger.place(idx, pid, size)?;
                self.registry.get_mut(pid)?.mark_placed(tag, block);
                self.registry.dequeue(pid);
                info!(pid, region = %tag, block, size, strategy = %self.strategy, "allocated");
                placed.push(pid);
                break;
            }
        }
        if !placed.is_empty() {
            debug!(placed = ?placed, "admission pass");
        }
        Ok(placed)
    }

    /// Advance time by one unit: every placed process runs once, finished ones release
    /// their blocks, then a single admission pass considers all freed space together.
    pub fn tick(&mut self) -> SimResult<TickReport> {
        let occupants = match self.resolve_occupants() {
            Ok(o) => o,
            Err(e) => {
                error!(error = %e, "tick aborted");
                return Err(e);
            }
        };

        self.clock += 1;
        let mut completed = Vec::new();
        for pid in occupants {
            if self.registry.get_mut(pid)?.run_one() {
                completed.push(pid);
            }
        }
        for &pid in &completed {
            self.finish(pid)?;
        }

        let placed = self.attempt_allocation()?;
        Ok(TickReport {
            tick: self.clock,
            completed,
            placed,
            still_waiting: self.registry.admission_order(),
        })
    }

    /// Every occupant in region then address order, after checking that each one is a
    /// registered process placed in exactly that block.
    fn resolve_occupants(&self) -> SimResult<Vec<ProcessId>> {
        let mut occupants = Vec::new();
        for (&tag, ledger) in &self.regions {
            for block in ledger.blocks() {
                let Some(pid) = block.occupant else {
                    continue;
                };
                let process = self.registry.get(pid).ok_or_else(|| {
                    SimError::Integrity(format!("block b{} references unknown P{}", block.id, pid))
                })?;
                if process.placement() != Some((tag, block.id)) {
                    return Err(SimError::Integrity(format!(
                        "block b{} holds P{} but the process records {:?}",
                        block.id,
                        pid,
                        process.placement()
                    )));
                }
                occupants.push(pid);
            }
        }
        let placed = self.registry.placed().len();
        if placed != occupants.len() {
            return Err(SimError::Integrity(format!(
                "{} processes are placed but {} blocks are occupied",
                placed,
                occupants.len()
            )));
        }
        Ok(occupants)
    }

    /// Release the block of a completed process and move it to the finished list.
    fn finish(&mut self, pid: ProcessId) -> SimResult<()> {
        let (tag, block) = self
            .registry
            .get(pid)
            .and_then(|p| p.placement())
            .ok_or_else(|| SimError::Integrity(format!("P{} has no recorded block", pid)))?;
        let ledger = self
            .regions
            .get_mut(&tag)
            .ok_or_else(|| SimError::Integrity(format!("region {} does not exist", tag)))?;

        let free = ledger.release(block, pid)?;
        let clock = self.clock;
        let process = self.registry.get_mut(pid)?;
        process.mark_finished(clock);
        info!(pid, name = %process.name, region = %tag, block, free, "process finished");
        self.registry.record_finished(pid);
        Ok(())
    }

    /// Compact every dynamic region. Refused while the clock is advancing.
    pub fn defragment(&mut self) -> SimResult<DefragReport> {
        if self.running {
            warn!("defragment refused while running");
            return Err(SimError::NotStopped("defragmenting"));
        }
        let regions = self
            .regions
            .iter_mut()
            .map(|(&tag, ledger)| (tag, ledger.compact()))
            .collect();
        Ok(DefragReport { regions })
    }

    /// Detached copy of the current state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self)
    }

    /// Full consistency check across every ledger and the registry.
    pub fn check_invariants(&self) -> SimResult<()> {
        for (&tag, ledger) in &self.regions {
            ledger.check_invariants()?;
            for block in ledger.blocks() {
                let Some(pid) = block.occupant else {
                    continue;
                };
                let process = self.registry.get(pid).ok_or_else(|| {
                    SimError::Integrity(format!("block b{} references unknown P{}", block.id, pid))
                })?;
                if process.placement() != Some((tag, block.id)) {
                    return Err(SimError::Integrity(format!(
                        "block b{} in {} holds P{} but the process records {:?}",
                        block.id,
                        tag,
                        pid,
                        process.placement()
                    )));
                }
                let size_ok = if ledger.is_dynamic() {
                    block.size == process.size
                } else {
                    block.size >= process.size
                };
                if !size_ok {
                    return Err(SimError::Integrity(format!(
                        "block b{} ({}KB) does not match P{} ({}KB)",
                        block.id, block.size, pid, process.size
                    )));
                }
            }
        }

        for process in self.registry.all() {
            match (process.state(), process.placement()) {
                (ProcessState::Placed, Some((tag, id))) => {
                    let held = self
                        .regions
                        .get(&tag)
                        .and_then(|l| l.index_of(id).and_then(|i| l.get(i)))
                        .and_then(|b| b.occupant);
                    if held != Some(process.id) {
                        return Err(SimError::Integrity(format!(
                            "P{} records block b{} in {} but does not hold it",
                            process.id, id, tag
                        )));
                    }
                }
                (ProcessState::Placed, None) => {
                    return Err(SimError::Integrity(format!(
                        "P{} is placed without a block",
                        process.id
                    )));
                }
                (_, Some(_)) => {
                    return Err(SimError::Integrity(format!(
                        "P{} holds a block while not placed",
                        process.id
                    )));
                }
                (_, None) => {}
            }
        }
        Ok(())
    }
}
