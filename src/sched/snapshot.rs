use crate::memory::{
    block::{BlockId, ProcessId, RegionTag},
    fit::FitStrategy,
    ledger::{Layout, Ledger},
    stats::MemoryStats,
};
use crate::sched::{process::ProcessView, registry::Registry, simulation::Simulation};
use serde::{Deserialize, Serialize};

/// One block as the rendering layer sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockView {
    pub id: BlockId,
    pub start: usize,
    pub size: usize,
    pub free: bool,
    pub occupant: Option<ProcessId>,
    pub occupant_name: Option<String>,
    pub remaining: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionView {
    pub tag: RegionTag,
    pub layout: Layout,
    pub blocks: Vec<BlockView>,
    pub stats: MemoryStats,
}

/// Owned copy of the simulation state; shares nothing with the live structures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub tick: u64,
    pub running: bool,
    pub strategy: FitStrategy,
    pub regions: Vec<RegionView>,
    /// Admission order.
    pub waiting: Vec<ProcessView>,
    /// Placed processes, by id.
    pub placed: Vec<ProcessView>,
    /// Most recent first.
    pub finished: Vec<ProcessView>,
}

impl Snapshot {
    pub(crate) fn capture(sim: &Simulation) -> Self {
        let registry = sim.registry();
        let views = |ids: Vec<ProcessId>| -> Vec<ProcessView> {
            ids.into_iter()
                .filter_map(|id| registry.get(id).map(|p| p.view()))
                .collect()
        };

        Snapshot {
            tick: sim.clock(),
            running: sim.is_running(),
            strategy: sim.strategy(),
            regions: sim
                .regions()
                .map(|(tag, ledger)| region_view(tag, ledger, registry))
                .collect(),
            waiting: views(registry.admission_order()),
            placed: views(registry.placed()),
            finished: views(registry.finished()),
        }
    }

    pub fn region(&self, tag: RegionTag) -> Option<&RegionView> {
        self.regions.iter().find(|r| r.tag == tag)
    }
}

fn region_view(tag: RegionTag, ledger: &Ledger, registry: &Registry) -> RegionView {
    let blocks = ledger
        .blocks()
        .iter()
        .map(|b| {
            let process = b.occupant.and_then(|pid| registry.get(pid));
            BlockView {
                id: b.id,
                start: b.start,
                size: b.size,
                free: b.is_free(),
                occupant: b.occupant,
                occupant_name: process.map(|p| p.name.clone()),
                remaining: process.map(|p| p.remaining()),
            }
        })
        .collect();

    RegionView {
        tag,
        layout: ledger.layout().clone(),
        blocks,
        stats: MemoryStats::collect(ledger, |pid| registry.get(pid).map(|p| p.size)),
    }
}
