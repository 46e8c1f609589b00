use crate::config::Config;
use crate::sched::{process::ProcessSpec, simulation::Simulation, snapshot::Snapshot};
use anyhow::{Context, Result};
use csv::{ReaderBuilder, Trim, WriterBuilder};
use std::fmt::Write as _;
use std::path::Path;
use tracing::{info, warn};

/// Read process specs from a CSV with the header `name,priority,burst,size`.
pub fn read_process_csv<P: AsRef<Path>>(path: P) -> Result<Vec<ProcessSpec>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut specs = Vec::new();
    for (line, result) in rdr.deserialize().enumerate() {
        let spec: ProcessSpec =
            result.with_context(|| format!("{}: bad record {}", path.display(), line + 1))?;
        specs.push(spec);
    }
    Ok(specs)
}

/// Write finished processes (most recent first) with their completion tick.
pub fn write_finished_csv<P: AsRef<Path>>(snapshot: &Snapshot, path: P) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = WriterBuilder::new()
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    wtr.write_record(["id", "name", "priority", "size", "burst", "arrived_at", "finished_at"])?;
    for p in &snapshot.finished {
        wtr.write_record([
            p.id.to_string(),
            p.name.clone(),
            p.priority.to_string(),
            p.size.to_string(),
            p.burst.to_string(),
            p.arrived_at.to_string(),
            p.finished_at.map(|t| t.to_string()).unwrap_or_default(),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Add every spec, start the clock and tick until all work is done or the waiting
/// processes can never be placed.
pub fn run_batch(config: &Config, specs: &[ProcessSpec]) -> Result<Snapshot> {
    let mut sim = Simulation::new(config)?;
    for spec in specs {
        if let Err(e) = sim.add_process(spec.clone()) {
            warn!(name = %spec.name, error = %e, "skipping process");
        }
    }
    sim.start()?;

    while !sim.is_idle() {
        if sim.registry().placed().is_empty() {
            // Nothing running frees memory, so try compacting once before giving up.
            sim.stop();
            let report = sim.defragment()?;
            sim.start()?;
            if !report.changed() || sim.registry().placed().is_empty() {
                warn!(
                    waiting = sim.registry().admission_order().len(),
                    "no process can be placed"
                );
                break;
            }
            continue;
        }
        sim.tick()?;
    }
    sim.stop();
    sim.check_invariants()?;
    info!(tick = sim.clock(), "batch finished");
    Ok(sim.snapshot())
}

/// Plain-text rendering of a snapshot for the shell.
pub fn render_snapshot(snap: &Snapshot) -> String {
    let mut out = String::new();
    let state = if snap.running { "running" } else { "stopped" };
    let _ = writeln!(out, "tick {} | {} | strategy {}", snap.tick, state, snap.strategy);

    for region in &snap.regions {
        let s = &region.stats;
        let _ = writeln!(
            out,
            "[{}] {}KB used {}KB free {}KB in {} hole(s), largest {}KB, external {:.1}%, internal {}KB",
            region.tag,
            s.total,
            s.used,
            s.free_total,
            s.free_blocks,
            s.largest_free,
            s.external_fragmentation_pct,
            s.internal_fragmentation
        );
        for b in &region.blocks {
            match (&b.occupant, &b.occupant_name) {
                (Some(pid), Some(name)) => {
                    let _ = writeln!(
                        out,
                        "  b{:<4} {:>6} +{:<6} P{} {} (left {})",
                        b.id,
                        b.start,
                        b.size,
                        pid,
                        name,
                        b.remaining.unwrap_or_default()
                    );
                }
                (Some(pid), None) => {
                    let _ = writeln!(out, "  b{:<4} {:>6} +{:<6} P{} <missing>", b.id, b.start, b.size, pid);
                }
                _ => {
                    let _ = writeln!(out, "  b{:<4} {:>6} +{:<6} free", b.id, b.start, b.size);
                }
            }
        }
    }

    let _ = writeln!(out, "waiting:");
    if snap.waiting.is_empty() {
        let _ = writeln!(out, "  (empty)");
    }
    for p in &snap.waiting {
        let _ = writeln!(
            out,
            "  P{} {} prio {} size {}KB burst {}",
            p.id, p.name, p.priority, p.size, p.burst
        );
    }

    let _ = writeln!(out, "finished:");
    if snap.finished.is_empty() {
        let _ = writeln!(out, "  (none)");
    }
    for p in &snap.finished {
        let _ = writeln!(
            out,
            "  P{} {} size {}KB at tick {}",
            p.id,
            p.name,
            p.size,
            p.finished_at.unwrap_or_default()
        );
    }
    out
}
