use memsim::memory::block::RegionTag;
use memsim::memory::defrag::DefragOutcome;
use memsim::sched::process::ProcessState;
use memsim::{Config, FitStrategy, ProcessSpec, SimError, Simulation};

fn spec(name: &str, priority: i64, burst: i64, size: i64) -> ProcessSpec {
    ProcessSpec::new(name, priority, burst, size)
}

fn hybrid() -> Simulation {
    Simulation::new(&Config {
        total_memory_kb: 200,
        static_partitions_kb: vec![50, 100],
        ..Config::default()
    })
    .unwrap()
}

#[test]
fn test_add_process_places_immediately() {
    let mut sim = Simulation::with_memory(1024).unwrap();
    let id = sim.add_process(spec("editor", 1, 5, 300)).unwrap();
    assert_eq!(id, 1);

    let snap = sim.snapshot();
    assert!(snap.waiting.is_empty());
    assert_eq!(snap.placed.len(), 1);
    assert_eq!(snap.placed[0].state, ProcessState::Placed);
    assert_eq!(snap.placed[0].region, Some(RegionTag::Dynamic));
    let blocks = &snap.region(RegionTag::Dynamic).unwrap().blocks;
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].occupant, Some(1));
    assert_eq!(blocks[1].size, 724);
    sim.check_invariants().unwrap();
}

#[test]
fn test_validation_errors() {
    let mut sim = Simulation::with_memory(1024).unwrap();
    for bad in [
        spec("  ", 1, 1, 1),
        spec("p", 0, 1, 1),
        spec("p", 1, 0, 1),
        spec("p", 1, 1, 0),
        spec("p", -3, 1, 1),
        spec("p", 1, 1, -50),
    ] {
        assert!(matches!(sim.add_process(bad), Err(SimError::Validation(_))));
    }
    assert!(sim.registry().is_empty());
}

#[test]
fn test_capacity_rejection_leaves_queue_unchanged() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("big", 1, 5, 100)).unwrap();
    sim.add_process(spec("waiting", 1, 5, 10)).unwrap();
    let before = sim.snapshot().waiting;

    let err = sim.add_process(spec("huge", 9, 1, 101)).unwrap_err();
    assert_eq!(
        err,
        SimError::Capacity {
            size: 101,
            capacity: 100
        }
    );
    assert_eq!(sim.snapshot().waiting, before);
    assert_eq!(sim.registry().len(), 2);
}

#[test]
fn test_admission_order_priority_then_arrival() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("filler", 1, 1, 100)).unwrap();
    let low = sim.add_process(spec("low", 3, 1, 100)).unwrap();
    let high = sim.add_process(spec("high", 5, 1, 100)).unwrap();
    let low_twin = sim.add_process(spec("low-twin", 3, 1, 100)).unwrap();

    assert_eq!(sim.registry().admission_order(), vec![high, low, low_twin]);

    let report = sim.tick().unwrap();
    assert_eq!(report.completed, vec![1]);
    assert_eq!(report.placed, vec![high]);
    assert_eq!(report.still_waiting, vec![low, low_twin]);
}

#[test]
fn test_later_processes_see_earlier_placements_in_same_pass() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("blocker", 1, 1, 100)).unwrap();
    let a = sim.add_process(spec("a", 2, 5, 60)).unwrap();
    let b = sim.add_process(spec("b", 1, 5, 60)).unwrap();
    let c = sim.add_process(spec("c", 1, 5, 40)).unwrap();

    let report = sim.tick().unwrap();
    assert_eq!(report.placed, vec![a, c]);
    assert_eq!(report.still_waiting, vec![b]);
    sim.check_invariants().unwrap();
}

#[test]
fn test_completion_triggers_readmission_in_same_tick() {
    let mut sim = Simulation::with_memory(100).unwrap();
    let a = sim.add_process(spec("A", 1, 2, 100)).unwrap();
    let b = sim.add_process(spec("B", 1, 3, 50)).unwrap();

    let first = sim.tick().unwrap();
    assert!(first.completed.is_empty());
    assert_eq!(first.still_waiting, vec![b]);
    assert_eq!(sim.registry().get(a).unwrap().remaining(), 1);

    let second = sim.tick().unwrap();
    assert_eq!(second.tick, 2);
    assert_eq!(second.completed, vec![a]);
    assert_eq!(second.placed, vec![b]);
    assert!(second.still_waiting.is_empty());
    assert_eq!(sim.registry().get(a).unwrap().state(), ProcessState::Finished);
    assert_eq!(sim.registry().get(a).unwrap().finished_at, Some(2));
    sim.check_invariants().unwrap();
}

#[test]
fn test_simultaneous_completions_are_considered_together() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("x", 1, 1, 50)).unwrap();
    sim.add_process(spec("y", 1, 1, 50)).unwrap();
    let big = sim.add_process(spec("big", 1, 1, 100)).unwrap();

    let report = sim.tick().unwrap();
    assert_eq!(report.completed, vec![1, 2]);
    assert_eq!(report.placed, vec![big]);
}

#[test]
fn test_finished_list_is_most_recent_first() {
    let mut sim = Simulation::with_memory(300).unwrap();
    sim.add_process(spec("slow", 1, 3, 100)).unwrap();
    sim.add_process(spec("fast", 1, 1, 100)).unwrap();
    sim.add_process(spec("mid", 1, 2, 100)).unwrap();
    for _ in 0..3 {
        sim.tick().unwrap();
    }
    let names: Vec<String> = sim.snapshot().finished.into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["slow", "mid", "fast"]);
    assert!(sim.is_idle());
}

#[test]
fn test_defragment_and_strategy_refused_while_running() {
    let mut sim = Simulation::with_memory(256).unwrap();
    sim.start().unwrap();
    assert!(sim.is_running());
    assert_eq!(
        sim.defragment().unwrap_err(),
        SimError::NotStopped("defragmenting")
    );
    assert!(matches!(
        sim.set_strategy(FitStrategy::Best),
        Err(SimError::NotStopped(_))
    ));
    assert_eq!(sim.strategy(), FitStrategy::First);

    sim.stop();
    sim.set_strategy(FitStrategy::Best).unwrap();
    assert_eq!(sim.strategy(), FitStrategy::Best);
    sim.defragment().unwrap();
}

#[test]
fn test_start_without_room_places_nothing_until_tick() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("a", 1, 1, 100)).unwrap();
    let b = sim.add_process(spec("b", 1, 1, 100)).unwrap();
    assert!(sim.start().unwrap().is_empty());
    assert_eq!(sim.registry().get(b).unwrap().state(), ProcessState::Waiting);
    sim.stop();
    sim.tick().unwrap();
    assert_eq!(sim.registry().get(b).unwrap().state(), ProcessState::Placed);
}

#[test]
fn test_defragment_compacts_dynamic_memory() {
    let mut sim = Simulation::with_memory(1024).unwrap();
    sim.add_process(spec("a", 1, 1, 300)).unwrap();
    let b = sim.add_process(spec("b", 1, 9, 100)).unwrap();
    sim.add_process(spec("c", 1, 1, 300)).unwrap();
    let d = sim.add_process(spec("d", 1, 9, 200)).unwrap();
    sim.tick().unwrap();

    let report = sim.defragment().unwrap();
    assert!(report.changed());
    assert_eq!(
        report.regions,
        vec![(
            RegionTag::Dynamic,
            DefragOutcome::Compacted {
                relocated: 2,
                free_size: 724
            }
        )]
    );

    let snap = sim.snapshot();
    let blocks = &snap.region(RegionTag::Dynamic).unwrap().blocks;
    let shape: Vec<(usize, usize, Option<u64>)> =
        blocks.iter().map(|b| (b.start, b.size, b.occupant)).collect();
    assert_eq!(
        shape,
        vec![(0, 100, Some(b)), (100, 200, Some(d)), (300, 724, None)]
    );
    sim.check_invariants().unwrap();

    // Placements survive compaction; the processes still finish cleanly.
    for _ in 0..8 {
        sim.tick().unwrap();
    }
    assert!(sim.is_idle());
    let free = &sim.snapshot().regions[0].blocks;
    assert_eq!(free.len(), 1);
    assert_eq!(free[0].size, 1024);
}

#[test]
fn test_hybrid_prefers_static_and_occupies_one_region() {
    let mut sim = hybrid();
    assert_eq!(sim.capacity(), 200);

    let small = sim.add_process(spec("small", 1, 2, 40)).unwrap();
    let medium = sim.add_process(spec("medium", 1, 2, 80)).unwrap();
    let spill = sim.add_process(spec("spill", 1, 2, 30)).unwrap();
    let large = sim.add_process(spec("large", 1, 2, 150)).unwrap();

    let region_of = |sim: &Simulation, id| sim.registry().get(id).unwrap().placement().unwrap().0;
    assert_eq!(region_of(&sim, small), RegionTag::Static);
    assert_eq!(region_of(&sim, medium), RegionTag::Static);
    assert_eq!(region_of(&sim, spill), RegionTag::Dynamic);
    assert_eq!(region_of(&sim, large), RegionTag::Dynamic);

    let snap = sim.snapshot();
    let stat = snap.region(RegionTag::Static).unwrap();
    assert_eq!(stat.stats.internal_fragmentation, 10 + 20);
    assert_eq!(stat.blocks.iter().map(|b| b.size).collect::<Vec<_>>(), vec![50, 100]);

    // Each process is counted in exactly one region.
    let occupied: usize = snap
        .regions
        .iter()
        .map(|r| r.blocks.iter().filter(|b| !b.free).count())
        .sum();
    assert_eq!(occupied, 4);
    sim.check_invariants().unwrap();

    sim.tick().unwrap();
    sim.tick().unwrap();
    assert!(sim.is_idle());
    assert_eq!(
        sim.defragment().unwrap().regions,
        vec![
            (RegionTag::Static, DefragOutcome::FixedLayout),
            (RegionTag::Dynamic, DefragOutcome::AlreadyCompact),
        ]
    );
    sim.check_invariants().unwrap();
}

#[test]
fn test_static_only_capacity_is_largest_partition() {
    let mut sim = Simulation::new(&Config {
        total_memory_kb: 0,
        static_partitions_kb: vec![64, 128],
        ..Config::default()
    })
    .unwrap();
    assert!(matches!(
        sim.add_process(spec("too big", 1, 1, 129)),
        Err(SimError::Capacity { capacity: 128, .. })
    ));
    sim.add_process(spec("fits", 1, 1, 128)).unwrap();
}

#[test]
fn test_capacity_error_names_largest_region() {
    // 50 + 100 static plus 200 dynamic: 350KB in total, but no single region fits 201KB.
    let mut sim = hybrid();
    let err = sim.add_process(spec("wide", 1, 1, 201)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "process size (201KB) exceeds largest region (200KB)"
    );
}

#[test]
fn test_new_rejects_unusable_memory_config() {
    let empty_partition = Config {
        static_partitions_kb: vec![64, 0],
        ..Config::default()
    };
    assert!(matches!(
        Simulation::new(&empty_partition),
        Err(SimError::Validation(_))
    ));

    let no_memory = Config {
        total_memory_kb: 0,
        ..Config::default()
    };
    assert!(matches!(Simulation::new(&no_memory), Err(SimError::Validation(_))));
    assert!(matches!(Simulation::with_memory(0), Err(SimError::Validation(_))));
}

#[test]
fn test_reset_restores_initial_state() {
    let mut sim = Simulation::with_memory(128).unwrap();
    sim.add_process(spec("a", 1, 4, 64)).unwrap();
    sim.set_strategy(FitStrategy::Worst).unwrap();
    sim.start().unwrap();
    sim.tick().unwrap();

    sim.reset();
    let snap = sim.snapshot();
    assert_eq!(snap.tick, 0);
    assert!(!snap.running);
    assert_eq!(snap.strategy, FitStrategy::First);
    assert!(snap.waiting.is_empty() && snap.placed.is_empty() && snap.finished.is_empty());
    assert_eq!(snap.regions[0].blocks.len(), 1);
    assert_eq!(sim.add_process(spec("b", 1, 1, 1)).unwrap(), 1);
}

#[test]
fn test_snapshot_is_detached() {
    let mut sim = Simulation::with_memory(100).unwrap();
    sim.add_process(spec("a", 1, 3, 10)).unwrap();
    let before = sim.snapshot();
    sim.tick().unwrap();
    assert_eq!(before.tick, 0);
    assert_eq!(before.placed[0].remaining, 3);
    assert_eq!(sim.snapshot().placed[0].remaining, 2);
}

/// Tiny deterministic generator so the workload is reproducible without extra crates.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn test_invariants_hold_under_mixed_workload() {
    for strategy in FitStrategy::ALL {
        for config in [Config::with_memory(1024), Config {
            total_memory_kb: 512,
            static_partitions_kb: vec![32, 64, 128, 256],
            ..Config::default()
        }] {
            let mut sim = Simulation::new(&Config { strategy, ..config }).unwrap();
            let mut rng = Lcg(42);
            for step in 0..400 {
                match rng.next(10) {
                    0..=3 => {
                        let size = 1 + rng.next(300) as i64;
                        let burst = 1 + rng.next(8) as i64;
                        let prio = 1 + rng.next(5) as i64;
                        sim.add_process(spec(&format!("p{}", step), prio, burst, size))
                            .unwrap();
                    }
                    4 => {
                        sim.defragment().unwrap();
                    }
                    _ => {
                        sim.tick().unwrap();
                    }
                }
                sim.check_invariants().unwrap();
                for (_, ledger) in sim.regions() {
                    let sum: usize = ledger.blocks().iter().map(|b| b.size).sum();
                    assert_eq!(sum, ledger.total_size());
                }
            }
        }
    }
}
