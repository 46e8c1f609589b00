use criterion::{Criterion, black_box, criterion_group, criterion_main};
use memsim::{Config, FitStrategy, ProcessSpec, cli::utils::run_batch};

fn workload() -> Vec<ProcessSpec> {
    (0..200)
        .map(|i| {
            ProcessSpec::new(
                format!("p{}", i),
                1 + (i * 7) % 5,
                1 + (i * 13) % 9,
                1 + (i * 37) % 256,
            )
        })
        .collect()
}

fn bench_batch(c: &mut Criterion) {
    let specs = workload();
    for strategy in FitStrategy::ALL {
        let config = Config {
            strategy,
            ..Config::with_memory(1024)
        };
        c.bench_function(&format!("batch_{}_fit", strategy), |b| {
            b.iter(|| run_batch(black_box(&config), black_box(&specs)).unwrap());
        });
    }
}

criterion_group!(benches, bench_batch);
criterion_main!(benches);
