use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use deadlock_sim_core::engine::{
    AllocationState, CycleFinder, RecoveryPlanner, SafetyAnalyzer, ScenarioGenerator,
    WaitForGraphBuilder,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const SIZES: [(usize, usize); 3] = [(8, 4), (32, 16), (64, 32)];

fn scenarios(n: usize, m: usize, count: usize) -> Vec<AllocationState> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..count)
        .map(|_| {
            ScenarioGenerator::seeded(rng.gen::<u64>())
                .generate(n, m, 4)
                .unwrap()
                .state
        })
        .collect()
}

/// Every process holds one unit of its own resource and wants its neighbour's.
fn ring(n: usize) -> AllocationState {
    let allocation: Vec<Vec<u32>> = (0..n)
        .map(|i| (0..n).map(|j| u32::from(i == j)).collect())
        .collect();
    let max_need: Vec<Vec<u32>> = (0..n)
        .map(|i| (0..n).map(|j| u32::from(i == j || j == (i + 1) % n)).collect())
        .collect();
    AllocationState::new(
        (1..=n).map(|i| format!("P{}", i)).collect(),
        (1..=n).map(|j| format!("R{}", j)).collect(),
        allocation,
        max_need,
        vec![0; n],
    )
    .unwrap()
}

fn bench_safety(c: &mut Criterion) {
    let mut group = c.benchmark_group("safety_analyze");
    group.sample_size(50);

    for (n, m) in SIZES {
        let states = scenarios(n, m, 64);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{}x{}", n, m)), &states, |b, states| {
            b.iter(|| {
                for state in states {
                    black_box(SafetyAnalyzer::analyze(state));
                }
            })
        });
    }

    group.finish();
}

fn bench_cycles(c: &mut Criterion) {
    let mut group = c.benchmark_group("cycle_search");
    group.sample_size(50);

    for n in [8, 32, 64] {
        let state = ring(n);
        let report = SafetyAnalyzer::detect(&state);
        let graph = WaitForGraphBuilder::build(&state, &report);
        group.bench_with_input(BenchmarkId::new("ring", n), &graph, |b, graph| {
            b.iter(|| black_box(CycleFinder::find(graph)))
        });
    }

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let mut group = c.benchmark_group("recovery");
    group.sample_size(20);

    for n in [8, 32] {
        let state = ring(n);
        group.bench_with_input(BenchmarkId::new("ring", n), &state, |b, state| {
            b.iter(|| black_box(RecoveryPlanner::recover(state)))
        });
    }

    let states = scenarios(32, 16, 16);
    group.bench_function("random_32x16", |b| {
        b.iter(|| {
            for state in &states {
                black_box(RecoveryPlanner::recover(state));
            }
        })
    });

    group.finish();
}

fn bench_generate(c: &mut Criterion) {
    let mut group = c.benchmark_group("generate");
    group.sample_size(50);

    group.bench_function("scenario_5x3", |b| {
        b.iter_batched(
            || ScenarioGenerator::seeded(7),
            |mut generator| black_box(generator.generate(5, 3, 2).unwrap()),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, bench_safety, bench_cycles, bench_recovery, bench_generate);
criterion_main!(benches);
