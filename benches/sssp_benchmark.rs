use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use grape::config::EngineConfig;
use grape::engine::{AggregationStore, Coordinator, Min};
use grape::graph::partition_edges;
use grape::programs::sssp_program;

/// Deterministic pseudo-random edges (xorshift), so runs are comparable.
fn synthetic_edges(nodes: u64, per_node: u64) -> Vec<(u64, u64, f64)> {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };
    let mut edges = Vec::with_capacity((nodes * per_node) as usize);
    for src in 0..nodes {
        for _ in 0..per_node {
            let dst = next() % nodes;
            let weight = (next() % 100 + 1) as f64;
            edges.push((src, dst, weight));
        }
    }
    edges
}

fn bench_sssp(c: &mut Criterion) {
    let nodes = 20_000;
    let edges = synthetic_edges(nodes, 8);
    let vertices: Vec<u64> = (0..nodes).collect();

    let mut group = c.benchmark_group("sssp");
    group.sample_size(10);
    for (workers, threads) in [(1, 1), (1, 4), (4, 1), (4, 2)] {
        let config = EngineConfig::new().with_fixed_threads(threads);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{workers}w{threads}t")),
            &(workers, threads),
            |b, &(workers, _)| {
                b.iter(|| {
                    let fragments = partition_edges(&vertices, &edges, workers).unwrap();
                    let mut coordinator = Coordinator::new(fragments, &config).unwrap();
                    black_box(coordinator.run(sssp_program(0)).unwrap().epochs)
                });
            },
        );
    }
    group.finish();
}

fn bench_compare_and_improve(c: &mut Criterion) {
    let store: AggregationStore<f64, Min> = AggregationStore::new(1024);
    c.bench_function("compare_and_improve_contended", |b| {
        b.iter(|| {
            std::thread::scope(|s| {
                for t in 0..4u32 {
                    let store = &store;
                    s.spawn(move || {
                        for i in 0..1024usize {
                            black_box(store.compare_and_improve(i, f64::from(t) + i as f64));
                        }
                    });
                }
            });
        });
    });
}

criterion_group!(benches, bench_sssp, bench_compare_and_improve);
criterion_main!(benches);
