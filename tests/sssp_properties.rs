use petgraph::algo::dijkstra;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grape::config::EngineConfig;
use grape::engine::Coordinator;
use grape::graph::partition_edges;
use grape::programs::{bfs_program, sssp_program};

type Edge = (u64, u64, f64);

fn run_sssp(n: u64, edges: &[Edge], source: u64, workers: usize, threads: usize) -> Vec<f64> {
    let vertices: Vec<u64> = (0..n).collect();
    let fragments = partition_edges(&vertices, edges, workers).unwrap();
    let config = EngineConfig::new().with_fixed_threads(threads);
    let mut c = Coordinator::new(fragments, &config).unwrap();
    let outcome = c.run(sssp_program(source)).unwrap();
    (0..n).map(|gid| outcome.snapshot.get(gid).unwrap()).collect()
}

fn run_bfs(n: u64, edges: &[Edge], source: u64, workers: usize, threads: usize) -> (Vec<u64>, u64) {
    let vertices: Vec<u64> = (0..n).collect();
    let fragments = partition_edges(&vertices, edges, workers).unwrap();
    let config = EngineConfig::new().with_fixed_threads(threads);
    let mut c = Coordinator::new(fragments, &config).unwrap();
    let outcome = c.run(bfs_program(source)).unwrap();
    let hops = (0..n).map(|gid| outcome.snapshot.get(gid).unwrap()).collect();
    (hops, outcome.epochs)
}

fn oracle(n: u64, edges: &[Edge], source: u64, unit: bool) -> Vec<f64> {
    let mut g: DiGraph<(), f64> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..n).map(|_| g.add_node(())).collect();
    for &(s, d, w) in edges {
        g.add_edge(nodes[s as usize], nodes[d as usize], if unit { 1.0 } else { w });
    }
    let dist = dijkstra(&g, nodes[source as usize], None, |e| *e.weight());
    nodes
        .iter()
        .map(|node| dist.get(node).copied().unwrap_or(f64::INFINITY))
        .collect()
}

fn graph_strategy() -> impl Strategy<Value = (u64, Vec<Edge>, u64)> {
    (2u64..40).prop_flat_map(|n| {
        let edge = (0..n, 0..n, 0u32..20).prop_map(|(s, d, w)| (s, d, f64::from(w)));
        (Just(n), proptest::collection::vec(edge, 0..120), 0..n)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn sssp_matches_dijkstra((n, edges, source) in graph_strategy()) {
        let expected = oracle(n, &edges, source, false);
        prop_assert_eq!(run_sssp(n, &edges, source, 1, 1), expected);
    }

    #[test]
    fn sssp_is_independent_of_workers_and_threads(
        (n, edges, source) in graph_strategy(),
        workers in 1usize..5,
        threads in 1usize..5,
    ) {
        let baseline = run_sssp(n, &edges, source, 1, 1);
        prop_assert_eq!(run_sssp(n, &edges, source, workers, threads), baseline);
    }

    #[test]
    fn bfs_matches_unit_dijkstra(
        (n, edges, source) in graph_strategy(),
        workers in 1usize..4,
    ) {
        let expected: Vec<u64> = oracle(n, &edges, source, true)
            .into_iter()
            .map(|d| if d.is_finite() { d as u64 } else { u64::MAX })
            .collect();
        let (hops, epochs) = run_bfs(n, &edges, source, workers, 2);
        prop_assert_eq!(&hops, &expected);

        // One epoch per hop of the deepest vertex, plus the quiet epoch that ends the run.
        let depth = hops.iter().copied().filter(|&h| h != u64::MAX).max().unwrap_or(0);
        prop_assert!(epochs <= depth.max(1) + 1, "{} epochs for depth {}", epochs, depth);
    }
}

#[test]
fn large_random_graph_agrees_across_layouts() {
    let mut rng = StdRng::seed_from_u64(0x6772_6170);
    let n = 3_000u64;
    let edges: Vec<Edge> = (0..20_000)
        .map(|_| {
            (
                rng.gen_range(0..n),
                rng.gen_range(0..n),
                f64::from(rng.gen_range(1u32..100)),
            )
        })
        .collect();

    let expected = oracle(n, &edges, 0, false);
    assert_eq!(run_sssp(n, &edges, 0, 1, 1), expected);
    assert_eq!(run_sssp(n, &edges, 0, 4, 4), expected);
    assert_eq!(run_sssp(n, &edges, 0, 3, 8), expected);
}

#[test]
fn coalescing_reduces_traffic_without_changing_results() {
    let mut rng = StdRng::seed_from_u64(11);
    let n = 500u64;
    let edges: Vec<Edge> = (0..5_000)
        .map(|_| (rng.gen_range(0..n), rng.gen_range(0..n), f64::from(rng.gen_range(1u32..10))))
        .collect();
    let vertices: Vec<u64> = (0..n).collect();

    let mut results = Vec::new();
    for coalesce in [true, false] {
        let config = EngineConfig::new().with_fixed_threads(1).with_coalescing(coalesce);
        let fragments = partition_edges(&vertices, &edges, 4).unwrap();
        let mut c = Coordinator::new(fragments, &config).unwrap();
        results.push(c.run(sssp_program(0)).unwrap());
    }
    let (on, off) = (&results[0], &results[1]);
    assert_eq!(on.snapshot, off.snapshot);
    assert_eq!(off.metrics.messages_coalesced(), 0);
    assert!(on.metrics.messages_sent() <= off.metrics.messages_sent());
}
