use grape::engine::{AggregationStore, Aggregator, Max, Min};
use proptest::prelude::*;

#[test]
fn competing_values_keep_the_best() {
    for order in [[9.0, 4.0], [4.0, 9.0]] {
        let store: AggregationStore<f64, Min> = AggregationStore::new(1);
        for v in order {
            store.compare_and_improve(0, v);
        }
        assert_eq!(store.read(0), 4.0);
    }
}

#[test]
fn set_seeds_and_reset_restores_identity() {
    let mut store: AggregationStore<i64, Max> = AggregationStore::new(3);
    store.set(1, -5);
    assert_eq!(store.snapshot(), vec![i64::MIN, -5, i64::MIN]);
    assert_eq!(store.inner_snapshot(2), vec![i64::MIN, -5]);
    store.reset();
    assert_eq!(store.read(1), <Max as Aggregator<i64>>::identity());
}

#[test]
fn concurrent_improvements_converge_to_minimum() {
    let store: AggregationStore<u64, Min> = AggregationStore::new(8);
    std::thread::scope(|s| {
        for t in 0..8u64 {
            let store = &store;
            s.spawn(move || {
                for round in (0..1000u64).rev() {
                    for v in 0..8 {
                        store.compare_and_improve(v, round * 8 + t);
                    }
                }
            });
        }
    });
    assert!(store.snapshot().iter().all(|&v| v == 0));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reads_never_regress(values in proptest::collection::vec(0u32..10_000, 1..400)) {
        let store: AggregationStore<u32, Min> = AggregationStore::new(1);
        let chunks: Vec<&[u32]> = values.chunks(values.len().div_ceil(4)).collect();
        std::thread::scope(|s| {
            for chunk in &chunks {
                let store = &store;
                s.spawn(move || {
                    let mut last = store.read(0);
                    for &v in *chunk {
                        store.compare_and_improve(0, v);
                        let now = store.read(0);
                        assert!(now <= last, "slot regressed from {last} to {now}");
                        last = now;
                    }
                });
            }
        });
        prop_assert_eq!(store.read(0), *values.iter().min().unwrap());
    }
}
