use grape::concurrency::ParallelScheduler;
use grape::engine::{ActiveSet, AggregationStore, LocalTransport, MessageManager, Min};
use grape::graph::CsrFragment;
use grape::Coordinator;

fn assert_send<T: Send>() {}
fn assert_sync<T: Sync>() {}

#[test]
fn per_worker_state_is_shareable_across_threads() {
    assert_sync::<ActiveSet>();
    assert_sync::<AggregationStore<f64, Min>>();
    assert_sync::<MessageManager<f64, Min>>();
    assert_sync::<CsrFragment<f64>>();
    assert_send::<ParallelScheduler>();
}

#[test]
fn coordinator_can_move_to_another_thread() {
    assert_send::<LocalTransport<u64>>();
    assert_sync::<LocalTransport<u64>>();
    assert_send::<Coordinator<CsrFragment<f64>, f64, Min>>();
}
