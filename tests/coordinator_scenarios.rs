use std::thread;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use grape::config::EngineConfig;
use grape::engine::{
    Coordinator, Decision, EvalContext, LocalTransport, MessageBatch, Min, ProgramState,
    Transport, VertexProgram,
};
use grape::graph::{partition_edges, CsrFragment, Fragment, FragmentBuilder, WorkerId};
use grape::programs::sssp_program;
use grape::{Error, ProgramError};

type Sssp = Coordinator<CsrFragment<f64>, f64, Min>;

fn config(threads: usize) -> EngineConfig {
    EngineConfig::new().with_fixed_threads(threads)
}

fn chain(len: u64, workers: usize, config: &EngineConfig) -> Sssp {
    let edges: Vec<(u64, u64, f64)> = (0..len).map(|i| (i, i + 1, 1.0)).collect();
    let vertices: Vec<u64> = (0..=len).collect();
    Coordinator::new(partition_edges(&vertices, &edges, workers).unwrap(), config).unwrap()
}

#[test]
fn single_fragment_settles_after_one_inc_eval() {
    let edges = [(0, 1, 2.0), (1, 2, 3.0), (0, 2, 10.0)];
    let fragments = partition_edges(&[0, 1, 2, 3, 4], &edges, 1).unwrap();
    let mut c: Sssp = Coordinator::new(fragments, &config(2)).unwrap();
    let program = sssp_program(0);

    c.peval(&program).unwrap();
    assert_eq!(c.state(), ProgramState::PEval);
    assert_eq!(c.barrier().unwrap(), Decision::Continue);
    c.inc_eval(&program).unwrap();

    let after_one = c.outcome().snapshot;
    assert_eq!(after_one.get(0), Some(0.0));
    assert_eq!(after_one.get(1), Some(2.0));
    assert_eq!(after_one.get(2), Some(5.0));
    assert_eq!(after_one.get(3), Some(f64::INFINITY));
    assert_eq!(after_one.get(4), Some(f64::INFINITY));

    // Vertex 2 improved, so one more epoch runs and changes nothing.
    assert_eq!(c.barrier().unwrap(), Decision::Continue);
    c.inc_eval(&program).unwrap();
    assert_eq!(c.barrier().unwrap(), Decision::Done);
    assert_eq!(c.state(), ProgramState::Done);
    assert_eq!(c.outcome().snapshot, after_one);
    assert_eq!(c.outcome().epochs, 3);
}

/// Worker 0 owns vertex 0 with an edge to vertex 3, which worker 1 owns.
fn two_fragments() -> Vec<CsrFragment<f64>> {
    let mut a = FragmentBuilder::new(0, 2);
    a.add_inner(0).add_edge(0, 3, 7.0, 1);
    let mut b = FragmentBuilder::new(1, 2);
    b.add_inner(3);
    vec![a.build().unwrap(), b.build().unwrap()]
}

#[test]
fn cross_fragment_update_lands_on_owner() {
    let mut c: Sssp = Coordinator::new(two_fragments(), &config(1)).unwrap();
    c.peval(&sssp_program(0)).unwrap();

    let outer = c.fragment(0).resolve_global_to_local(3).unwrap();
    assert_eq!(c.store(0).read(outer), 7.0);
    assert!(c.message_manager(0).is_force_continue_raised());

    assert_eq!(c.barrier().unwrap(), Decision::Continue);
    let lid = c.fragment(1).resolve_inner(3).unwrap();
    assert_eq!(c.store(1).read(lid), 7.0);
    assert!(c.active_set(1).is_active(lid));
    assert!(c.active_set(0).is_current_empty());
}

#[test]
fn run_matches_step_by_step_driving() {
    let edges = [(0, 1, 2.0), (1, 2, 3.0), (0, 2, 10.0), (2, 3, 1.0)];
    for workers in 1..=3 {
        let fragments = partition_edges(&[0, 1, 2, 3, 4], &edges, workers).unwrap();
        let mut c: Sssp = Coordinator::new(fragments, &config(2)).unwrap();
        let outcome = c.run(sssp_program(0)).unwrap();
        let values: Vec<_> = outcome.snapshot.iter().collect();
        assert_eq!(
            values,
            vec![(0, 0.0), (1, 2.0), (2, 5.0), (3, 6.0), (4, f64::INFINITY)],
            "workers = {workers}"
        );
        assert_eq!(outcome.metrics.per_worker.len(), workers);
        assert_eq!(outcome.metrics.epochs, outcome.epochs);
    }
}

#[test]
fn chain_needs_one_epoch_per_hop() {
    for workers in [1, 2, 3] {
        let mut c = chain(12, workers, &config(2));
        let outcome = c.run(sssp_program(0)).unwrap();
        assert_eq!(outcome.epochs, 13, "workers = {workers}");
        assert_eq!(outcome.snapshot.get(12), Some(12.0));
    }
}

#[test]
fn epoch_limit_aborts_non_converged_runs() {
    let mut c = chain(10, 2, &config(1).with_max_epochs(Some(5)));
    match c.run(sssp_program(0)) {
        Err(Error::EpochLimitExceeded(5)) => {}
        other => panic!("unexpected result: {other:?}"),
    }

    let mut c = chain(10, 2, &config(1).with_max_epochs(Some(11)));
    assert_eq!(c.run(sssp_program(0)).unwrap().epochs, 11);
}

#[test]
fn cancellation_is_observed_between_barriers() {
    let mut c = chain(5, 2, &config(1));
    let program = sssp_program(0);
    let cancel = c.cancel_handle();

    c.peval(&program).unwrap();
    assert_eq!(c.barrier().unwrap(), Decision::Continue);
    cancel.cancel();
    assert!(matches!(c.inc_eval(&program), Err(Error::Aborted { epoch: 1 })));
    assert_eq!(c.state(), ProgramState::Failed);
    assert_eq!(c.epoch(), 0);

    let mut c = chain(5, 1, &config(1));
    c.cancel_handle().cancel();
    assert!(matches!(c.run(sssp_program(0)), Err(Error::Aborted { epoch: 0 })));
}

#[test]
fn out_of_order_calls_are_invalid_transitions() {
    let mut c = chain(2, 1, &config(1));
    let program = sssp_program(0);

    assert!(matches!(
        c.barrier(),
        Err(Error::InvalidState { from: "Uninitialized", to: "barrier" })
    ));
    assert!(matches!(
        c.inc_eval(&program),
        Err(Error::InvalidState { from: "Uninitialized", .. })
    ));

    c.peval(&program).unwrap();
    assert!(matches!(
        c.peval(&program),
        Err(Error::InvalidState { from: "PEval", to: "PEval" })
    ));
    assert!(matches!(
        c.inc_eval(&program),
        Err(Error::InvalidState { from: "PEval", to: "IncEval" })
    ));

    while c.barrier().unwrap() == Decision::Continue {
        c.inc_eval(&program).unwrap();
    }
    assert!(matches!(c.inc_eval(&program), Err(Error::InvalidState { from: "Done", .. })));
    assert!(matches!(c.barrier(), Err(Error::InvalidState { from: "Done", .. })));
}

#[test]
fn mismatched_fragments_are_rejected() {
    let fragments = partition_edges(&[0, 1], &[(0, 1, 1.0)], 2).unwrap();
    let reversed: Vec<_> = fragments.into_iter().rev().collect();
    assert!(matches!(
        Sssp::new(reversed, &config(1)),
        Err(Error::InvalidFragment(_))
    ));
    assert!(Sssp::new(Vec::new(), &config(1)).is_err());
}

type Ctx<'a> = EvalContext<'a, CsrFragment<f64>, f64, Min>;

fn keep_going(_: &(), ctx: &Ctx<'_>) -> grape::Result<()> {
    ctx.force_continue();
    Ok(())
}

fn fail_on_worker_one(_: &(), ctx: &Ctx<'_>) -> grape::Result<()> {
    if ctx.worker() == 1 {
        return Err(ctx.fail(ProgramError::Custom("boom".into())));
    }
    Ok(())
}

fn panic_in_vertex(_: &(), ctx: &Ctx<'_>) -> grape::Result<()> {
    ctx.for_each_inner(|v, _| {
        assert!(v != 1, "vertex 1 is cursed");
        Ok(())
    })
}

#[test]
fn program_errors_name_worker_and_epoch() {
    let mut c = chain(4, 2, &config(1));
    let program = VertexProgram {
        name: "failing",
        params: (),
        init: keep_going,
        step: fail_on_worker_one,
    };
    match c.run(program) {
        Err(Error::ProgramLogic {
            worker: 1,
            epoch: 1,
            source: ProgramError::Custom(msg),
        }) => assert_eq!(msg, "boom"),
        other => panic!("unexpected result: {other:?}"),
    }
}

#[test]
fn vertex_panics_become_program_errors() {
    let mut c = chain(4, 1, &config(2));
    let program = VertexProgram {
        name: "panicking",
        params: (),
        init: panic_in_vertex,
        step: keep_going,
    };
    assert!(matches!(
        c.run(program),
        Err(Error::ProgramLogic {
            worker: 0,
            epoch: 0,
            source: ProgramError::Panicked { .. },
        })
    ));
}

#[test]
fn negative_weights_are_rejected() {
    let fragments = partition_edges(&[0, 1, 2], &[(0, 1, 1.0), (1, 2, -1.0)], 1).unwrap();
    let mut c: Sssp = Coordinator::new(fragments, &config(1)).unwrap();
    assert!(matches!(
        c.run(sssp_program(0)),
        Err(Error::ProgramLogic {
            epoch: 1,
            source: ProgramError::InvalidValue { .. },
            ..
        })
    ));
}

#[test]
fn failed_epoch_ends_the_computation() {
    let mut c = chain(4, 2, &config(1));
    let program = VertexProgram {
        name: "failing",
        params: (),
        init: keep_going,
        step: fail_on_worker_one,
    };

    c.peval(&program).unwrap();
    assert_eq!(c.barrier().unwrap(), Decision::Continue);
    assert!(matches!(
        c.inc_eval(&program),
        Err(Error::ProgramLogic { worker: 1, epoch: 1, .. })
    ));
    assert_eq!(c.state(), ProgramState::Failed);
    assert_eq!(c.epoch(), 0, "a failed epoch is not committed");

    assert!(matches!(
        c.inc_eval(&program),
        Err(Error::InvalidState { from: "Failed", to: "IncEval" })
    ));
    assert!(matches!(
        c.barrier(),
        Err(Error::InvalidState { from: "Failed", to: "barrier" })
    ));
    assert!(matches!(
        c.peval(&program),
        Err(Error::InvalidState { from: "Failed", to: "PEval" })
    ));
}

struct RejectingTransport;

impl Transport<f64> for RejectingTransport {
    fn send(&self, destination: WorkerId, _: MessageBatch<f64>) -> grape::Result<()> {
        Err(Error::MessageDelivery {
            worker: destination,
            reason: "link down".into(),
        })
    }

    fn drain(&self, _: WorkerId) -> grape::Result<Vec<MessageBatch<f64>>> {
        Ok(Vec::new())
    }
}

#[test]
fn failed_barrier_ends_the_computation() {
    let mut c: Sssp =
        Coordinator::with_transport(two_fragments(), &config(1), Box::new(RejectingTransport))
            .unwrap();
    let program = sssp_program(0);

    c.peval(&program).unwrap();
    assert!(matches!(
        c.barrier(),
        Err(Error::MessageDelivery { worker: 1, .. })
    ));
    assert_eq!(c.state(), ProgramState::Failed);
    assert!(matches!(
        c.barrier(),
        Err(Error::InvalidState { from: "Failed", .. })
    ));
    assert!(matches!(
        c.inc_eval(&program),
        Err(Error::InvalidState { from: "Failed", .. })
    ));
}

/// Delays every hand-off so its cost shows up in the send timings.
struct SlowTransport {
    inner: LocalTransport<f64>,
}

impl Transport<f64> for SlowTransport {
    fn send(&self, destination: WorkerId, batch: MessageBatch<f64>) -> grape::Result<()> {
        thread::sleep(Duration::from_millis(20));
        self.inner.send(destination, batch)
    }

    fn drain(&self, worker: WorkerId) -> grape::Result<Vec<MessageBatch<f64>>> {
        self.inner.drain(worker)
    }
}

#[test]
fn send_timings_include_the_transport_hand_off() {
    let transport = SlowTransport {
        inner: LocalTransport::new(2),
    };
    let mut c: Sssp =
        Coordinator::with_transport(two_fragments(), &config(1), Box::new(transport)).unwrap();
    c.peval(&sssp_program(0)).unwrap();
    c.barrier().unwrap();

    let metrics = c.outcome().metrics;
    assert!(metrics.per_worker[0].timings.send >= Duration::from_millis(20));
    let total = metrics.total_timings();
    assert!(total.send >= metrics.per_worker[0].timings.send);
    assert_eq!(
        total.total(),
        metrics.per_worker.iter().map(|w| w.timings.total()).sum::<Duration>()
    );
}

#[test]
fn every_worker_gets_one_channel_per_thread() {
    let c = chain(8, 3, &config(4));
    for w in 0..c.workers() {
        assert_eq!(c.message_manager(w).channel_count(), 4);
    }
}

#[test]
fn values_never_get_worse_between_barriers() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let n = 300u64;
    let edges: Vec<(u64, u64, f64)> = (0..1500)
        .map(|_| (rng.gen_range(0..n), rng.gen_range(0..n), rng.gen_range(0.0..10.0)))
        .collect();
    let vertices: Vec<u64> = (0..n).collect();
    let fragments = partition_edges(&vertices, &edges, 3).unwrap();
    let mut c: Sssp = Coordinator::new(fragments, &config(2)).unwrap();
    let program = sssp_program(0);

    c.peval(&program).unwrap();
    let mut previous = c.outcome().snapshot;
    let mut barriers = 0;
    loop {
        let decision = c.barrier().unwrap();
        barriers += 1;
        let current = c.outcome().snapshot;
        for (gid, value) in current.iter() {
            let before = previous.get(gid).unwrap();
            assert!(value <= before, "vertex {gid} went from {before} to {value}");
        }
        previous = current;
        if decision == Decision::Done {
            break;
        }
        c.inc_eval(&program).unwrap();
    }
    assert!(barriers >= 2);
}
