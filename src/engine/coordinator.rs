//! The superstep coordinator.
//!
//! Drives `PEval`, then `(barrier, IncEval)*`, across every worker until a
//! barrier finds no active vertex and no raised force-continue anywhere.
//! Each phase runs all workers concurrently, one OS thread per worker, and
//! joins them before the next phase starts, so no worker computes epoch
//! `n + 1` before every worker has received epoch `n`'s messages.
//!
//! A barrier does, in order: flush every worker's per-thread buffers, hand
//! the batches to the transport, drain and deliver each worker's inbound
//! batches (marking `next`), swap every active set, then decide.

use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::active_set::ActiveSet;
use super::aggregation::{AggregationStore, Aggregator};
use super::message::{DeliveryStats, MessageBatch, MessageManager};
use super::metrics::{timed, RunMetrics, WorkerMetrics};
use super::program::{EvalContext, EvalFn, ProgramState, VertexProgram};
use super::transport::{LocalTransport, Transport};
use crate::concurrency::atomic::AtomicValue;
use crate::concurrency::scoped::{ParallelScheduler, ThreadGroup};
use crate::config::EngineConfig;
use crate::error::{Error, ProgramError, Result};
use crate::graph::{Fragment, GlobalId, WorkerId};

/// Outcome of a barrier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Some worker has active vertices or raised force-continue.
    Continue,
    /// Global quiescence.
    Done,
}

/// Final value of every vertex, keyed by global id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot<T> {
    values: BTreeMap<GlobalId, T>,
}

impl<T: Copy> Snapshot<T> {
    /// Value of `gid`, if some fragment owns it.
    pub fn get(&self, gid: GlobalId) -> Option<T> {
        self.values.get(&gid).copied()
    }

    /// Number of vertices.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns `true` if there are no vertices.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// `(gid, value)` pairs in ascending gid order.
    pub fn iter(&self) -> impl Iterator<Item = (GlobalId, T)> + '_ {
        self.values.iter().map(|(&gid, &value)| (gid, value))
    }
}

/// What a finished run hands back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunOutcome<T> {
    /// Final values.
    pub snapshot: Snapshot<T>,
    /// Timings and counters.
    pub metrics: RunMetrics,
    /// Epochs executed, including the initial evaluation.
    pub epochs: u64,
}

/// Requests an abort from another thread.
///
/// The request is observed between barriers only; a running epoch always
/// completes first.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    flag: Arc<AtomicBool>,
}

impl CancelHandle {
    /// Requests cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns `true` once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Everything one worker owns.
struct Worker<F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    fragment: F,
    store: AggregationStore<T, A>,
    active: ActiveSet,
    messages: MessageManager<T, A>,
    scheduler: ParallelScheduler,
    metrics: WorkerMetrics,
}

impl<F, T, A> Worker<F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    fn new(fragment: F, threads: usize, coalesce: bool) -> Result<Self> {
        let worker = fragment.worker_id();
        let mut messages = MessageManager::new(worker, fragment.num_workers(), coalesce);
        messages.init_channels(threads);
        Ok(Self {
            store: AggregationStore::new(fragment.vertex_count()),
            active: ActiveSet::new(fragment.inner_vertex_count()),
            messages,
            scheduler: ParallelScheduler::new(worker, threads)?,
            metrics: WorkerMetrics {
                worker,
                ..WorkerMetrics::default()
            },
            fragment,
        })
    }

    fn evaluate<P>(&mut self, eval: EvalFn<P, F, T, A>, params: &P, epoch: u64) -> Result<()> {
        self.scheduler.set_epoch(epoch);
        let Self {
            fragment,
            store,
            active,
            messages,
            scheduler,
            metrics,
        } = self;
        let ctx = EvalContext::new(
            &*fragment,
            &*store,
            &*active,
            &*messages,
            &*scheduler,
            epoch,
        );
        timed(&mut metrics.timings.compute, || eval(params, &ctx))
    }

    fn flush(&mut self, transport: &dyn Transport<T>, epoch: u64) -> Result<()> {
        let Self {
            messages, metrics, ..
        } = self;
        timed(&mut metrics.timings.send, || {
            for batch in messages.flush(epoch) {
                transport.send(batch.to, batch)?;
            }
            Ok(())
        })
    }

    fn receive(&mut self, inbound: &[MessageBatch<T>]) -> Result<DeliveryStats> {
        let Self {
            fragment,
            store,
            active,
            messages,
            scheduler,
            metrics,
        } = self;
        let stats = timed(&mut metrics.timings.receive, || {
            messages.deliver(inbound, &*fragment, &*store, &*active, &*scheduler)
        })?;
        metrics.messages_received += stats.received as u64;
        metrics.messages_applied += stats.applied as u64;
        Ok(stats)
    }
}

/// Drives a vertex program over a set of fragments.
pub struct Coordinator<F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    workers: Vec<Worker<F, T, A>>,
    group: ThreadGroup,
    transport: Box<dyn Transport<T>>,
    threads: usize,
    max_epochs: Option<u64>,
    cancel: CancelHandle,
    state: ProgramState,
    epoch: u64,
    synchronized: bool,
}

impl<F, T, A> Coordinator<F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    /// Creates a coordinator over `fragments` with an in-process transport.
    ///
    /// Fragment `i` must report `worker_id() == i` and
    /// `num_workers() == fragments.len()`.
    pub fn new(fragments: Vec<F>, config: &EngineConfig) -> Result<Self> {
        let n = fragments.len();
        Self::with_transport(fragments, config, Box::new(LocalTransport::new(n)))
    }

    /// Creates a coordinator using `transport` to move batches between workers.
    pub fn with_transport(
        fragments: Vec<F>,
        config: &EngineConfig,
        transport: Box<dyn Transport<T>>,
    ) -> Result<Self> {
        config.validate()?;
        if fragments.is_empty() {
            return Err(Error::InvalidFragment("no fragments".into()));
        }
        let n = fragments.len();
        for (i, fragment) in fragments.iter().enumerate() {
            if fragment.worker_id() != i || fragment.num_workers() != n {
                return Err(Error::InvalidFragment(format!(
                    "fragment at position {i} reports worker {} of {} (expected {i} of {n})",
                    fragment.worker_id(),
                    fragment.num_workers()
                )));
            }
        }
        let threads = config.effective_threads();
        let workers = fragments
            .into_iter()
            .map(|f| Worker::new(f, threads, config.coalesce_messages))
            .collect::<Result<_>>()?;
        Ok(Self {
            workers,
            group: ThreadGroup::new("grape-worker", n)?,
            transport,
            threads,
            max_epochs: config.max_epochs,
            cancel: CancelHandle::default(),
            state: ProgramState::Uninitialized,
            epoch: 0,
            synchronized: false,
        })
    }

    /// Handle that aborts this coordinator's run at the next barrier.
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Number of workers.
    pub fn workers(&self) -> usize {
        self.workers.len()
    }

    /// Scheduler threads per worker.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ProgramState {
        self.state
    }

    /// Most recently completed epoch.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// `worker`'s aggregation store.
    ///
    /// # Panics
    /// Panics if `worker` is out of range.
    pub fn store(&self, worker: WorkerId) -> &AggregationStore<T, A> {
        &self.workers[worker].store
    }

    /// `worker`'s active set.
    ///
    /// # Panics
    /// Panics if `worker` is out of range.
    pub fn active_set(&self, worker: WorkerId) -> &ActiveSet {
        &self.workers[worker].active
    }

    /// `worker`'s message manager.
    ///
    /// # Panics
    /// Panics if `worker` is out of range.
    pub fn message_manager(&self, worker: WorkerId) -> &MessageManager<T, A> {
        &self.workers[worker].messages
    }

    /// `worker`'s fragment.
    ///
    /// # Panics
    /// Panics if `worker` is out of range.
    pub fn fragment(&self, worker: WorkerId) -> &F {
        &self.workers[worker].fragment
    }

    /// Runs the initial evaluation (epoch 0) on every worker.
    ///
    /// Any error other than [`Error::InvalidState`] leaves the coordinator in
    /// [`ProgramState::Failed`], as do the errors of [`barrier`](Self::barrier)
    /// and [`inc_eval`](Self::inc_eval).
    pub fn peval<P: Sync>(&mut self, program: &VertexProgram<P, F, T, A>) -> Result<()> {
        if self.state != ProgramState::Uninitialized {
            return Err(self.invalid(ProgramState::PEval));
        }
        let result = self.evaluate_all(program.init, &program.params, 0);
        self.settle(result)?;
        self.state = ProgramState::PEval;
        self.synchronized = false;
        Ok(())
    }

    /// Exchanges messages, swaps active sets and decides termination.
    pub fn barrier(&mut self) -> Result<Decision> {
        if !matches!(self.state, ProgramState::PEval | ProgramState::IncEval) || self.synchronized {
            return Err(Error::InvalidState {
                from: self.state.name(),
                to: "barrier",
            });
        }
        let result = self.exchange();
        let decision = self.settle(result)?;
        self.synchronized = true;
        if decision == Decision::Done {
            self.state = ProgramState::Done;
        }
        Ok(decision)
    }

    /// Runs one incremental evaluation on every worker.
    pub fn inc_eval<P: Sync>(&mut self, program: &VertexProgram<P, F, T, A>) -> Result<()> {
        let ready = matches!(self.state, ProgramState::PEval | ProgramState::IncEval);
        if !ready || !self.synchronized {
            return Err(self.invalid(ProgramState::IncEval));
        }
        let epoch = self.epoch + 1;
        let result = self.evaluate_all(program.step, &program.params, epoch);
        self.settle(result)?;
        self.epoch = epoch;
        self.state = ProgramState::IncEval;
        self.synchronized = false;
        Ok(())
    }

    fn evaluate_all<P: Sync>(
        &mut self,
        eval: EvalFn<P, F, T, A>,
        params: &P,
        epoch: u64,
    ) -> Result<()> {
        self.check_cancelled(epoch)?;
        if let Some(limit) = self.max_epochs {
            // Epochs are zero-based: a limit of `n` allows `0..n`.
            if epoch >= limit {
                return Err(Error::EpochLimitExceeded(limit));
            }
        }
        across_workers(&self.group, &mut self.workers, epoch, |w| {
            w.evaluate(eval, params, epoch)
        })?;
        Ok(())
    }

    fn exchange(&mut self) -> Result<Decision> {
        let epoch = self.epoch;
        let transport = &*self.transport;

        across_workers(&self.group, &mut self.workers, epoch, |w| w.flush(transport, epoch))?;
        let stats = across_workers(&self.group, &mut self.workers, epoch, |w| {
            let inbound = transport.drain(w.fragment.worker_id())?;
            w.receive(&inbound)
        })?;

        let mut active = 0usize;
        let mut forced = false;
        for w in &mut self.workers {
            w.active.swap();
            active += w.active.current_count();
            forced |= w.messages.clear_force_continue();
        }

        let decision = if active == 0 && !forced {
            Decision::Done
        } else {
            Decision::Continue
        };
        debug!(
            epoch,
            active,
            forced,
            received = stats.iter().map(|s| s.received).sum::<usize>(),
            applied = stats.iter().map(|s| s.applied).sum::<usize>(),
            ?decision,
            "barrier"
        );
        Ok(decision)
    }

    /// A failed phase ends the computation.
    fn settle<R>(&mut self, result: Result<R>) -> Result<R> {
        if result.is_err() {
            self.state = ProgramState::Failed;
        }
        result
    }

    /// Runs `program` to global quiescence.
    pub fn run<P: Sync>(&mut self, program: VertexProgram<P, F, T, A>) -> Result<RunOutcome<T>> {
        info!(
            program = program.name,
            workers = self.workers.len(),
            threads = self.threads,
            "starting run"
        );
        match self.drive(&program) {
            Ok(()) => {
                let outcome = self.outcome();
                for w in &outcome.metrics.per_worker {
                    debug!(
                        worker = w.worker,
                        receive = ?w.timings.receive,
                        compute = ?w.timings.compute,
                        send = ?w.timings.send,
                        received = w.messages_received,
                        "worker phase timings"
                    );
                }
                info!(
                    program = program.name,
                    epochs = outcome.epochs,
                    messages_sent = outcome.metrics.messages_sent(),
                    compute = ?outcome.metrics.total_timings().compute,
                    "run finished"
                );
                Ok(outcome)
            }
            Err(err) => {
                warn!(program = program.name, epoch = self.epoch, error = %err, "run aborted");
                Err(err)
            }
        }
    }

    fn drive<P: Sync>(&mut self, program: &VertexProgram<P, F, T, A>) -> Result<()> {
        self.peval(program)?;
        while self.barrier()? == Decision::Continue {
            self.inc_eval(program)?;
        }
        Ok(())
    }

    /// Current values and metrics.
    pub fn outcome(&self) -> RunOutcome<T> {
        let mut values = BTreeMap::new();
        for w in &self.workers {
            let inner = w.fragment.inner_vertex_count();
            for (lid, value) in w.store.inner_snapshot(inner).into_iter().enumerate() {
                values.insert(w.fragment.global_id(lid), value);
            }
        }
        let epochs = if self.state == ProgramState::Uninitialized {
            0
        } else {
            self.epoch + 1
        };
        let per_worker = self
            .workers
            .iter()
            .map(|w| WorkerMetrics {
                messages_sent: w.messages.sent_count(),
                messages_coalesced: w.messages.coalesced_count(),
                ..w.metrics.clone()
            })
            .collect();
        RunOutcome {
            snapshot: Snapshot { values },
            metrics: RunMetrics { epochs, per_worker },
            epochs,
        }
    }

    fn check_cancelled(&self, next: u64) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Aborted { epoch: next });
        }
        Ok(())
    }

    fn invalid(&self, to: ProgramState) -> Error {
        Error::InvalidState {
            from: self.state.name(),
            to: to.name(),
        }
    }
}

impl<F, T, A> core::fmt::Debug for Coordinator<F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Coordinator")
            .field("workers", &self.workers.len())
            .field("threads", &self.threads)
            .field("state", &self.state)
            .field("epoch", &self.epoch)
            .finish_non_exhaustive()
    }
}

/// Runs `phase` on every worker, one group thread each, and joins them all.
///
/// Results come back in worker order; the first failure by worker index is
/// reported once every worker has finished.
fn across_workers<F, T, A, R, G>(
    group: &ThreadGroup,
    workers: &mut [Worker<F, T, A>],
    epoch: u64,
    phase: G,
) -> Result<Vec<R>>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
    R: Send,
    G: Fn(&mut Worker<F, T, A>) -> Result<R> + Sync,
{
    group
        .for_each_mut(workers, |_, w| guarded(w, epoch, &phase))?
        .into_iter()
        .collect()
}

fn guarded<F, T, A, R, G>(worker: &mut Worker<F, T, A>, epoch: u64, phase: &G) -> Result<R>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
    G: Fn(&mut Worker<F, T, A>) -> Result<R>,
{
    let id = worker.fragment.worker_id();
    panic::catch_unwind(AssertUnwindSafe(|| phase(worker))).unwrap_or_else(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_owned())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_owned());
        Err(Error::ProgramLogic {
            worker: id,
            epoch,
            source: ProgramError::Panicked { thread: 0, message },
        })
    })
}
