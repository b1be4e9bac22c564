//! The vertex-program contract.
//!
//! A program is a fixed pair of functions captured when a run starts: `init`
//! runs once as the initial evaluation (epoch 0) and `step` runs as every
//! incremental evaluation after it. Both receive the program's parameters and
//! an [`EvalContext`] bound to one worker.

use super::active_set::ActiveSet;
use super::aggregation::{AggregationStore, Aggregator};
use super::message::MessageManager;
use crate::concurrency::atomic::AtomicValue;
use crate::concurrency::scoped::ParallelScheduler;
use crate::error::{Error, ProgramError, Result};
use crate::graph::{Fragment, WorkerId};

/// Signature of both program callbacks.
pub type EvalFn<P, F, T, A> = fn(&P, &EvalContext<'_, F, T, A>) -> Result<()>;

/// A vertex program: parameters plus its two evaluation functions.
pub struct VertexProgram<P, F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    /// Name used in logs.
    pub name: &'static str,
    /// Program parameters (for example the source vertex).
    pub params: P,
    /// Initial evaluation.
    pub init: EvalFn<P, F, T, A>,
    /// Incremental evaluation.
    pub step: EvalFn<P, F, T, A>,
}

impl<P: Clone, F: Fragment, T: AtomicValue, A: Aggregator<T>> Clone for VertexProgram<P, F, T, A> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            params: self.params.clone(),
            init: self.init,
            step: self.step,
        }
    }
}

impl<P: core::fmt::Debug, F: Fragment, T: AtomicValue, A: Aggregator<T>> core::fmt::Debug
    for VertexProgram<P, F, T, A>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("VertexProgram")
            .field("name", &self.name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Lifecycle of a computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramState {
    /// Nothing has run yet.
    Uninitialized,
    /// The initial evaluation has run.
    PEval,
    /// At least one incremental evaluation has run.
    IncEval,
    /// Global quiescence was reached.
    Done,
    /// A phase returned an error; the computation cannot continue.
    Failed,
}

impl ProgramState {
    /// Name used in errors and logs.
    pub fn name(self) -> &'static str {
        match self {
            ProgramState::Uninitialized => "Uninitialized",
            ProgramState::PEval => "PEval",
            ProgramState::IncEval => "IncEval",
            ProgramState::Done => "Done",
            ProgramState::Failed => "Failed",
        }
    }
}

/// Everything a callback may touch on one worker during one epoch.
pub struct EvalContext<'a, F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    pub(crate) fragment: &'a F,
    pub(crate) store: &'a AggregationStore<T, A>,
    pub(crate) active: &'a ActiveSet,
    pub(crate) messages: &'a MessageManager<T, A>,
    pub(crate) scheduler: &'a ParallelScheduler,
    pub(crate) epoch: u64,
}

impl<'a, F, T, A> EvalContext<'a, F, T, A>
where
    F: Fragment,
    T: AtomicValue,
    A: Aggregator<T>,
{
    /// Binds a context to one worker's state.
    pub fn new(
        fragment: &'a F,
        store: &'a AggregationStore<T, A>,
        active: &'a ActiveSet,
        messages: &'a MessageManager<T, A>,
        scheduler: &'a ParallelScheduler,
        epoch: u64,
    ) -> Self {
        Self {
            fragment,
            store,
            active,
            messages,
            scheduler,
            epoch,
        }
    }

    /// The worker's fragment.
    #[inline]
    pub fn fragment(&self) -> &'a F {
        self.fragment
    }

    /// The worker's aggregation store.
    #[inline]
    pub fn store(&self) -> &'a AggregationStore<T, A> {
        self.store
    }

    /// The worker's active set.
    #[inline]
    pub fn active(&self) -> &'a ActiveSet {
        self.active
    }

    /// The worker's message manager.
    #[inline]
    pub fn messages(&self) -> &'a MessageManager<T, A> {
        self.messages
    }

    /// The worker's scheduler.
    #[inline]
    pub fn scheduler(&self) -> &'a ParallelScheduler {
        self.scheduler
    }

    /// Current epoch (0 for the initial evaluation).
    #[inline]
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Current worker.
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.fragment.worker_id()
    }

    /// Raises force-continue for this worker.
    #[inline]
    pub fn force_continue(&self) {
        self.messages.force_continue();
    }

    /// Runs `vertex_fn(vertex, thread)` over every currently active vertex.
    pub fn for_each_active<G>(&self, vertex_fn: G) -> Result<()>
    where
        G: Fn(usize, usize) -> core::result::Result<(), ProgramError> + Sync,
    {
        self.scheduler.for_each_active(self.active.current(), vertex_fn)
    }

    /// Runs `vertex_fn(vertex, thread)` over every inner vertex.
    pub fn for_each_inner<G>(&self, vertex_fn: G) -> Result<()>
    where
        G: Fn(usize, usize) -> core::result::Result<(), ProgramError> + Sync,
    {
        self.scheduler
            .for_each_index(self.fragment.inner_vertex_count(), vertex_fn)
    }

    /// Offers `candidate` to `lid` and propagates an improvement.
    ///
    /// An improved inner vertex is marked for the next epoch; an improved outer
    /// vertex is synced to its owner through `thread`'s channel. Returns
    /// whether the slot improved.
    #[inline]
    pub fn relax(
        &self,
        lid: usize,
        candidate: T,
        thread: usize,
    ) -> core::result::Result<bool, ProgramError> {
        if !self.store.try_compare_and_improve(lid, candidate)? {
            return Ok(false);
        }
        if self.fragment.is_inner(lid) {
            self.active.mark(lid);
        } else {
            self.messages
                .sync_state_on_outer_vertex(self.fragment, lid, candidate, thread)?;
        }
        Ok(true)
    }

    /// Wraps a callback failure with this worker and epoch.
    pub fn fail(&self, source: ProgramError) -> Error {
        Error::ProgramLogic {
            worker: self.worker(),
            epoch: self.epoch,
            source,
        }
    }
}
