//! Cross-fragment message buffering, merging, and delivery.
//!
//! Producers write into a per-thread channel (one per scheduler thread), so the
//! hot path never contends on a shared lock. At the barrier the coordinator
//! takes `&mut` access, merges all thread channels into one batch per
//! destination worker, and hands the batches to the transport. On the receiving
//! side, `deliver` applies each message through compare-and-improve and marks
//! the touched inner vertices in the next active set.

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use super::active_set::ActiveSet;
use super::aggregation::{AggregationStore, Aggregator};
use crate::concurrency::atomic::AtomicValue;
use crate::concurrency::scoped::ParallelScheduler;
use crate::error::{Error, ProgramError, Result};
use crate::graph::{Fragment, GlobalId, WorkerId};

/// A value addressed to a vertex owned by another worker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Message<T> {
    /// Destination vertex, by global id.
    pub gid: GlobalId,
    /// Value to aggregate into the destination slot.
    pub payload: T,
    /// Program-defined kind; coalescing never merges different tags.
    pub tag: u32,
}

/// All messages from one worker to another for one epoch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageBatch<T> {
    /// Sending worker.
    pub from: WorkerId,
    /// Receiving worker.
    pub to: WorkerId,
    /// Epoch in which the messages were produced.
    pub epoch: u64,
    /// Payloads.
    pub messages: Vec<Message<T>>,
}

/// Counters from one delivery.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryStats {
    /// Messages received.
    pub received: usize,
    /// Messages that improved their destination slot.
    pub applied: usize,
}

/// Outbound buffer for one destination worker.
#[derive(Debug)]
struct Outbox<T> {
    messages: Vec<Message<T>>,
    index: FxHashMap<(GlobalId, u32), usize>,
}

impl<T: AtomicValue> Outbox<T> {
    fn new() -> Self {
        Self {
            messages: Vec::new(),
            index: FxHashMap::default(),
        }
    }

    /// Buffers `msg`; returns `true` if it was folded into an existing entry.
    fn push<A: Aggregator<T>>(&mut self, msg: Message<T>, coalesce: bool) -> bool {
        if !coalesce {
            self.messages.push(msg);
            return false;
        }
        match self.index.get(&(msg.gid, msg.tag)) {
            Some(&i) => {
                let slot = &mut self.messages[i];
                slot.payload = A::better(slot.payload, msg.payload);
                true
            }
            None => {
                self.index.insert((msg.gid, msg.tag), self.messages.len());
                self.messages.push(msg);
                false
            }
        }
    }

    fn take(&mut self) -> Vec<Message<T>> {
        self.index.clear();
        core::mem::take(&mut self.messages)
    }

    fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// One scheduler thread's outbound buffers, indexed by destination worker.
#[derive(Debug)]
struct ThreadChannel<T> {
    outboxes: Vec<Outbox<T>>,
}

impl<T: AtomicValue> ThreadChannel<T> {
    fn new(num_workers: usize) -> Self {
        Self {
            outboxes: (0..num_workers).map(|_| Outbox::new()).collect(),
        }
    }
}

/// Buffers and routes messages for one worker.
pub struct MessageManager<T: AtomicValue, A: Aggregator<T>> {
    worker: WorkerId,
    num_workers: usize,
    coalesce: bool,
    channels: Vec<CachePadded<Mutex<ThreadChannel<T>>>>,
    force_continue: AtomicBool,
    sent: AtomicU64,
    coalesced: AtomicU64,
    _aggregator: PhantomData<fn() -> A>,
}

impl<T: AtomicValue, A: Aggregator<T>> MessageManager<T, A> {
    /// Creates a manager for `worker` with one channel.
    ///
    /// # Panics
    /// Panics if `worker >= num_workers`.
    pub fn new(worker: WorkerId, num_workers: usize, coalesce: bool) -> Self {
        assert!(worker < num_workers, "worker {worker} out of range for {num_workers} workers");
        let mut mm = Self {
            worker,
            num_workers,
            coalesce,
            channels: Vec::new(),
            force_continue: AtomicBool::new(false),
            sent: AtomicU64::new(0),
            coalesced: AtomicU64::new(0),
            _aggregator: PhantomData,
        };
        mm.init_channels(1);
        mm
    }

    /// Allocates one channel per scheduler thread, dropping anything buffered.
    ///
    /// # Panics
    /// Panics if `threads == 0`.
    pub fn init_channels(&mut self, threads: usize) {
        assert!(threads != 0, "threads must be > 0");
        self.channels = (0..threads)
            .map(|_| CachePadded::new(Mutex::new(ThreadChannel::new(self.num_workers))))
            .collect();
    }

    /// Number of per-thread channels.
    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Worker this manager belongs to.
    #[inline]
    pub fn worker(&self) -> WorkerId {
        self.worker
    }

    /// Buffers a message for `dst_worker` on `thread`'s channel.
    ///
    /// # Panics
    /// Panics if `dst_worker` or `thread` is out of range.
    pub fn send(&self, dst_worker: WorkerId, gid: GlobalId, payload: T, tag: u32, thread: usize) {
        assert!(dst_worker < self.num_workers, "worker {dst_worker} out of range");
        let mut channel = self.channels[thread].lock();
        let message = Message { gid, payload, tag };
        let folded = channel.outboxes[dst_worker].push::<A>(message, self.coalesce);
        if folded {
            self.coalesced.fetch_add(1, Ordering::Relaxed);
        } else {
            self.sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Sends the value of outer vertex `lid` to the worker that owns it.
    pub fn sync_state_on_outer_vertex<F: Fragment>(
        &self,
        fragment: &F,
        lid: usize,
        payload: T,
        thread: usize,
    ) -> core::result::Result<(), ProgramError> {
        if lid >= fragment.vertex_count() {
            return Err(ProgramError::VertexOutOfRange {
                vertex: lid,
                len: fragment.vertex_count(),
            });
        }
        if !fragment.is_outer(lid) {
            return Err(ProgramError::InvalidValue {
                vertex: lid,
                reason: "state sync target is not an outer vertex".into(),
            });
        }
        self.send(fragment.owner(lid), fragment.global_id(lid), payload, 0, thread);
        Ok(())
    }

    /// Raises the force-continue flag for the current epoch.
    #[inline]
    pub fn force_continue(&self) {
        self.force_continue.store(true, Ordering::Release);
    }

    /// Returns `true` if force-continue was raised since it was last cleared.
    #[inline]
    pub fn is_force_continue_raised(&self) -> bool {
        self.force_continue.load(Ordering::Acquire)
    }

    /// Clears the force-continue flag, returning its previous value.
    ///
    /// Takes `&mut self`: only the coordinator may clear, between epochs.
    pub fn clear_force_continue(&mut self) -> bool {
        core::mem::replace(self.force_continue.get_mut(), false)
    }

    /// Messages buffered (after coalescing) since creation.
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Messages folded into an already-buffered message since creation.
    pub fn coalesced_count(&self) -> u64 {
        self.coalesced.load(Ordering::Relaxed)
    }

    /// Returns `true` if no channel holds a buffered message.
    pub fn is_outbound_empty(&mut self) -> bool {
        self.channels
            .iter_mut()
            .all(|c| c.get_mut().outboxes.iter().all(Outbox::is_empty))
    }

    /// Merges the per-thread channels into one batch per destination worker.
    ///
    /// Destinations with no messages produce no batch.
    pub fn flush(&mut self, epoch: u64) -> Vec<MessageBatch<T>> {
        let mut batches = Vec::new();
        for dst in 0..self.num_workers {
            let mut merged = Outbox::new();
            let mut folded = 0u64;
            for channel in &mut self.channels {
                for msg in channel.get_mut().outboxes[dst].take() {
                    if merged.push::<A>(msg, self.coalesce) {
                        folded += 1;
                    }
                }
            }
            if folded > 0 {
                // Folded across threads: no longer counted as sent.
                *self.sent.get_mut() -= folded;
                *self.coalesced.get_mut() += folded;
            }
            if !merged.is_empty() {
                batches.push(MessageBatch {
                    from: self.worker,
                    to: dst,
                    epoch,
                    messages: merged.take(),
                });
            }
        }
        batches
    }

    /// Applies inbound batches to `store` and marks improved inner vertices in
    /// `active`'s next buffer.
    ///
    /// Applying the same message twice is harmless: the second application
    /// cannot improve the slot again.
    pub fn deliver<F: Fragment>(
        &self,
        batches: &[MessageBatch<T>],
        fragment: &F,
        store: &AggregationStore<T, A>,
        active: &ActiveSet,
        scheduler: &ParallelScheduler,
    ) -> Result<DeliveryStats> {
        let mut resolved = Vec::with_capacity(batches.iter().map(|b| b.messages.len()).sum());
        for batch in batches {
            if batch.to != self.worker {
                return Err(Error::MessageDelivery {
                    worker: self.worker,
                    reason: format!(
                        "batch from worker {} addressed to worker {}",
                        batch.from, batch.to
                    ),
                });
            }
            for msg in &batch.messages {
                let lid = fragment.resolve_inner(msg.gid).ok_or_else(|| Error::MessageDelivery {
                    worker: self.worker,
                    reason: format!("vertex {} is not inner to this fragment", msg.gid),
                })?;
                resolved.push((lid, msg.payload));
            }
        }

        let applied = AtomicUsize::new(0);
        scheduler.for_each_index(resolved.len(), |i, _tid| {
            let (lid, payload) = resolved[i];
            if store.compare_and_improve(lid, payload) {
                active.mark(lid);
                applied.fetch_add(1, Ordering::Relaxed);
            }
            Ok(())
        })?;

        Ok(DeliveryStats {
            received: resolved.len(),
            applied: applied.into_inner(),
        })
    }
}

impl<T: AtomicValue, A: Aggregator<T>> core::fmt::Debug for MessageManager<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MessageManager")
            .field("worker", &self.worker)
            .field("num_workers", &self.num_workers)
            .field("channels", &self.channels.len())
            .field("force_continue", &self.is_force_continue_raised())
            .finish()
    }
}
