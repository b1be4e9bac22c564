//! Per-run phase timing and message counters.
//!
//! These live on the per-run context and are handed back with the outcome.
//! They are advisory instrumentation only.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::graph::WorkerId;

/// Accumulated wall time per phase for one worker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTimings {
    /// Applying inbound messages.
    pub receive: Duration,
    /// Running program callbacks.
    pub compute: Duration,
    /// Merging per-thread buffers and handing batches to the transport.
    pub send: Duration,
}

impl PhaseTimings {
    /// Sum of all phases.
    pub fn total(&self) -> Duration {
        self.receive + self.compute + self.send
    }
}

/// Runs `f` and adds its wall time to `slot`.
#[inline]
pub fn timed<R>(slot: &mut Duration, f: impl FnOnce() -> R) -> R {
    let start = Instant::now();
    let out = f();
    *slot += start.elapsed();
    out
}

/// Counters for one worker over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerMetrics {
    /// Worker index.
    pub worker: WorkerId,
    /// Phase timings.
    pub timings: PhaseTimings,
    /// Messages handed to the transport.
    pub messages_sent: u64,
    /// Messages dropped as dominated before sending.
    pub messages_coalesced: u64,
    /// Messages received.
    pub messages_received: u64,
    /// Received messages that improved a slot.
    pub messages_applied: u64,
}

/// Metrics for a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunMetrics {
    /// Epochs executed, including the initial evaluation.
    pub epochs: u64,
    /// One entry per worker.
    pub per_worker: Vec<WorkerMetrics>,
}

impl RunMetrics {
    /// Messages sent by all workers.
    pub fn messages_sent(&self) -> u64 {
        self.per_worker.iter().map(|w| w.messages_sent).sum()
    }

    /// Messages coalesced by all workers.
    pub fn messages_coalesced(&self) -> u64 {
        self.per_worker.iter().map(|w| w.messages_coalesced).sum()
    }

    /// Phase timings summed over workers.
    pub fn total_timings(&self) -> PhaseTimings {
        self.per_worker.iter().fold(PhaseTimings::default(), |acc, w| PhaseTimings {
            receive: acc.receive + w.timings.receive,
            compute: acc.compute + w.timings.compute,
            send: acc.send + w.timings.send,
        })
    }
}
