//! The transport seam between workers.
//!
//! The coordinator pushes every outbound batch with [`Transport::send`] and then,
//! once per barrier, drains each worker's inbound queue with
//! [`Transport::drain`]. Delivery is assumed at-least-once; duplicates are safe
//! because delivery is idempotent.

use parking_lot::Mutex;

use super::message::MessageBatch;
use crate::error::{Error, Result};
use crate::graph::WorkerId;

/// Moves message batches between workers.
pub trait Transport<T>: Send + Sync {
    /// Queues `batch` for `destination`.
    fn send(&self, destination: WorkerId, batch: MessageBatch<T>) -> Result<()>;

    /// Removes and returns everything queued for `worker`.
    fn drain(&self, worker: WorkerId) -> Result<Vec<MessageBatch<T>>>;
}

/// In-process transport with one queue per worker.
#[derive(Debug)]
pub struct LocalTransport<T> {
    queues: Vec<Mutex<Vec<MessageBatch<T>>>>,
}

impl<T> LocalTransport<T> {
    /// Creates queues for `num_workers` workers.
    pub fn new(num_workers: usize) -> Self {
        Self {
            queues: (0..num_workers).map(|_| Mutex::new(Vec::new())).collect(),
        }
    }

    /// Number of batches currently queued for `worker`.
    pub fn pending(&self, worker: WorkerId) -> usize {
        self.queues.get(worker).map_or(0, |q| q.lock().len())
    }

    fn queue(&self, worker: WorkerId) -> Result<&Mutex<Vec<MessageBatch<T>>>> {
        self.queues.get(worker).ok_or_else(|| Error::MessageDelivery {
            worker,
            reason: format!("no such worker (have {})", self.queues.len()),
        })
    }
}

impl<T: Send> Transport<T> for LocalTransport<T> {
    fn send(&self, destination: WorkerId, batch: MessageBatch<T>) -> Result<()> {
        self.queue(destination)?.lock().push(batch);
        Ok(())
    }

    fn drain(&self, worker: WorkerId) -> Result<Vec<MessageBatch<T>>> {
        Ok(core::mem::take(&mut *self.queue(worker)?.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(to: WorkerId) -> MessageBatch<u64> {
        MessageBatch {
            from: 0,
            to,
            epoch: 0,
            messages: Vec::new(),
        }
    }

    #[test]
    fn drain_empties_only_the_drained_queue() {
        let t = LocalTransport::new(2);
        t.send(1, batch(1)).unwrap();
        t.send(1, batch(1)).unwrap();
        t.send(0, batch(0)).unwrap();
        assert_eq!(t.pending(1), 2);

        assert_eq!(t.drain(1).unwrap().len(), 2);
        assert_eq!(t.pending(1), 0);
        assert_eq!(t.pending(0), 1);
    }

    #[test]
    fn unknown_workers_are_delivery_errors() {
        let t = LocalTransport::<u64>::new(1);
        assert!(matches!(t.send(3, batch(3)), Err(Error::MessageDelivery { worker: 3, .. })));
        assert!(t.drain(3).is_err());
        assert_eq!(t.pending(3), 0);
    }
}
