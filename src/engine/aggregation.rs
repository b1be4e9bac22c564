//! Shared per-vertex accumulators with atomic compare-and-improve.
//!
//! One slot exists per inner *and* outer vertex. Outer slots cache the last value
//! sent for that vertex, so a relaxation that does not improve it produces no
//! message.

use core::marker::PhantomData;
use core::sync::atomic::Ordering;

use crossbeam_utils::Backoff;

use crate::concurrency::atomic::{AtomicCell, AtomicValue};
use crate::error::ProgramError;

/// A monotone ordering used to decide whether a candidate replaces a value.
///
/// `improves` must be a strict order: irreflexive and transitive. Values that are
/// unordered (NaN) never improve anything.
pub trait Aggregator<T: AtomicValue>: Send + Sync + 'static {
    /// Value every slot starts with; nothing is worse.
    fn identity() -> T;

    /// Returns `true` if `candidate` is strictly better than `current`.
    fn improves(candidate: T, current: T) -> bool;

    /// Returns the better of two values.
    #[inline]
    fn better(a: T, b: T) -> T {
        if Self::improves(b, a) {
            b
        } else {
            a
        }
    }
}

/// Minimisation: smaller is better, slots start at `T::MAX`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

/// Maximisation: larger is better, slots start at `T::MIN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl<T: AtomicValue> Aggregator<T> for Min {
    #[inline(always)]
    fn identity() -> T {
        T::MAX
    }

    #[inline(always)]
    fn improves(candidate: T, current: T) -> bool {
        candidate < current
    }
}

impl<T: AtomicValue> Aggregator<T> for Max {
    #[inline(always)]
    fn identity() -> T {
        T::MIN
    }

    #[inline(always)]
    fn improves(candidate: T, current: T) -> bool {
        candidate > current
    }
}

/// An array of atomic per-vertex values updated only in the improving direction.
pub struct AggregationStore<T: AtomicValue, A: Aggregator<T>> {
    cells: Vec<AtomicCell<T>>,
    _aggregator: PhantomData<fn() -> A>,
}

impl<T: AtomicValue, A: Aggregator<T>> AggregationStore<T, A> {
    /// Creates `len` slots, each holding `A::identity()`.
    pub fn new(len: usize) -> Self {
        let cells = (0..len).map(|_| AtomicCell::new(A::identity())).collect();
        Self {
            cells,
            _aggregator: PhantomData,
        }
    }

    /// Number of slots.
    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Returns `true` if there are no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Reads the value of `vertex`. Lock-free.
    ///
    /// # Panics
    /// Panics if `vertex >= len()`.
    #[inline]
    pub fn read(&self, vertex: usize) -> T {
        self.cells[vertex].load(Ordering::Acquire)
    }

    /// Reads the value of `vertex`, reporting an out-of-range id as an error.
    #[inline]
    pub fn get(&self, vertex: usize) -> Result<T, ProgramError> {
        self.cells
            .get(vertex)
            .map(|c| c.load(Ordering::Acquire))
            .ok_or(ProgramError::VertexOutOfRange {
                vertex,
                len: self.cells.len(),
            })
    }

    /// Atomically replaces the value of `vertex` with `candidate` iff
    /// `A::improves(candidate, current)`. Returns whether it updated.
    ///
    /// Linearizable per slot: a value written by a better update is never
    /// overwritten by a worse one, whatever the arrival order.
    ///
    /// # Panics
    /// Panics if `vertex >= len()`.
    #[inline]
    pub fn compare_and_improve(&self, vertex: usize, candidate: T) -> bool {
        let cell = &self.cells[vertex];
        let new = candidate.to_bits();
        let backoff = Backoff::new();
        let mut current = cell.load_bits(Ordering::Acquire);
        loop {
            if !A::improves(candidate, T::from_bits(current)) {
                return false;
            }
            match cell.compare_exchange_weak_bits(
                current,
                new,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => {
                    current = actual;
                    backoff.spin();
                }
            }
        }
    }

    /// Checked variant of [`AggregationStore::compare_and_improve`].
    #[inline]
    pub fn try_compare_and_improve(
        &self,
        vertex: usize,
        candidate: T,
    ) -> Result<bool, ProgramError> {
        if vertex >= self.cells.len() {
            return Err(ProgramError::VertexOutOfRange {
                vertex,
                len: self.cells.len(),
            });
        }
        Ok(self.compare_and_improve(vertex, candidate))
    }

    /// Unconditionally stores `value`, regardless of ordering.
    ///
    /// Intended for seeding in the initial evaluation; racing it with
    /// [`AggregationStore::compare_and_improve`] on the same slot loses the
    /// monotonicity guarantee for that slot.
    ///
    /// # Panics
    /// Panics if `vertex >= len()`.
    #[inline]
    pub fn set(&self, vertex: usize, value: T) {
        self.cells[vertex].store(value, Ordering::Release);
    }

    /// Copies every slot.
    pub fn snapshot(&self) -> Vec<T> {
        self.cells.iter().map(|c| c.load(Ordering::Acquire)).collect()
    }

    /// Copies the first `inner` slots (the inner vertices).
    ///
    /// # Panics
    /// Panics if `inner > len()`.
    pub fn inner_snapshot(&self, inner: usize) -> Vec<T> {
        self.cells[..inner]
            .iter()
            .map(|c| c.load(Ordering::Acquire))
            .collect()
    }

    /// Resets every slot to `A::identity()`.
    pub fn reset(&mut self) {
        for c in &self.cells {
            c.store(A::identity(), Ordering::Relaxed);
        }
    }
}

impl<T: AtomicValue, A: Aggregator<T>> core::fmt::Debug for AggregationStore<T, A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AggregationStore")
            .field("len", &self.cells.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_identity_is_infinity() {
        let store: AggregationStore<f64, Min> = AggregationStore::new(2);
        assert_eq!(store.read(0), f64::INFINITY);
        assert!(store.compare_and_improve(0, 3.0));
        assert!(!store.compare_and_improve(0, 3.0));
        assert!(!store.compare_and_improve(0, f64::NAN));
        assert_eq!(store.read(0), 3.0);
    }

    #[test]
    fn max_improves_upwards() {
        let store: AggregationStore<u64, Max> = AggregationStore::new(1);
        assert_eq!(store.read(0), 0);
        assert!(store.compare_and_improve(0, 5));
        assert!(!store.compare_and_improve(0, 4));
        assert_eq!(store.read(0), 5);
    }

    #[test]
    fn checked_access_reports_range() {
        let store: AggregationStore<u32, Min> = AggregationStore::new(3);
        assert!(matches!(
            store.get(3),
            Err(ProgramError::VertexOutOfRange { vertex: 3, len: 3 })
        ));
        assert!(store.try_compare_and_improve(7, 1).is_err());
    }
}
