//! Double-buffered active-vertex sets.
//!
//! During an epoch, threads only ever OR bits into `next`, so concurrent marks
//! need no lock. `swap` takes `&mut self`, which makes it impossible to
//! interleave with a mark: it can only run between epochs.

use core::sync::atomic::Ordering;

use crate::concurrency::atomic::AtomicBitset;

/// Active-vertex tracking over a fragment's inner vertex id space.
#[derive(Debug)]
pub struct ActiveSet {
    current: AtomicBitset,
    next: AtomicBitset,
}

impl ActiveSet {
    /// Creates an empty set over `inner_vertex_count` vertices.
    pub fn new(inner_vertex_count: usize) -> Self {
        Self {
            current: AtomicBitset::new(inner_vertex_count),
            next: AtomicBitset::new(inner_vertex_count),
        }
    }

    /// Number of vertices covered by each buffer.
    #[inline]
    pub fn len(&self) -> usize {
        self.current.len_bits()
    }

    /// Returns `true` if the set covers no vertices at all.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Marks `vertex` active for the next epoch. Idempotent; returns whether
    /// this call set the bit.
    ///
    /// # Panics
    /// Panics if `vertex` is not an inner vertex.
    #[inline]
    pub fn mark(&self, vertex: usize) -> bool {
        self.next.test_and_set(vertex, Ordering::Relaxed)
    }

    /// Marks `vertex` active in the current epoch.
    ///
    /// Only valid before the first dispatch of an epoch (seeding).
    ///
    /// # Panics
    /// Panics if `vertex` is not an inner vertex.
    #[inline]
    pub fn mark_current(&self, vertex: usize) -> bool {
        self.current.test_and_set(vertex, Ordering::Relaxed)
    }

    /// Returns `true` if `vertex` is active in the current epoch.
    #[inline]
    pub fn is_active(&self, vertex: usize) -> bool {
        self.current.is_set(vertex)
    }

    /// Returns `true` if `vertex` has been marked for the next epoch.
    #[inline]
    pub fn is_marked_next(&self, vertex: usize) -> bool {
        self.next.is_set(vertex)
    }

    /// Moves `next` into `current` and clears `next`.
    pub fn swap(&mut self) {
        core::mem::swap(&mut self.current, &mut self.next);
        self.next.clear_all();
    }

    /// Returns `true` if nothing is active in the current epoch.
    #[inline]
    pub fn is_current_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Returns `true` if nothing has been marked for the next epoch.
    #[inline]
    pub fn is_next_empty(&self) -> bool {
        self.next.is_empty()
    }

    /// Number of vertices active in the current epoch.
    pub fn current_count(&self) -> usize {
        self.current.count_ones()
    }

    /// Number of vertices marked for the next epoch.
    pub fn next_count(&self) -> usize {
        self.next.count_ones()
    }

    /// The current buffer, for scheduling.
    #[inline]
    pub fn current(&self) -> &AtomicBitset {
        &self.current
    }

    /// Clears both buffers.
    pub fn clear(&mut self) {
        self.current.clear_all();
        self.next.clear_all();
    }
}
