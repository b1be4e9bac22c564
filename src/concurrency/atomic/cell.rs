use core::marker::PhantomData;
use core::sync::atomic::{AtomicU64, Ordering};

use super::AtomicValue;

/// A typed atomic cell storing an [`AtomicValue`] in an `AtomicU64`.
///
/// The type parameter is a compile-time marker only; it does not change the
/// atomic's concurrency behaviour.
#[repr(transparent)]
pub struct AtomicCell<T: AtomicValue> {
    inner: AtomicU64,
    _value: PhantomData<T>,
}

impl<T: AtomicValue> AtomicCell<T> {
    /// Creates a new cell holding `value`.
    #[inline(always)]
    pub fn new(value: T) -> Self {
        Self {
            inner: AtomicU64::new(value.to_bits()),
            _value: PhantomData,
        }
    }

    /// Loads the current value.
    #[inline(always)]
    pub fn load(&self, order: Ordering) -> T {
        T::from_bits(self.inner.load(order))
    }

    /// Stores a new value.
    #[inline(always)]
    pub fn store(&self, value: T, order: Ordering) {
        self.inner.store(value.to_bits(), order);
    }

    /// Loads the raw encoded word.
    #[inline(always)]
    pub(crate) fn load_bits(&self, order: Ordering) -> u64 {
        self.inner.load(order)
    }

    /// Stores `new` if the encoded word still equals `current`.
    ///
    /// Comparison is on the encoded bits, so `-0.0` and `0.0` are distinct.
    #[inline(always)]
    pub(crate) fn compare_exchange_weak_bits(
        &self,
        current: u64,
        new: u64,
        success: Ordering,
        failure: Ordering,
    ) -> Result<u64, u64> {
        self.inner.compare_exchange_weak(current, new, success, failure)
    }
}

impl<T: AtomicValue> core::fmt::Debug for AtomicCell<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("AtomicCell")
            .field(&self.load(Ordering::Relaxed))
            .finish()
    }
}
