//! Lock-free atomic primitives for per-vertex state.
//!
//! Important:
//! - Contended RMW on one slot still serializes in hardware; spread updates
//!   across vertices where possible.
//! - Every value type is carried in a single `AtomicU64`, so only fixed-width
//!   numbers are supported.

/// Word-packed atomic bitsets.
pub mod bitset;
/// Typed atomic cells over `AtomicU64`.
pub mod cell;

pub use bitset::{AtomicBitset, OnesIter, WORD_BITS};
pub use cell::AtomicCell;

use core::fmt::Debug;

/// A fixed-width numeric value that round-trips losslessly through a `u64`.
///
/// `MAX` and `MIN` are the extreme values of the type's ordering and serve as
/// identities for min/max reductions (`f64::INFINITY` rather than `f64::MAX`).
pub trait AtomicValue: Copy + PartialOrd + Debug + Send + Sync + 'static {
    /// Greatest value under `PartialOrd`.
    const MAX: Self;
    /// Least value under `PartialOrd`.
    const MIN: Self;

    /// Encodes the value into the atomic word.
    fn to_bits(self) -> u64;

    /// Decodes a value previously produced by [`AtomicValue::to_bits`].
    fn from_bits(bits: u64) -> Self;
}

impl AtomicValue for f64 {
    const MAX: Self = f64::INFINITY;
    const MIN: Self = f64::NEG_INFINITY;

    #[inline(always)]
    fn to_bits(self) -> u64 {
        f64::to_bits(self)
    }

    #[inline(always)]
    fn from_bits(bits: u64) -> Self {
        f64::from_bits(bits)
    }
}

impl AtomicValue for f32 {
    const MAX: Self = f32::INFINITY;
    const MIN: Self = f32::NEG_INFINITY;

    #[inline(always)]
    fn to_bits(self) -> u64 {
        u64::from(f32::to_bits(self))
    }

    #[inline(always)]
    fn from_bits(bits: u64) -> Self {
        // Only the low 32 bits are ever written.
        #[allow(clippy::cast_possible_truncation)]
        f32::from_bits(bits as u32)
    }
}

macro_rules! impl_atomic_value_int {
    ($($t:ty),*) => {
        $(
            impl AtomicValue for $t {
                const MAX: Self = <$t>::MAX;
                const MIN: Self = <$t>::MIN;

                #[inline(always)]
                #[allow(clippy::cast_sign_loss, clippy::cast_lossless)]
                fn to_bits(self) -> u64 {
                    self as u64
                }

                #[inline(always)]
                #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
                fn from_bits(bits: u64) -> Self {
                    bits as $t
                }
            }
        )*
    };
}

impl_atomic_value_int!(u64, i64, u32, i32, usize);
