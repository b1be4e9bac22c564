//! Concurrency building blocks for the engine.
//!
//! Important: the only cross-thread coordination inside an epoch is atomic
//! read-modify-write on per-vertex cells and bitset words. Everything that
//! needs exclusive access happens between epochs through `&mut`.

pub mod atomic;
pub mod scoped;

pub use atomic::{AtomicBitset, AtomicCell, AtomicValue};
pub use scoped::{ParallelScheduler, ThreadGroup};
