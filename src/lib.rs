//! # `grape` - Partitioned Incremental Graph Computation
//!
//! A bulk-synchronous engine that runs vertex programs over a graph split into
//! fragments, one per worker. Each worker evaluates its fragment with a fixed
//! local thread pool; workers exchange cross-fragment updates only at epoch
//! barriers.
//!
//! ## Execution Model
//!
//! A computation is a pair of functions captured when the run starts:
//!
//! 1. **PEval** (`init`): runs once on every fragment, seeding values.
//! 2. **IncEval** (`step`): runs once per epoch after it, relaxing the
//!    out-edges of every vertex that changed in the previous epoch.
//!
//! Between epochs the coordinator merges each worker's per-thread message
//! buffers, delivers them to the owning workers, and swaps every active set.
//! The run ends at the first barrier where no worker has an active vertex and
//! none raised force-continue.
//!
//! ## Concurrency Guarantees
//!
//! - **Monotone slots**: every per-vertex value is updated by an atomic
//!   compare-and-improve; a better value is never overwritten by a worse one.
//! - **Write-only marks**: threads only OR bits into the next active set.
//! - **Exclusive barriers**: swapping sets, merging buffers, and clearing
//!   force-continue take `&mut`, so they cannot overlap an epoch.
//!
//! ## Layout
//!
//! - [`concurrency`]: atomic bitsets and cells, the scoped scheduler
//! - [`graph`]: the fragment interface, a CSR fragment, hash partitioning
//! - [`engine`]: active sets, aggregation, messaging, the coordinator
//! - [`programs`]: SSSP and BFS
//! - [`config`]: engine configuration
//!
//! ## Example
//!
//! ```
//! use grape::config::EngineConfig;
//! use grape::engine::Coordinator;
//! use grape::graph::partition_edges;
//! use grape::programs::sssp_program;
//!
//! let edges = [(0, 1, 2.0), (1, 2, 3.0), (0, 2, 10.0)];
//! let fragments = partition_edges(&[0, 1, 2], &edges, 2).unwrap();
//! let config = EngineConfig::new().with_fixed_threads(2);
//! let mut coordinator = Coordinator::new(fragments, &config).unwrap();
//! let outcome = coordinator.run(sssp_program(0)).unwrap();
//! assert_eq!(outcome.snapshot.get(2), Some(5.0));
//! ```

#![warn(missing_docs, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod programs;

pub use config::{EngineConfig, ThreadConfig};
pub use engine::{
    ActiveSet, AggregationStore, Aggregator, CancelHandle, Coordinator, Decision, EvalContext, Max,
    MessageManager, Min, RunOutcome, Snapshot, VertexProgram,
};
pub use error::{Error, ProgramError, Result};
pub use graph::{CsrFragment, Fragment, FragmentBuilder, GlobalId, WorkerId};

// Compile-time layout checks.
const _: () = {
    use core::mem;

    // Every slot is one word-sized atomic.
    assert!(mem::size_of::<concurrency::AtomicCell<f64>>() == mem::size_of::<u64>());
    assert!(
        mem::align_of::<concurrency::AtomicCell<u32>>()
            == mem::align_of::<core::sync::atomic::AtomicU64>()
    );
};
