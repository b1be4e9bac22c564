//! The BSP computation engine.
//!
//! - `active_set`: double-buffered active-vertex bitsets
//! - `aggregation`: per-vertex atomic compare-and-improve store
//! - `message`: per-thread outbound buffering, merging, and delivery
//! - `transport`: the seam that moves batches between workers
//! - `program`: the vertex-program contract and its evaluation context
//! - `coordinator`: the PEval / barrier / IncEval loop
//! - `metrics`: phase timings and counters

pub mod active_set;
pub mod aggregation;
pub mod coordinator;
pub mod message;
pub mod metrics;
pub mod program;
pub mod transport;

pub use active_set::ActiveSet;
pub use aggregation::{AggregationStore, Aggregator, Max, Min};
pub use coordinator::{CancelHandle, Coordinator, Decision, RunOutcome, Snapshot};
pub use message::{DeliveryStats, Message, MessageBatch, MessageManager};
pub use metrics::{PhaseTimings, RunMetrics, WorkerMetrics};
pub use program::{EvalContext, EvalFn, ProgramState, VertexProgram};
pub use transport::{LocalTransport, Transport};
