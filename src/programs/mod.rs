//! Vertex programs shipped with the engine.
//!
//! - `sssp`: single-source shortest paths over `f64` edge weights
//! - `bfs`: hop counts from a source, ignoring weights

pub mod bfs;
pub mod sssp;

pub use bfs::{bfs_program, BfsParams};
pub use sssp::{sssp_program, SsspParams};
