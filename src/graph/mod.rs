//! Partitioned graph fragments.
//!
//! - `fragment`: the read-only interface the engine consumes
//! - `csr_fragment`: a CSR implementation with an inner/outer vertex split
//! - `partition`: hash partitioning of a global edge list into fragments
//! - `edge_list`: the plain-text edge list format

pub mod csr_fragment;
pub mod edge_list;
pub mod fragment;
pub mod partition;

pub use csr_fragment::{CsrFragment, FragmentBuilder};
pub use edge_list::EdgeList;
pub use fragment::{Fragment, GlobalId, Neighbor, VertexId, WorkerId};
pub use partition::{owner_of, partition_edges};
