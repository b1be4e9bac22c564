//! The fragment interface consumed by the engine.
//!
//! A fragment is one worker's immutable view of the partitioned graph. Local ids
//! are dense: inner vertices occupy `[0, inner_vertex_count)` and outer vertices
//! occupy `[inner_vertex_count, vertex_count)`. Only inner vertices carry
//! adjacency.

use core::ops::Range;

use serde::{Deserialize, Serialize};

/// Index of a worker (one per fragment).
pub type WorkerId = usize;

/// Graph-wide stable vertex id.
pub type GlobalId = u64;

/// A vertex as seen from one fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VertexId {
    /// Stable id, unique across the whole graph.
    pub gid: GlobalId,
    /// Dense id, valid only inside the fragment that produced it.
    pub lid: usize,
}

/// One outgoing edge in a fragment's adjacency.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor<W> {
    /// Local id of the edge target (inner or outer).
    pub lid: usize,
    /// Edge weight.
    pub weight: W,
}

/// A fragment of a partitioned graph.
///
/// The engine only ever reads a fragment; topology is fixed for a whole run.
pub trait Fragment: Send + Sync {
    /// Edge weight type.
    type Weight: Copy + Send + Sync;

    /// Worker that owns this fragment.
    fn worker_id(&self) -> WorkerId;

    /// Total number of workers (fragments) in the partition.
    fn num_workers(&self) -> usize;

    /// Number of inner vertices.
    fn inner_vertex_count(&self) -> usize;

    /// Number of inner plus outer vertices.
    fn vertex_count(&self) -> usize;

    /// Outgoing adjacency of `lid`. Outer vertices have none.
    fn outgoing_adjacency(&self, lid: usize) -> &[Neighbor<Self::Weight>];

    /// Global id of a local vertex.
    fn global_id(&self, lid: usize) -> GlobalId;

    /// Worker owning `lid` as an inner vertex.
    fn owner(&self, lid: usize) -> WorkerId;

    /// Resolves a global id to this fragment's local id, inner or outer.
    fn resolve_global_to_local(&self, gid: GlobalId) -> Option<usize>;

    /// Returns `true` if `lid` is an outer vertex.
    #[inline]
    fn is_outer(&self, lid: usize) -> bool {
        lid >= self.inner_vertex_count()
    }

    /// Returns `true` if `lid` is an inner vertex.
    #[inline]
    fn is_inner(&self, lid: usize) -> bool {
        lid < self.inner_vertex_count()
    }

    /// Resolves a global id only if it is inner to this fragment.
    #[inline]
    fn resolve_inner(&self, gid: GlobalId) -> Option<usize> {
        self.resolve_global_to_local(gid)
            .filter(|&lid| self.is_inner(lid))
    }

    /// Local id range of inner vertices.
    #[inline]
    fn inner_vertices(&self) -> Range<usize> {
        0..self.inner_vertex_count()
    }

    /// Local id range of outer vertices.
    #[inline]
    fn outer_vertices(&self) -> Range<usize> {
        self.inner_vertex_count()..self.vertex_count()
    }

    /// Both ids of a local vertex.
    #[inline]
    fn vertex(&self, lid: usize) -> VertexId {
        VertexId {
            gid: self.global_id(lid),
            lid,
        }
    }
}
