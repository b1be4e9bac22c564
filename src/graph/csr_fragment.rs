//! A compact CSR (compressed sparse row) fragment.
//!
//! Memory layout:
//! - `offsets`: `Vec<usize>` of length `inner + 1` (row offsets)
//! - `neighbors`: contiguous `(target lid, weight)` pairs for each inner row
//! - `gids`: local id → global id for inner then outer vertices
//! - `outer_owners`: owning worker of each outer vertex

use rustc_hash::FxHashMap;

use super::fragment::{Fragment, GlobalId, Neighbor, WorkerId};
use crate::error::{Error, Result};

/// An immutable CSR fragment with an inner/outer vertex split.
///
/// ### Performance Characteristics
/// | Operation | Complexity | Notes |
/// |-----------|------------|-------|
/// | `outgoing_adjacency` | \(O(1)\) | Returns a slice of the row |
/// | `global_id` | \(O(1)\) | Dense table |
/// | `owner` | \(O(1)\) | Dense table for outer, constant for inner |
/// | `resolve_global_to_local` | \(O(1)\) expected | Hash lookup |
#[derive(Debug, Clone)]
pub struct CsrFragment<W> {
    worker: WorkerId,
    num_workers: usize,
    inner: usize,
    offsets: Vec<usize>,
    neighbors: Vec<Neighbor<W>>,
    gids: Vec<GlobalId>,
    outer_owners: Vec<WorkerId>,
    lids: FxHashMap<GlobalId, usize>,
}

impl<W: Copy + Send + Sync> CsrFragment<W> {
    /// Number of stored edges.
    pub fn edge_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Out-degree of an inner vertex.
    ///
    /// # Panics
    /// Panics if `lid` is not an inner vertex.
    pub fn degree(&self, lid: usize) -> usize {
        assert!(lid < self.inner, "vertex {lid} is not inner");
        self.offsets[lid + 1] - self.offsets[lid]
    }
}

impl<W: Copy + Send + Sync> Fragment for CsrFragment<W> {
    type Weight = W;

    #[inline]
    fn worker_id(&self) -> WorkerId {
        self.worker
    }

    #[inline]
    fn num_workers(&self) -> usize {
        self.num_workers
    }

    #[inline]
    fn inner_vertex_count(&self) -> usize {
        self.inner
    }

    #[inline]
    fn vertex_count(&self) -> usize {
        self.gids.len()
    }

    #[inline]
    fn outgoing_adjacency(&self, lid: usize) -> &[Neighbor<W>] {
        if lid >= self.inner {
            return &[];
        }
        &self.neighbors[self.offsets[lid]..self.offsets[lid + 1]]
    }

    #[inline]
    fn global_id(&self, lid: usize) -> GlobalId {
        self.gids[lid]
    }

    #[inline]
    fn owner(&self, lid: usize) -> WorkerId {
        if lid < self.inner {
            self.worker
        } else {
            self.outer_owners[lid - self.inner]
        }
    }

    #[inline]
    fn resolve_global_to_local(&self, gid: GlobalId) -> Option<usize> {
        self.lids.get(&gid).copied()
    }
}

/// Incrementally builds a [`CsrFragment`].
///
/// Inner vertices receive local ids in insertion order; outer vertices are
/// numbered after all inner ones in order of first appearance as an edge target.
#[derive(Debug)]
pub struct FragmentBuilder<W> {
    worker: WorkerId,
    num_workers: usize,
    inner: Vec<GlobalId>,
    inner_lids: FxHashMap<GlobalId, usize>,
    edges: Vec<(GlobalId, GlobalId, W, WorkerId)>,
}

impl<W: Copy + Send + Sync> FragmentBuilder<W> {
    /// Creates a builder for `worker` out of `num_workers`.
    pub fn new(worker: WorkerId, num_workers: usize) -> Self {
        Self {
            worker,
            num_workers,
            inner: Vec::new(),
            inner_lids: FxHashMap::default(),
            edges: Vec::new(),
        }
    }

    /// Adds an inner vertex. Adding the same id twice is a no-op.
    pub fn add_inner(&mut self, gid: GlobalId) -> &mut Self {
        if !self.inner_lids.contains_key(&gid) {
            self.inner_lids.insert(gid, self.inner.len());
            self.inner.push(gid);
        }
        self
    }

    /// Adds an edge `src -> dst`. `dst_owner` is the worker owning `dst`.
    pub fn add_edge(
        &mut self,
        src: GlobalId,
        dst: GlobalId,
        weight: W,
        dst_owner: WorkerId,
    ) -> &mut Self {
        self.edges.push((src, dst, weight, dst_owner));
        self
    }

    /// Validates the staged input and produces the fragment.
    pub fn build(self) -> Result<CsrFragment<W>> {
        if self.num_workers == 0 || self.worker >= self.num_workers {
            return Err(Error::InvalidFragment(format!(
                "worker {} out of range for {} workers",
                self.worker, self.num_workers
            )));
        }

        let inner = self.inner.len();
        let mut gids = self.inner;
        let mut lids = self.inner_lids;
        let mut outer_owners = Vec::new();

        let mut rows: Vec<(usize, Neighbor<W>)> = Vec::with_capacity(self.edges.len());
        for (src, dst, weight, dst_owner) in self.edges {
            let src_lid = match lids.get(&src).copied() {
                Some(lid) if lid < inner => lid,
                _ => {
                    return Err(Error::InvalidFragment(format!(
                        "edge {src}->{dst}: source is not inner to worker {}",
                        self.worker
                    )))
                }
            };
            if dst_owner >= self.num_workers {
                return Err(Error::InvalidFragment(format!(
                    "edge {src}->{dst}: owner {dst_owner} out of range"
                )));
            }
            let dst_lid = match lids.get(&dst).copied() {
                Some(lid) if lid < inner => {
                    if dst_owner != self.worker {
                        return Err(Error::InvalidFragment(format!(
                            "vertex {dst} is inner to worker {} but claimed by {dst_owner}",
                            self.worker
                        )));
                    }
                    lid
                }
                Some(lid) => {
                    if outer_owners[lid - inner] != dst_owner {
                        return Err(Error::InvalidFragment(format!(
                            "outer vertex {dst} has conflicting owners"
                        )));
                    }
                    lid
                }
                None => {
                    if dst_owner == self.worker {
                        return Err(Error::InvalidFragment(format!(
                            "vertex {dst} is owned by worker {} but was never added as inner",
                            self.worker
                        )));
                    }
                    let lid = gids.len();
                    gids.push(dst);
                    lids.insert(dst, lid);
                    outer_owners.push(dst_owner);
                    lid
                }
            };
            rows.push((src_lid, Neighbor { lid: dst_lid, weight }));
        }

        // Counting sort by source row; stable, so per-row insertion order survives.
        let mut offsets = vec![0usize; inner + 1];
        for (src, _) in &rows {
            offsets[src + 1] += 1;
        }
        for i in 0..inner {
            offsets[i + 1] += offsets[i];
        }
        let mut cursor = offsets.clone();
        let mut slots: Vec<Option<Neighbor<W>>> = vec![None; rows.len()];
        for (src, nbr) in rows {
            slots[cursor[src]] = Some(nbr);
            cursor[src] += 1;
        }
        let neighbors = slots.into_iter().flatten().collect();

        Ok(CsrFragment {
            worker: self.worker,
            num_workers: self.num_workers,
            inner,
            offsets,
            neighbors,
            gids,
            outer_owners,
            lids,
        })
    }
}
