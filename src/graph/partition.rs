//! Hash partitioning of a global edge list into fragments.
//!
//! Vertex `gid` is owned by worker `gid % num_workers`. Each edge is stored on
//! the fragment owning its source, so a fragment's outer vertices are exactly
//! the remote targets of its inner vertices' edges.

use super::csr_fragment::{CsrFragment, FragmentBuilder};
use super::fragment::{GlobalId, WorkerId};
use crate::error::{Error, Result};

/// Vertices and edges assigned to one worker.
type Shard<W> = (Vec<GlobalId>, Vec<(GlobalId, GlobalId, W)>);

/// Owner of `gid` under hash partitioning.
#[inline]
pub fn owner_of(gid: GlobalId, num_workers: usize) -> WorkerId {
    // `num_workers` is a small positive count; the remainder always fits.
    #[allow(clippy::cast_possible_truncation)]
    let owner = (gid % num_workers as u64) as usize;
    owner
}

/// Builds `num_workers` fragments from a vertex list and a weighted edge list.
///
/// Edge endpoints are added as vertices even when absent from `vertices`.
/// Inner local ids follow ascending global id order.
pub fn partition_edges<W>(
    vertices: &[GlobalId],
    edges: &[(GlobalId, GlobalId, W)],
    num_workers: usize,
) -> Result<Vec<CsrFragment<W>>>
where
    W: Copy + Send + Sync,
{
    if num_workers == 0 {
        return Err(Error::InvalidFragment("num_workers must be > 0".into()));
    }

    let mut owned: Vec<Vec<GlobalId>> = vec![Vec::new(); num_workers];
    let mut local_edges: Vec<Vec<(GlobalId, GlobalId, W)>> = vec![Vec::new(); num_workers];
    for &gid in vertices {
        owned[owner_of(gid, num_workers)].push(gid);
    }
    for &(src, dst, w) in edges {
        owned[owner_of(src, num_workers)].push(src);
        owned[owner_of(dst, num_workers)].push(dst);
        local_edges[owner_of(src, num_workers)].push((src, dst, w));
    }
    for ids in &mut owned {
        ids.sort_unstable();
        ids.dedup();
    }

    let build = |(worker, (ids, edges)): (WorkerId, Shard<W>)| {
        let mut builder = FragmentBuilder::new(worker, num_workers);
        for gid in ids {
            builder.add_inner(gid);
        }
        for (src, dst, w) in edges {
            builder.add_edge(src, dst, w, owner_of(dst, num_workers));
        }
        builder.build()
    };

    let parts = owned.into_iter().zip(local_edges).enumerate();

    #[cfg(feature = "parallel")]
    {
        use rayon::prelude::*;
        parts.collect::<Vec<_>>().into_par_iter().map(build).collect()
    }
    #[cfg(not(feature = "parallel"))]
    {
        parts.map(build).collect()
    }
}
