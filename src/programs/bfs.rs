//! Breadth-first hop counts.

use num_traits::{One, Zero};

use crate::engine::{EvalContext, Min, VertexProgram};
use crate::error::Result;
use crate::graph::{Fragment, GlobalId};

/// Parameters of a BFS run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BfsParams {
    /// Global id of the source vertex.
    pub source: GlobalId,
}

/// Builds the BFS program rooted at `source`. Edge weights are ignored;
/// unreached vertices keep `u64::MAX`.
pub fn bfs_program<F: Fragment>(source: GlobalId) -> VertexProgram<BfsParams, F, u64, Min> {
    VertexProgram {
        name: "bfs",
        params: BfsParams { source },
        init: peval::<F>,
        step: inc_eval::<F>,
    }
}

fn peval<F: Fragment>(params: &BfsParams, ctx: &EvalContext<'_, F, u64, Min>) -> Result<()> {
    if let Some(lid) = ctx.fragment().resolve_inner(params.source) {
        ctx.store().set(lid, u64::zero());
        for nbr in ctx.fragment().outgoing_adjacency(lid) {
            ctx.relax(nbr.lid, u64::one(), 0).map_err(|e| ctx.fail(e))?;
        }
    }
    ctx.force_continue();
    Ok(())
}

fn inc_eval<F: Fragment>(_params: &BfsParams, ctx: &EvalContext<'_, F, u64, Min>) -> Result<()> {
    let fragment = ctx.fragment();
    ctx.for_each_active(|v, tid| {
        let hops = ctx.store().read(v) + u64::one();
        for nbr in fragment.outgoing_adjacency(v) {
            ctx.relax(nbr.lid, hops, tid)?;
        }
        Ok(())
    })
}
