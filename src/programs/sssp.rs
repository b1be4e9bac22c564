//! Single-source shortest paths.
//!
//! The initial evaluation seeds the source at distance 0 and relaxes its
//! direct out-edges; every incremental evaluation relaxes the out-edges of
//! each active vertex. Outer improvements reach their owner through the
//! message manager. Unreached vertices keep `f64::INFINITY`.

use num_traits::Zero;
use tracing::info;

use crate::engine::{EvalContext, Min, VertexProgram};
use crate::error::{ProgramError, Result};
use crate::graph::{Fragment, GlobalId, Neighbor};

/// Parameters of an SSSP run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SsspParams {
    /// Global id of the source vertex.
    pub source: GlobalId,
}

/// Builds the SSSP program rooted at `source`.
pub fn sssp_program<F>(source: GlobalId) -> VertexProgram<SsspParams, F, f64, Min>
where
    F: Fragment<Weight = f64>,
{
    VertexProgram {
        name: "sssp",
        params: SsspParams { source },
        init: peval::<F>,
        step: inc_eval::<F>,
    }
}

fn peval<F>(params: &SsspParams, ctx: &EvalContext<'_, F, f64, Min>) -> Result<()>
where
    F: Fragment<Weight = f64>,
{
    let fragment = ctx.fragment();
    let source = fragment.resolve_inner(params.source);
    info!(
        worker = ctx.worker(),
        source = params.source,
        in_fragment = source.is_some(),
        lid = ?source,
        "sssp source lookup"
    );

    if let Some(lid) = source {
        ctx.store().set(lid, f64::zero());
        for nbr in fragment.outgoing_adjacency(lid) {
            relax_edge(ctx, lid, f64::zero(), nbr, 0).map_err(|e| ctx.fail(e))?;
        }
    }
    // The seed itself is never marked, so the first barrier must not end the run.
    ctx.force_continue();
    Ok(())
}

fn inc_eval<F>(_params: &SsspParams, ctx: &EvalContext<'_, F, f64, Min>) -> Result<()>
where
    F: Fragment<Weight = f64>,
{
    let fragment = ctx.fragment();
    ctx.for_each_active(|v, tid| {
        let dist = ctx.store().read(v);
        for nbr in fragment.outgoing_adjacency(v) {
            relax_edge(ctx, v, dist, nbr, tid)?;
        }
        Ok(())
    })
}

#[inline]
fn relax_edge<F>(
    ctx: &EvalContext<'_, F, f64, Min>,
    from: usize,
    dist: f64,
    nbr: &Neighbor<f64>,
    tid: usize,
) -> core::result::Result<(), ProgramError>
where
    F: Fragment<Weight = f64>,
{
    if nbr.weight.is_nan() || nbr.weight < 0.0 {
        return Err(ProgramError::InvalidValue {
            vertex: from,
            reason: format!("edge weight {} is not a non-negative number", nbr.weight),
        });
    }
    ctx.relax(nbr.lid, dist + nbr.weight, tid)?;
    Ok(())
}
