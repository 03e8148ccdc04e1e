//! Debate orchestration: positions → conflicts → tribunal → final verdict.
//!
//! Minister positions are produced independently and concurrently; nothing
//! downstream depends on arrival order. The final verdict is a pure
//! function of the set of positions.

pub mod conflict;
pub mod tribunal;
pub mod verdict;

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use thiserror::Error;

use crate::embed::EmbedPool;
use crate::gateway::LlmGateway;
use crate::retrieve::{retrieve_for_minister, Retrieval, RetrieveError};
use crate::synthesize::synthesize_position;
use crate::types::{DebateProceedings, MinisterId, MinisterPosition, Mode};
use crate::vector_store::VectorStore;

pub use conflict::detect_conflicts;
pub use tribunal::convene;
pub use verdict::frame_final_verdict;

#[derive(Debug, Error)]
pub enum DebateError {
    #[error("retrieval: {0}")]
    Retrieve(#[from] RetrieveError),
}

/// How many positions may be synthesized concurrently.
const POSITION_CONCURRENCY: usize = 4;

/// Everything a debate needs besides the ministers and the situation.
pub struct DebateContext<'a> {
    pub gateway: &'a Arc<dyn LlmGateway>,
    pub model: &'a str,
    pub store: &'a VectorStore,
    pub pool: &'a EmbedPool,
    pub k: usize,
    pub mode: Mode,
    pub book_filter: Option<&'a BTreeSet<String>>,
    pub confidence_threshold: f64,
}

/// Produce one minister's position: permissioned retrieval, then grounded
/// synthesis. Side-effect-free.
pub async fn produce_position(
    ctx: &DebateContext<'_>,
    minister: MinisterId,
    situation: &str,
) -> Result<MinisterPosition, DebateError> {
    let retrieval: Retrieval = retrieve_for_minister(
        ctx.store,
        ctx.pool,
        minister,
        situation,
        ctx.k,
        ctx.mode,
        ctx.book_filter,
    )
    .await?;

    Ok(synthesize_position(ctx.gateway, ctx.model, minister, situation, &retrieval).await)
}

/// Run a full debate for the given ministers.
pub async fn conduct_debate(
    ctx: &DebateContext<'_>,
    ministers: &[MinisterId],
    situation: &str,
) -> Result<DebateProceedings, DebateError> {
    // Dedup and order the council; the debate is a function of the set.
    let council: BTreeSet<MinisterId> = ministers.iter().copied().collect();

    let results: Vec<Result<MinisterPosition, DebateError>> = stream::iter(council)
        .map(|minister| async move { produce_position(ctx, minister, situation).await })
        .buffer_unordered(POSITION_CONCURRENCY)
        .collect()
        .await;

    let mut positions = Vec::with_capacity(results.len());
    for result in results {
        positions.push(result?);
    }
    positions.sort_by_key(|p| p.minister);

    let conflicts = detect_conflicts(&positions);
    let tribunal_verdict = convene(&conflicts, &positions);
    let final_verdict =
        frame_final_verdict(&positions, tribunal_verdict.as_ref(), ctx.confidence_threshold);

    Ok(DebateProceedings {
        positions,
        conflicts,
        tribunal_verdict,
        final_verdict,
    })
}
