//! Speculative fast-track: runs retrieval (and, if it pans out, ranking)
//! against the raw query concurrently with decontextualization, so a query
//! that turns out not to need rewriting doesn't pay for a second round
//! trip. Grounded in `core/fastTrack.py`.

use std::time::Duration;

use tracing::warn;

use crate::query::QueryContext;
use crate::ranking::{RankingTrack, Ranker};

const DECONTEXTUALIZATION_WAIT: Duration = Duration::from_secs(5);

/// Whether `ctx`'s request is eligible for fast-track: no page context and
/// no prior queries to rewrite against.
#[must_use]
pub fn is_eligible(ctx: &QueryContext) -> bool {
    ctx.request.context_url.is_empty() && ctx.request.prev_queries.is_empty()
}

/// Runs the fast-track path to completion. A no-op if `ctx` isn't eligible.
///
/// Eligible fast-track always commits to a retrieval (setting
/// `retrieval_done`) before it's known whether the query needs rewriting;
/// it then waits (bounded) for decontextualization and proceeds to ranking
/// only if the wait resolved cleanly and rewriting turned out unnecessary.
pub async fn run(ctx: &QueryContext) {
    if !is_eligible(ctx) {
        return;
    }

    let query = ctx.request.query.clone();
    let items = match ctx
        .retriever
        .search(&query, &ctx.request.site, ctx.config.search_top_k)
        .await
    {
        Ok(items) => items,
        Err(err) => {
            warn!(error = %err, "fast-track retrieval failed");
            Vec::new()
        }
    };
    {
        let mut working = ctx.working.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        working.final_retrieved_items = items.clone();
    }
    ctx.state.retrieval_done.set();

    let decontextualized = tokio::time::timeout(
        DECONTEXTUALIZATION_WAIT,
        ctx.state.wait_for_decontextualization(),
    )
    .await;

    let Ok(decon_done) = decontextualized else {
        warn!("fast-track abandoned: decontextualization wait timed out");
        return;
    };
    if !decon_done {
        return;
    }

    let (requires_decon, query_done) = {
        let working = ctx.snapshot();
        (working.requires_decontextualization, working.query_done)
    };

    if requires_decon {
        ctx.state.abort_fast_track.set();
        return;
    }
    if query_done || ctx.state.abort_fast_track.is_set() {
        return;
    }

    Ranker::new(items, RankingTrack::FastTrack).run(ctx).await;
}
