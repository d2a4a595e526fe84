//! The list/summarize-mode query orchestrator: runs fast-track concurrently
//! with the pre-retrieval analyzers, falls back to a regular retrieval+rank
//! pass when fast-track didn't pan out, then runs post-ranking. Grounds
//! `core/baseHandler.py::NLWebHandler.runQuery`.

use std::future::Future;
use std::pin::Pin;

use futures_util::future::join_all;
use tracing::warn;

use crate::analyzers;
use crate::decontextualize;
use crate::fast_track;
use crate::post_ranking;
use crate::query::QueryContext;
use crate::ranking::{RankingTrack, Ranker};

/// Orchestrates the full list/summarize query pipeline.
pub struct QueryOrchestrator;

impl QueryOrchestrator {
    /// Runs the concurrent precheck fan-out: fast-track plus the six
    /// analyzer/decontextualization tasks. Force-completes `pre_checks_done`
    /// once every task has settled (tolerating individual failures), then —
    /// if fast-track didn't already commit to a retrieval — performs the
    /// regular retrieval using the (by now) decontextualized query.
    pub async fn prepare(ctx: &QueryContext) {
        let tasks: Vec<Pin<Box<dyn Future<Output = ()> + Send + '_>>> = vec![
            Box::pin(fast_track::run(ctx)),
            Box::pin(analyzers::detect_item_type(ctx)),
            Box::pin(analyzers::detect_multi_item_type_query(ctx)),
            Box::pin(analyzers::detect_query_type(ctx)),
            Box::pin(decontextualize::run(ctx)),
            Box::pin(analyzers::relevance_detection(ctx)),
            Box::pin(analyzers::memory(ctx)),
            Box::pin(analyzers::required_info(ctx)),
        ];
        join_all(tasks).await;

        ctx.state.force_pre_checks_done();

        if !ctx.state.retrieval_done.is_set() {
            let query = ctx.snapshot().decontextualized_query;
            match ctx
                .retriever
                .search(&query, &ctx.request.site, ctx.config.search_top_k)
                .await
            {
                Ok(items) => {
                    ctx.working
                        .lock()
                        .unwrap_or_else(std::sync::PoisonError::into_inner)
                        .final_retrieved_items = items;
                }
                Err(err) => warn!(error = %err, "fallback retrieval failed"),
            }
            ctx.state.retrieval_done.set();
        }
    }

    /// Runs the whole pipeline for `ctx`: prepare, rank (unless fast-track
    /// already sent results), post-rank. Always ends with a terminal
    /// `complete` message, even when a precheck aborted the query early.
    pub async fn run(ctx: &QueryContext) {
        Self::prepare(ctx).await;

        if !ctx.snapshot().query_done {
            if !ctx.snapshot().fast_track_worked {
                let items = ctx.snapshot().final_retrieved_items;
                Ranker::new(items, RankingTrack::Regular).run(ctx).await;
            }

            post_ranking::run(ctx).await;
        }

        ctx.sink.send_complete(&ctx.state.connection_alive, &ctx.request.query_id).await;
    }
}
