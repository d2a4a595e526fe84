//! Generate/RAG-synthesis mode: a smaller precheck set, a lower ranking
//! bar, and a single synthesized prose answer with citations instead of a
//! ranked list. Grounds `core/generate_answer.py::GenerateAnswer`, run as a
//! separate orchestrator rather than a post-ranking branch — mirroring the
//! reference implementation's own handler-subclass split.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex as AsyncMutex;
use tracing::warn;

use crate::analyzers;
use crate::decontextualize;
use crate::item::Item;
use crate::llm::{PromptLevel, run_prompt};
use crate::query::QueryContext;
use crate::ranking::RankedAnswer;
use crate::stream::OutboundMessage;

/// Minimum score (exclusive) for an item to be used as supporting evidence.
/// Distinct from, and lower than, the list-mode ranking constants.
pub const GATHER_ITEMS_THRESHOLD: i32 = 55;

const RANK_TIMEOUT: Duration = Duration::from_secs(8);
const SYNTHESIZE_TIMEOUT: Duration = Duration::from_secs(100);
const DESCRIPTION_TIMEOUT: Duration = Duration::from_secs(8);

const NO_RESULTS_ANSWER: &str = "I couldn't find relevant information to answer that question.";
const SYNTHESIS_FAILURE_ANSWER: &str = "Sorry, I ran into a problem putting together an answer.";

#[derive(Debug, Deserialize)]
struct RankResponse {
    score: i32,
    description: String,
}

#[derive(Debug, Deserialize)]
struct SynthesizeResponse {
    answer: String,
    urls: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DescriptionResponse {
    description: String,
}

struct DescribedItem {
    url: String,
    name: String,
    site: String,
    description: String,
}

impl DescribedItem {
    fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "name": self.name,
            "site": self.site,
            "description": self.description,
        })
    }
}

/// Orchestrates the generate/RAG-synthesis pipeline.
pub struct GenerateOrchestrator;

impl GenerateOrchestrator {
    /// The generate-mode precheck set: item-type detection,
    /// decontextualization, relevance, memory, required-info — no
    /// fast-track, no multi-type/query-type detection.
    pub async fn prepare(ctx: &QueryContext) {
        let tasks: Vec<Pin<Box<dyn Future<Output = ()> + Send + '_>>> = vec![
            Box::pin(analyzers::detect_item_type(ctx)),
            Box::pin(decontextualize::run(ctx)),
            Box::pin(analyzers::relevance_detection(ctx)),
            Box::pin(analyzers::memory(ctx)),
            Box::pin(analyzers::required_info(ctx)),
        ];
        join_all(tasks).await;
        ctx.state.force_pre_checks_done();
    }

    /// Runs the full generate-mode pipeline for `ctx`. Always ends with a
    /// terminal `complete` message, even when a precheck aborted the query
    /// early.
    pub async fn run(ctx: &QueryContext) {
        Self::prepare(ctx).await;
        if !ctx.snapshot().query_done {
            Self::get_ranked_answers(ctx).await;
        }
        ctx.sink.send_complete(&ctx.state.connection_alive, &ctx.request.query_id).await;
    }

    async fn get_ranked_answers(ctx: &QueryContext) {
        let query = ctx.snapshot().decontextualized_query;
        let items = match ctx
            .retriever
            .search(&query, &ctx.request.site, ctx.config.search_top_k)
            .await
        {
            Ok(items) => items,
            Err(err) => {
                warn!(error = %err, "generate-mode retrieval failed");
                Vec::new()
            }
        };
        {
            let mut working = ctx.working.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            working.final_retrieved_items = items.clone();
        }

        let gathered: AsyncMutex<Vec<RankedAnswer>> = AsyncMutex::new(Vec::new());
        join_all(items.iter().map(|item| Self::rank_item(ctx, item, &gathered))).await;

        let final_ranked = gathered.into_inner();
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .final_ranked_answers = final_ranked;

        Self::synthesize_answer(ctx).await;
    }

    async fn rank_item(ctx: &QueryContext, item: &Item, gathered: &AsyncMutex<Vec<RankedAnswer>>) {
        if !ctx.state.connection_alive.is_set() {
            return;
        }
        let trimmed = crate::trim::trim_json(&item.schema_json);
        let mut vars = HashMap::new();
        vars.insert("request.query", ctx.request.query.as_str());
        vars.insert("item.description", trimmed.as_str());

        let response: Option<RankResponse> =
            run_prompt(ctx, "RankingPromptForGenerate", &vars, PromptLevel::Low, RANK_TIMEOUT).await;
        let Some(response) = response else {
            return;
        };
        if response.score > GATHER_ITEMS_THRESHOLD {
            gathered.lock().await.push(RankedAnswer {
                url: item.url.clone(),
                name: item.name.clone(),
                site: item.site.clone(),
                score: response.score,
                description: response.description,
                sent: false,
            });
        }
    }

    async fn synthesize_answer(ctx: &QueryContext) {
        let (items, query_text) = {
            let working = ctx.snapshot();
            (working.final_ranked_answers.clone(), ctx.request.query.clone())
        };

        if items.is_empty() {
            Self::send_nlws(ctx, NO_RESULTS_ANSWER, &[]).await;
            return;
        }

        let items_desc = items
            .iter()
            .map(|item| format!("{}: {}", item.url, item.description))
            .collect::<Vec<_>>()
            .join("\n");
        let mut vars = HashMap::new();
        vars.insert("items", items_desc.as_str());
        vars.insert("request.query", query_text.as_str());

        let response: Option<SynthesizeResponse> = run_prompt(
            ctx,
            "SynthesizePromptForGenerate",
            &vars,
            PromptLevel::High,
            SYNTHESIZE_TIMEOUT,
        )
        .await;

        let Some(response) = response else {
            if ctx.state.connection_alive.is_set() {
                Self::send_nlws(ctx, SYNTHESIS_FAILURE_ANSWER, &[]).await;
            }
            return;
        };

        Self::send_nlws(ctx, &response.answer, &[]).await;

        let cited: Vec<RankedAnswer> = items
            .into_iter()
            .filter(|item| response.urls.contains(&item.url))
            .collect();

        let described: AsyncMutex<Vec<DescribedItem>> = AsyncMutex::new(Vec::new());
        join_all(
            cited
                .iter()
                .map(|item| Self::describe(ctx, item, &response.answer, &described)),
        )
        .await;

        let final_items: Vec<Value> = described.into_inner().iter().map(DescribedItem::to_json).collect();
        Self::send_nlws_items(ctx, &response.answer, final_items).await;
    }

    async fn describe(
        ctx: &QueryContext,
        item: &RankedAnswer,
        answer: &str,
        described: &AsyncMutex<Vec<DescribedItem>>,
    ) {
        let mut vars = HashMap::new();
        vars.insert("item.description", item.description.as_str());
        vars.insert("answer", answer);
        vars.insert("request.query", ctx.request.query.as_str());

        let response: Option<DescriptionResponse> = run_prompt(
            ctx,
            "DescriptionPromptForGenerate",
            &vars,
            PromptLevel::Low,
            DESCRIPTION_TIMEOUT,
        )
        .await;
        let description = response.map_or_else(|| item.description.clone(), |r| r.description);
        described.lock().await.push(DescribedItem {
            url: item.url.clone(),
            name: item.name.clone(),
            site: item.site.clone(),
            description,
        });
    }

    async fn send_nlws(ctx: &QueryContext, answer: &str, items: &[Value]) {
        Self::send_nlws_items(ctx, answer, items.to_vec()).await;
    }

    async fn send_nlws_items(ctx: &QueryContext, answer: &str, items: Vec<Value>) {
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("nlws")
                    .with_field("answer", answer)
                    .with_field("items", Value::Array(items)),
            )
            .await;
    }
}
