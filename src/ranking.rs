//! Per-item LLM ranking: scores each retrieved item, early-sends
//! standout results subject to a "raise the bar" policy, and performs a
//! final forced flush so at least a reasonable number of results reach the
//! caller. Grounded verbatim in `core/ranking.py`.

use std::collections::HashMap;

use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::Mutex as AsyncMutex;

use crate::item::Item;
use crate::llm::{PromptLevel, run_prompt};
use crate::query::QueryContext;
use crate::stream::OutboundMessage;

/// Minimum score (exclusive) for an item to qualify for an early send.
pub const EARLY_SEND_THRESHOLD: i32 = 59;
/// Target number of results sent to the caller across early sends plus the
/// final forced flush.
pub const NUM_RESULTS_TO_SEND: usize = 10;
/// Minimum score (exclusive) for an item to survive into the final ranked
/// list / the forced flush.
pub const FINAL_FILTER_THRESHOLD: i32 = 51;

const RANK_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(8);

/// Which run this ranker is: fast-track's speculative pass, or the regular
/// post-precheck pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingTrack {
    /// Speculative pass over the raw query, run concurrently with prechecks.
    FastTrack,
    /// Regular pass, run after prechecks/decontextualization settle.
    Regular,
}

/// A single item's ranking result.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedAnswer {
    /// URL of the ranked item.
    pub url: String,
    /// Display name of the item.
    pub name: String,
    /// Site the item belongs to.
    pub site: String,
    /// LLM-assigned relevance score, 0-100.
    pub score: i32,
    /// LLM-generated description of why the item is relevant.
    pub description: String,
    /// Whether this result has already been sent to the caller.
    pub sent: bool,
}

impl RankedAnswer {
    fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "name": self.name,
            "site": self.site,
            "score": self.score,
            "description": self.description,
        })
    }
}

#[derive(Debug, Deserialize)]
struct RankResponse {
    score: i32,
    description: String,
}

/// Scores every item in a retrieved batch and streams qualifying results.
pub struct Ranker {
    items: Vec<Item>,
    track: RankingTrack,
    results: AsyncMutex<Vec<RankedAnswer>>,
}

impl Ranker {
    /// A ranker over `items`, running in `track` mode.
    #[must_use]
    pub fn new(items: Vec<Item>, track: RankingTrack) -> Self {
        Self {
            items,
            track,
            results: AsyncMutex::new(Vec::new()),
        }
    }

    fn prompt_name(&self) -> &'static str {
        "RankingPrompt"
    }

    /// `true` once fewer than `NUM_RESULTS_TO_SEND - 5` results have been
    /// sent; once that many have gone out, a candidate only qualifies if it
    /// beats the weakest already-sent result ("raise the bar").
    fn should_send(results: &[RankedAnswer], candidate: &RankedAnswer) -> bool {
        let sent: Vec<&RankedAnswer> = results.iter().filter(|r| r.sent).collect();
        if sent.len() < NUM_RESULTS_TO_SEND - 5 {
            return true;
        }
        sent.iter().any(|r| r.score < candidate.score)
    }

    async fn rank_item(&self, ctx: &QueryContext, item: &Item) {
        if !ctx.state.connection_alive.is_set() {
            return;
        }
        if self.track == RankingTrack::FastTrack && ctx.state.abort_fast_track.is_set() {
            return;
        }

        let trimmed = crate::trim::trim_json(&item.schema_json);
        let mut vars = HashMap::new();
        vars.insert("request.query", ctx.request.query.as_str());
        vars.insert("item.description", trimmed.as_str());

        let response: Option<RankResponse> = run_prompt(
            ctx,
            self.prompt_name(),
            &vars,
            PromptLevel::Low,
            RANK_TIMEOUT,
        )
        .await;
        let Some(response) = response else {
            return;
        };

        let mut answer = RankedAnswer {
            url: item.url.clone(),
            name: item.name.clone(),
            site: item.site.clone(),
            score: response.score,
            description: response.description,
            sent: false,
        };

        if answer.score > EARLY_SEND_THRESHOLD {
            answer.sent = self.send_answers(ctx, std::slice::from_ref(&answer), false).await;
        }

        self.results.lock().await.push(answer);
    }

    /// Sends `candidates` that pass `should_send` (or all of them, if
    /// `force`), after waiting for `pre_checks_done`. Returns whether
    /// anything was actually dispatched.
    async fn send_answers(&self, ctx: &QueryContext, candidates: &[RankedAnswer], force: bool) -> bool {
        if !ctx.state.connection_alive.is_set() {
            return false;
        }
        if self.track == RankingTrack::FastTrack && ctx.state.abort_fast_track.is_set() {
            return false;
        }

        let batch: Vec<RankedAnswer> = {
            let results = self.results.lock().await;
            candidates
                .iter()
                .filter(|c| force || Self::should_send(&results, c))
                .cloned()
                .collect()
        };
        if batch.is_empty() {
            return false;
        }

        ctx.state.pre_checks_done.wait().await;
        if self.track == RankingTrack::FastTrack && ctx.state.abort_fast_track.is_set() {
            return false;
        }

        let results_json: Vec<Value> = batch.iter().map(RankedAnswer::to_json).collect();
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("result_batch").with_field("results", Value::Array(results_json)),
            )
            .await;

        if self.track == RankingTrack::FastTrack {
            ctx.working
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .fast_track_worked = true;
        }

        {
            let mut results = self.results.lock().await;
            for sent_item in &batch {
                if let Some(existing) = results.iter_mut().find(|r| r.url == sent_item.url) {
                    existing.sent = true;
                }
            }
        }

        true
    }

    async fn send_sites_being_asked(&self, ctx: &QueryContext) {
        if !ctx.request.site.is_all_or_nlws() {
            return;
        }
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for item in &self.items {
            *counts.entry(item.site.as_str()).or_insert(0) += 1;
        }
        let mut ranked: Vec<(&str, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let top3: Vec<String> = ranked.into_iter().take(3).map(|(site, _)| pretty_print_site(site)).collect();
        if top3.is_empty() {
            return;
        }
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("asking_sites").with_field("sites", top3.join(", ")),
            )
            .await;
    }

    /// Runs ranking to completion: scores every item concurrently, sends
    /// the "asking sites" notice, then — once prechecks settle — computes
    /// `final_ranked_answers` and performs the final forced flush.
    pub async fn run(self, ctx: &QueryContext) {
        self.send_sites_being_asked(ctx).await;

        let items: Vec<&Item> = self
            .items
            .iter()
            .take_while(|_| ctx.state.connection_alive.is_set())
            .collect();
        join_all(items.into_iter().map(|item| self.rank_item(ctx, item))).await;

        let connection_alive = ctx.state.connection_alive.is_set();
        let aborted = self.track == RankingTrack::FastTrack && ctx.state.abort_fast_track.is_set();
        if !connection_alive || aborted {
            return;
        }

        ctx.state.pre_checks_done.wait().await;
        if self.track == RankingTrack::FastTrack && ctx.state.abort_fast_track.is_set() {
            return;
        }

        let final_ranked = {
            let results = self.results.lock().await;
            let mut final_ranked: Vec<RankedAnswer> =
                results.iter().filter(|r| r.score > FINAL_FILTER_THRESHOLD).cloned().collect();
            final_ranked.sort_by(|a, b| b.score.cmp(&a.score));
            final_ranked.truncate(NUM_RESULTS_TO_SEND);
            final_ranked
        };
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .final_ranked_answers = final_ranked;

        let sent_count = self.results.lock().await.iter().filter(|r| r.sent).count();
        if sent_count >= NUM_RESULTS_TO_SEND {
            return;
        }
        let remaining = NUM_RESULTS_TO_SEND - sent_count;

        let mut not_sent: Vec<RankedAnswer> = {
            let results = self.results.lock().await;
            results
                .iter()
                .filter(|r| !r.sent && r.score > FINAL_FILTER_THRESHOLD)
                .cloned()
                .collect()
        };
        not_sent.sort_by(|a, b| b.score.cmp(&a.score));
        not_sent.truncate(remaining);

        if !not_sent.is_empty() {
            self.send_answers(ctx, &not_sent, true).await;
        }
    }
}

fn pretty_print_site(site: &str) -> String {
    site.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
