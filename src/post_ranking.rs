//! Post-ranking stage: summary generation over the top ranked answers,
//! alongside (not instead of) the ranked list. Grounded in
//! `core/post_ranking.py`; `generate_mode == "generate"` is handled by the
//! separate [`crate::generate::GenerateOrchestrator`] rather than here,
//! mirroring the reference implementation's split into a distinct handler
//! subclass rather than a post-ranking branch.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::{PromptLevel, run_prompt};
use crate::query::{GenerateMode, QueryContext};
use crate::stream::OutboundMessage;

const SUMMARIZE_TIMEOUT: Duration = Duration::from_secs(20);
const SUMMARY_TOP_N: usize = 3;

#[derive(Deserialize)]
struct SummarizeResponse {
    summary: String,
}

/// Runs the post-ranking stage for `ctx`'s `generate_mode`.
pub async fn run(ctx: &QueryContext) {
    if !ctx.state.connection_alive.is_set() {
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .query_done = true;
        return;
    }

    match ctx.request.generate_mode {
        GenerateMode::None | GenerateMode::Generate => {}
        GenerateMode::Summarize => summarize(ctx).await,
    }
}

async fn summarize(ctx: &QueryContext) {
    let descriptions: Vec<String> = {
        let working = ctx.snapshot();
        working
            .final_ranked_answers
            .iter()
            .take(SUMMARY_TOP_N)
            .map(|answer| answer.description.clone())
            .collect()
    };
    let joined = descriptions.join("; ");

    let mut vars = HashMap::new();
    vars.insert("request.query", ctx.request.query.as_str());
    vars.insert("results", joined.as_str());

    let response: Option<SummarizeResponse> = run_prompt(
        ctx,
        "SummarizeResultsPrompt",
        &vars,
        PromptLevel::Low,
        SUMMARIZE_TIMEOUT,
    )
    .await;

    if let Some(response) = response {
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .summary = Some(response.summary.clone());
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("summary").with_field("summary", response.summary),
            )
            .await;
    }

    ctx.state.step_done("post_ranking");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SiteSelector;
    use crate::query::QueryRequest;
    use crate::ranking::RankedAnswer;
    use crate::test_support::{ScriptedLlm, test_context_with};

    fn request(generate_mode: GenerateMode) -> QueryRequest {
        QueryRequest {
            query: "q".to_string(),
            prev_queries: Vec::new(),
            context_url: String::new(),
            site: SiteSelector::All,
            generate_mode,
            decontextualized_query: None,
            query_id: "q1".to_string(),
        }
    }

    #[tokio::test]
    async fn none_mode_does_nothing() {
        let ctx = test_context_with(request(GenerateMode::None), ScriptedLlm::constant("{}"), Vec::new());
        run(&ctx).await;
        assert!(ctx.snapshot().summary.is_none());
    }

    #[tokio::test]
    async fn dead_connection_marks_query_done() {
        let ctx = test_context_with(request(GenerateMode::Summarize), ScriptedLlm::constant("{}"), Vec::new());
        ctx.state.connection_alive.clear();
        run(&ctx).await;
        assert!(ctx.snapshot().query_done);
    }

    #[tokio::test]
    async fn summarize_mode_stores_and_sends_summary() {
        let ctx = test_context_with(
            request(GenerateMode::Summarize),
            ScriptedLlm::constant("{\"summary\": \"short summary\"}"),
            Vec::new(),
        );
        {
            let mut working = ctx.working.lock().unwrap_or_else(|e| e.into_inner());
            working.final_ranked_answers = vec![RankedAnswer {
                url: "https://example.com".to_string(),
                name: "Example".to_string(),
                site: "imdb".to_string(),
                score: 80,
                description: "relevant".to_string(),
                sent: true,
            }];
        }
        run(&ctx).await;
        assert_eq!(ctx.snapshot().summary, Some("short summary".to_string()));
        let accumulated = ctx.sink.accumulated().unwrap_or_else(|| unreachable!());
        assert!(accumulated.fields.contains_key("summary"));
    }
}
