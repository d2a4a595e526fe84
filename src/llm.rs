//! Prompt execution: resolves a template, fills it, calls the configured
//! LLM at the requested tier, and parses the JSON response — swallowing
//! failures into `None` rather than propagating, matching
//! `prompts/prompt_runner.py::PromptRunner.run_prompt`'s policy (a failed
//! analyzer step shouldn't abort the whole query).

use std::collections::HashMap;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::json_extract;
use crate::message::{ChatRequest, system_message, user_message};
use crate::query::QueryContext;

/// Which model tier a prompt call should use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptLevel {
    /// Cheap/fast model, used by analyzers and per-item ranking.
    Low,
    /// More capable model, used by decontextualization and synthesis.
    High,
}

/// Resolves `prompt_name` for the context's current site/item type, fills
/// it with `vars`, and runs it against the configured LLM at `level`,
/// bounded by `timeout`. Returns `None` if the prompt has no resolvable
/// template, the call fails or times out, or the response doesn't parse
/// into `T`.
pub async fn run_prompt<T: DeserializeOwned>(
    ctx: &QueryContext,
    prompt_name: &str,
    vars: &HashMap<&str, &str>,
    level: PromptLevel,
    timeout: Duration,
) -> Option<T> {
    let (site, item_type) = {
        let site = ctx.primary_site();
        let item_type = ctx.snapshot().item_type;
        (site, item_type)
    };
    let Some(template) = ctx.prompts.resolve(&site, &item_type, prompt_name) else {
        warn!(prompt_name, "no template resolved, skipping");
        return None;
    };
    let filled = crate::prompts::fill_template(template, vars);

    let model = match level {
        PromptLevel::Low => ctx.config.low_model.clone(),
        PromptLevel::High => ctx.config.high_model.clone(),
    };

    let request = ChatRequest {
        model,
        messages: vec![
            system_message("Respond with a single JSON object only, no prose."),
            user_message(&filled),
        ],
        temperature: Some(0.0),
        max_tokens: None,
        json_mode: true,
    };

    let call = ctx.llm.complete(&request);
    let response = match tokio::time::timeout(timeout, call).await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            warn!(prompt_name, error = %err, "prompt call failed");
            return None;
        }
        Err(_) => {
            warn!(prompt_name, "prompt call timed out");
            return None;
        }
    };

    json_extract::parse_json_object(&response.content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SiteSelector;
    use crate::test_support::{ScriptedLlm, test_context_with};
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        score: i32,
    }

    fn context_with_llm(content: &str) -> QueryContext {
        test_context_with(
            crate::query::QueryRequest {
                query: "q".to_string(),
                prev_queries: Vec::new(),
                context_url: String::new(),
                site: SiteSelector::All,
                generate_mode: crate::query::GenerateMode::None,
                decontextualized_query: None,
                query_id: "q1".to_string(),
            },
            ScriptedLlm::constant(content),
            Vec::new(),
        )
    }

    #[tokio::test]
    async fn run_prompt_parses_valid_json() {
        let ctx = context_with_llm("{\"score\": 77}");
        let vars = HashMap::new();
        let result: Option<Score> =
            run_prompt(&ctx, "RankingPrompt", &vars, PromptLevel::Low, Duration::from_secs(1)).await;
        assert_eq!(result, Some(Score { score: 77 }));
    }

    #[tokio::test]
    async fn run_prompt_swallows_unparseable_response() {
        let ctx = context_with_llm("not json at all");
        let vars = HashMap::new();
        let result: Option<Score> =
            run_prompt(&ctx, "RankingPrompt", &vars, PromptLevel::Low, Duration::from_secs(1)).await;
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn run_prompt_returns_none_for_unknown_prompt_name() {
        let ctx = context_with_llm("{\"score\": 1}");
        let vars = HashMap::new();
        let result: Option<Score> = run_prompt(
            &ctx,
            "NotARealPrompt",
            &vars,
            PromptLevel::Low,
            Duration::from_secs(1),
        )
        .await;
        assert_eq!(result, None);
    }
}
