//! Query decontextualization: rewriting a query so it stands alone, using
//! prior turns and/or page context.
//!
//! Four variants share one exit contract (always call
//! `state.step_done("Decon")`, even on early returns) so
//! `HandlerState::wait_for_decontextualization` can never deadlock. Variant
//! selection follows the reference implementation's exact elif-chain
//! priority rather than a naive "which inputs are present" reading.

use std::collections::HashMap;
use std::time::Duration;

use tracing::warn;

use crate::llm::{PromptLevel, run_prompt};
use crate::query::QueryContext;
use crate::state::DECON_STEP;
use crate::stream::OutboundMessage;

const DECONTEXTUALIZE_TIMEOUT: Duration = Duration::from_secs(8);

/// Which decontextualizer variant applies to a given request shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecontextualizerKind {
    /// No rewriting needed — use the query as-is.
    NoOp,
    /// Rewrite using prior queries in the conversation.
    PrevQuery,
    /// Rewrite using the page the user was viewing.
    ContextUrl,
    /// Rewrite using both prior queries and page context.
    Full,
}

/// Selects the decontextualizer variant for `ctx`, following this exact
/// priority (grounded verbatim in the reference `decontextualizeQuery`):
///
/// 1. no prior queries → `NoOp`.
/// 2. a caller-supplied decontextualized query is already present → `NoOp`.
/// 3. prior queries present → `PrevQuery`.
/// 4. a substantial `context_url` and no prior queries → `ContextUrl`.
/// 5. otherwise → `Full`.
#[must_use]
pub fn select_decontextualizer(ctx: &QueryContext) -> DecontextualizerKind {
    if ctx.request.prev_queries.is_empty() {
        return DecontextualizerKind::NoOp;
    }
    if ctx
        .request
        .decontextualized_query
        .as_ref()
        .is_some_and(|q| !q.is_empty())
    {
        return DecontextualizerKind::NoOp;
    }
    if !ctx.request.prev_queries.is_empty() {
        return DecontextualizerKind::PrevQuery;
    }
    if ctx.request.context_url.len() > 4 && ctx.request.prev_queries.is_empty() {
        return DecontextualizerKind::ContextUrl;
    }
    DecontextualizerKind::Full
}

#[derive(serde::Deserialize)]
struct DeconResponse {
    requires_decontextualization: String,
    decontextualized_query: String,
}

fn finish_noop(ctx: &QueryContext) {
    let mut working = ctx.working.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
    working.decontextualized_query = ctx.request.query.clone();
    working.requires_decontextualization = false;
}

async fn apply_response(ctx: &QueryContext, response: Option<DeconResponse>) {
    let Some(response) = response else {
        finish_noop(ctx);
        return;
    };
    let requires = response.requires_decontextualization == "True";
    {
        let mut working = ctx.working.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        working.requires_decontextualization = requires;
        if requires {
            working.decontextualized_query = response.decontextualized_query.clone();
        } else {
            working.decontextualized_query = ctx.request.query.clone();
        }
    }
    if requires {
        ctx.state.abort_fast_track.set();
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("decontextualized_query")
                    .with_field("query", response.decontextualized_query),
            )
            .await;
    }
}

/// Runs the selected decontextualizer variant to completion, always ending
/// with `state.step_done("Decon")`.
pub async fn run(ctx: &QueryContext) {
    ctx.state.start_step(DECON_STEP);
    match select_decontextualizer(ctx) {
        DecontextualizerKind::NoOp => finish_noop(ctx),
        DecontextualizerKind::PrevQuery => run_prev_query(ctx).await,
        DecontextualizerKind::ContextUrl => run_context_url(ctx).await,
        DecontextualizerKind::Full => run_full(ctx).await,
    }
    ctx.state.step_done(DECON_STEP);
}

async fn run_prev_query(ctx: &QueryContext) {
    let prev_queries = ctx.request.prev_queries.join("; ");
    let mut vars = HashMap::new();
    vars.insert("prev_queries", prev_queries.as_str());
    vars.insert("request.query", ctx.request.query.as_str());
    let response: Option<DeconResponse> = run_prompt(
        ctx,
        "PrevQueryDecontextualizer",
        &vars,
        PromptLevel::High,
        DECONTEXTUALIZE_TIMEOUT,
    )
    .await;
    apply_response(ctx, response).await;
}

async fn resolve_context_item_description(ctx: &QueryContext) -> Option<String> {
    match ctx.retriever.search_by_url(&ctx.request.context_url).await {
        Ok(Some(item)) => Some(crate::trim::trim_json(&item.schema_json)),
        Ok(None) => None,
        Err(err) => {
            warn!(error = %err, "context_url lookup failed");
            None
        }
    }
}

async fn run_context_url(ctx: &QueryContext) {
    let Some(context_description) = resolve_context_item_description(ctx).await else {
        let mut working = ctx.working.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        working.requires_decontextualization = false;
        working.decontextualized_query = ctx.request.query.clone();
        return;
    };
    let mut vars = HashMap::new();
    vars.insert("context_description", context_description.as_str());
    vars.insert("request.query", ctx.request.query.as_str());
    let response: Option<DeconResponse> = run_prompt(
        ctx,
        "DecontextualizeContextPrompt",
        &vars,
        PromptLevel::High,
        DECONTEXTUALIZE_TIMEOUT,
    )
    .await;
    apply_response(ctx, response).await;
}

async fn run_full(ctx: &QueryContext) {
    let context_description = resolve_context_item_description(ctx).await.unwrap_or_default();
    let prev_queries = ctx.request.prev_queries.join("; ");
    let mut vars = HashMap::new();
    vars.insert("prev_queries", prev_queries.as_str());
    vars.insert("context_description", context_description.as_str());
    vars.insert("request.query", ctx.request.query.as_str());
    let response: Option<DeconResponse> = run_prompt(
        ctx,
        "FullDecontextualizePrompt",
        &vars,
        PromptLevel::High,
        DECONTEXTUALIZE_TIMEOUT,
    )
    .await;
    apply_response(ctx, response).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SiteSelector;
    use crate::query::{GenerateMode, QueryRequest};

    fn request(prev_queries: Vec<String>, context_url: &str, decon: Option<&str>) -> QueryRequest {
        QueryRequest {
            query: "query".to_string(),
            prev_queries,
            context_url: context_url.to_string(),
            site: SiteSelector::All,
            generate_mode: GenerateMode::None,
            decontextualized_query: decon.map(str::to_string),
            query_id: "q1".to_string(),
        }
    }

    fn context_for(request: QueryRequest) -> crate::query::QueryContext {
        crate::test_support::test_context(request)
    }

    #[test]
    fn no_prev_queries_selects_noop() {
        let ctx = context_for(request(Vec::new(), "", None));
        assert_eq!(select_decontextualizer(&ctx), DecontextualizerKind::NoOp);
    }

    #[test]
    fn caller_supplied_decon_query_selects_noop_even_with_prev_queries() {
        let ctx = context_for(request(vec!["earlier".to_string()], "", Some("already rewritten")));
        assert_eq!(select_decontextualizer(&ctx), DecontextualizerKind::NoOp);
    }

    #[test]
    fn prev_queries_select_prev_query_variant() {
        let ctx = context_for(request(vec!["earlier".to_string()], "", None));
        assert_eq!(select_decontextualizer(&ctx), DecontextualizerKind::PrevQuery);
    }

    /// `ContextUrl` is listed third in the priority order, but
    /// `prev_queries.is_empty()` is checked first and unconditionally
    /// returns `NoOp` — so a `context_url` with no prior queries never
    /// actually reaches the `ContextUrl` branch, matching the reference
    /// implementation's own dead-code-laden elif chain.
    #[test]
    fn long_context_url_with_no_prev_queries_selects_noop() {
        let ctx = context_for(request(Vec::new(), "https://example.com/page", None));
        assert_eq!(select_decontextualizer(&ctx), DecontextualizerKind::NoOp);
    }

    #[tokio::test]
    async fn noop_variant_copies_raw_query_without_llm_call() {
        let ctx = context_for(request(Vec::new(), "", None));
        run(&ctx).await;
        let working = ctx.snapshot();
        assert_eq!(working.decontextualized_query, "query");
        assert!(!working.requires_decontextualization);
        assert!(ctx.state.is_decontextualization_done());
    }

    #[tokio::test]
    async fn resolved_context_item_description_is_trimmed() {
        use crate::item::Item;
        use crate::test_support::{ScriptedLlm, test_context_with};

        let item = Item {
            url: "https://example.com/page".to_string(),
            schema_json: "{\"@type\": \"Recipe\", \"name\": \"Pasta\", \"author\": \"Chef\"}".to_string(),
            name: "Pasta".to_string(),
            site: "seriouseats".to_string(),
        };
        let ctx = test_context_with(
            request(Vec::new(), "https://example.com/page", None),
            ScriptedLlm::constant("{}"),
            vec![item],
        );
        let description = resolve_context_item_description(&ctx).await.unwrap_or_else(|| unreachable!());
        assert!(!description.contains("author"));
        assert!(description.contains("Pasta"));
    }
}
