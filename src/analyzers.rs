//! Pre-retrieval analyzers: small, independent precheck steps that each
//! register a named step, run one low-tier LLM prompt, and mark themselves
//! done regardless of outcome — grounded in `pre_retrieval/analyze_query.py`
//! (`DetectItemType`, `DetectMultiItemTypeQuery`, `DetectQueryType`) with
//! `RelevanceDetection`/`Memory`/`RequiredInfo` structurally identical.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;

use crate::llm::{PromptLevel, run_prompt};
use crate::query::QueryContext;
use crate::stream::OutboundMessage;

const ANALYZER_TIMEOUT: Duration = Duration::from_secs(8);

fn query_var(ctx: &QueryContext) -> HashMap<&'static str, &str> {
    let mut vars = HashMap::new();
    vars.insert("request.query", ctx.request.query.as_str());
    vars
}

/// Detects the schema.org item type the query is most likely seeking, and —
/// if a type comes back — overwrites the context's working `item_type` for
/// every downstream prompt lookup.
pub async fn detect_item_type(ctx: &QueryContext) {
    ctx.state.start_step("DetectItemType");

    #[derive(Deserialize)]
    struct Response {
        item_type: String,
    }

    let vars = query_var(ctx);
    let response: Option<Response> =
        run_prompt(ctx, "DetectItemTypePrompt", &vars, PromptLevel::Low, ANALYZER_TIMEOUT).await;
    if let Some(response) = response {
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .item_type = response.item_type;
    }
    ctx.state.step_done("DetectItemType");
}

/// Detects whether the query asks about more than one kind of item. No
/// side effect in this crate beyond running the prompt and marking done —
/// the reference implementation's downstream consumer of this flag
/// (per-type result grouping) lives in the external surface, not the core
/// orchestration this crate covers.
pub async fn detect_multi_item_type_query(ctx: &QueryContext) {
    ctx.state.start_step("DetectMultiItemTypeQuery");

    #[derive(Deserialize)]
    struct Response {
        #[allow(dead_code)]
        is_multi_type: bool,
    }

    let vars = query_var(ctx);
    let _: Option<Response> = run_prompt(
        ctx,
        "DetectMultiItemTypeQueryPrompt",
        &vars,
        PromptLevel::Low,
        ANALYZER_TIMEOUT,
    )
    .await;
    ctx.state.step_done("DetectMultiItemTypeQuery");
}

/// Classifies the query (e.g. lookup vs. comparison vs. recommendation).
/// Structurally identical to `detect_multi_item_type_query`.
pub async fn detect_query_type(ctx: &QueryContext) {
    ctx.state.start_step("DetectQueryType");

    #[derive(Deserialize)]
    struct Response {
        #[allow(dead_code)]
        query_type: String,
    }

    let vars = query_var(ctx);
    let _: Option<Response> =
        run_prompt(ctx, "DetectQueryTypePrompt", &vars, PromptLevel::Low, ANALYZER_TIMEOUT).await;
    ctx.state.step_done("DetectQueryType");
}

/// Judges whether the query is relevant to the corpus at all. Disabled by
/// default (`AppConfig::relevance_detection_enabled`); skipped entirely when
/// the site is `"all"` or `"nlws"` (mirrors `relevance_detection.py::do`,
/// which only runs this check for a narrowed single-site query). When
/// enabled and applicable, a query judged irrelevant marks `query_done`,
/// fires `abort_fast_track`, and sends a `site_is_irrelevant_to_query`
/// message instead of letting ranking proceed.
pub async fn relevance_detection(ctx: &QueryContext) {
    ctx.state.start_step("RelevanceDetection");
    if !ctx.config.relevance_detection_enabled || ctx.request.site.is_all_or_nlws() {
        ctx.state.step_done("RelevanceDetection");
        return;
    }

    #[derive(Deserialize)]
    struct Response {
        is_relevant: bool,
    }

    let item_type = ctx.snapshot().item_type;
    let mut vars = HashMap::new();
    vars.insert("item_type", item_type.as_str());
    vars.insert("request.query", ctx.request.query.as_str());
    let response: Option<Response> = run_prompt(
        ctx,
        "RelevanceDetectionPrompt",
        &vars,
        PromptLevel::Low,
        ANALYZER_TIMEOUT,
    )
    .await;
    if let Some(Response { is_relevant: false }) = response {
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .query_done = true;
        ctx.state.abort_fast_track.set();
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("site_is_irrelevant_to_query").with_field("site", ctx.primary_site()),
            )
            .await;
    }
    ctx.state.step_done("RelevanceDetection");
}

/// Judges whether answering requires recalling something from earlier in
/// the conversation. No side effect in this crate beyond the prompt run —
/// grounded as a named, scoped precheck by the distilled spec.
pub async fn memory(ctx: &QueryContext) {
    ctx.state.start_step("Memory");

    #[derive(Deserialize)]
    struct Response {
        #[allow(dead_code)]
        requires_memory: bool,
    }

    let vars = query_var(ctx);
    let _: Option<Response> =
        run_prompt(ctx, "MemoryPrompt", &vars, PromptLevel::Low, ANALYZER_TIMEOUT).await;
    ctx.state.step_done("Memory");
}

/// Judges whether the query supplies enough information to answer. If not,
/// marks `query_done`, fires `abort_fast_track`, and sends an `ask_user`
/// message with the clarifying question instead of letting ranking proceed.
pub async fn required_info(ctx: &QueryContext) {
    ctx.state.start_step("RequiredInfo");

    #[derive(Deserialize)]
    struct Response {
        has_required_info: bool,
        missing: String,
    }

    let vars = query_var(ctx);
    let response: Option<Response> =
        run_prompt(ctx, "RequiredInfoPrompt", &vars, PromptLevel::Low, ANALYZER_TIMEOUT).await;
    if let Some(Response {
        has_required_info: false,
        missing,
    }) = response
    {
        ctx.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .query_done = true;
        ctx.state.abort_fast_track.set();
        ctx.sink
            .send(
                &ctx.state.connection_alive,
                &ctx.request.query_id,
                OutboundMessage::new("ask_user").with_field("question", missing),
            )
            .await;
    }
    ctx.state.step_done("RequiredInfo");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::SiteSelector;
    use crate::query::{GenerateMode, QueryRequest};
    use crate::test_support::{ScriptedLlm, test_context_with};

    fn request() -> QueryRequest {
        QueryRequest {
            query: "best running shoes".to_string(),
            prev_queries: Vec::new(),
            context_url: String::new(),
            site: SiteSelector::Sites(vec!["backcountry".to_string()]),
            generate_mode: GenerateMode::None,
            decontextualized_query: None,
            query_id: "q1".to_string(),
        }
    }

    #[tokio::test]
    async fn detect_item_type_overwrites_working_item_type() {
        let ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"item_type\": \"Recipe\"}"),
            Vec::new(),
        );
        detect_item_type(&ctx).await;
        assert_eq!(ctx.snapshot().item_type, "Recipe");
    }

    #[tokio::test]
    async fn detect_item_type_leaves_default_on_unparseable_response() {
        let ctx = test_context_with(request(), ScriptedLlm::constant("garbage"), Vec::new());
        let before = ctx.snapshot().item_type;
        detect_item_type(&ctx).await;
        assert_eq!(ctx.snapshot().item_type, before);
    }

    #[tokio::test]
    async fn relevance_detection_disabled_never_marks_query_done() {
        let ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"is_relevant\": false}"),
            Vec::new(),
        );
        relevance_detection(&ctx).await;
        assert!(!ctx.snapshot().query_done);
    }

    #[tokio::test]
    async fn relevance_detection_enabled_marks_query_done_when_irrelevant() {
        let mut ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"is_relevant\": false}"),
            Vec::new(),
        );
        ctx.config = std::sync::Arc::new(
            crate::config::AppConfig::builder()
                .api_key("test")
                .relevance_detection_enabled(true)
                .build()
                .unwrap_or_else(|_| unreachable!()),
        );
        relevance_detection(&ctx).await;
        assert!(ctx.snapshot().query_done);
    }

    #[tokio::test]
    async fn relevance_detection_sends_irrelevant_message_when_enabled() {
        let mut ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"is_relevant\": false}"),
            Vec::new(),
        );
        ctx.config = std::sync::Arc::new(
            crate::config::AppConfig::builder()
                .api_key("test")
                .relevance_detection_enabled(true)
                .build()
                .unwrap_or_else(|_| unreachable!()),
        );
        relevance_detection(&ctx).await;
        let accumulated = ctx.sink.accumulated().unwrap_or_else(|| unreachable!());
        assert!(accumulated.fields.contains_key("site_is_irrelevant_to_query"));
    }

    #[tokio::test]
    async fn relevance_detection_fires_abort_fast_track_when_irrelevant() {
        let mut ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"is_relevant\": false}"),
            Vec::new(),
        );
        ctx.config = std::sync::Arc::new(
            crate::config::AppConfig::builder()
                .api_key("test")
                .relevance_detection_enabled(true)
                .build()
                .unwrap_or_else(|_| unreachable!()),
        );
        relevance_detection(&ctx).await;
        assert!(ctx.state.abort_fast_track.is_set());
    }

    #[tokio::test]
    async fn relevance_detection_skips_when_site_is_all() {
        let mut request = request();
        request.site = SiteSelector::All;
        let mut ctx = test_context_with(request, ScriptedLlm::constant("{\"is_relevant\": false}"), Vec::new());
        ctx.config = std::sync::Arc::new(
            crate::config::AppConfig::builder()
                .api_key("test")
                .relevance_detection_enabled(true)
                .build()
                .unwrap_or_else(|_| unreachable!()),
        );
        relevance_detection(&ctx).await;
        assert!(!ctx.snapshot().query_done);
        assert!(!ctx.state.abort_fast_track.is_set());
        let accumulated = ctx.sink.accumulated().unwrap_or_else(|| unreachable!());
        assert!(!accumulated.fields.contains_key("site_is_irrelevant_to_query"));
    }

    #[tokio::test]
    async fn relevance_detection_skips_when_site_is_nlws() {
        let mut request = request();
        request.site = SiteSelector::Sites(vec!["nlws".to_string()]);
        let mut ctx = test_context_with(request, ScriptedLlm::constant("{\"is_relevant\": false}"), Vec::new());
        ctx.config = std::sync::Arc::new(
            crate::config::AppConfig::builder()
                .api_key("test")
                .relevance_detection_enabled(true)
                .build()
                .unwrap_or_else(|_| unreachable!()),
        );
        relevance_detection(&ctx).await;
        assert!(!ctx.snapshot().query_done);
    }

    #[tokio::test]
    async fn required_info_fires_abort_fast_track_when_missing() {
        let ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"has_required_info\": false, \"missing\": \"which city?\"}"),
            Vec::new(),
        );
        required_info(&ctx).await;
        assert!(ctx.state.abort_fast_track.is_set());
    }

    #[tokio::test]
    async fn required_info_marks_query_done_and_asks_user_when_missing() {
        let ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"has_required_info\": false, \"missing\": \"which city?\"}"),
            Vec::new(),
        );
        required_info(&ctx).await;
        assert!(ctx.snapshot().query_done);
        let accumulated = ctx.sink.accumulated().unwrap_or_else(|| unreachable!());
        let ask_user = accumulated.fields.get("ask_user").unwrap_or_else(|| unreachable!());
        assert_eq!(ask_user.get("question"), Some(&serde_json::Value::String("which city?".to_string())));
    }

    #[tokio::test]
    async fn required_info_present_does_not_mark_query_done() {
        let ctx = test_context_with(
            request(),
            ScriptedLlm::constant("{\"has_required_info\": true, \"missing\": \"\"}"),
            Vec::new(),
        );
        required_info(&ctx).await;
        assert!(!ctx.snapshot().query_done);
    }

    #[tokio::test]
    async fn every_analyzer_marks_its_step_done() {
        let ctx = test_context_with(request(), ScriptedLlm::constant("{}"), Vec::new());
        detect_item_type(&ctx).await;
        detect_multi_item_type_query(&ctx).await;
        detect_query_type(&ctx).await;
        relevance_detection(&ctx).await;
        memory(&ctx).await;
        required_info(&ctx).await;
        ctx.state.force_pre_checks_done();
        assert!(ctx.state.pre_checks_done.is_set());
    }
}
