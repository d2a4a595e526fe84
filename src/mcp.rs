//! Typed MCP function-dispatch surface.
//!
//! Models the function-name table and JSON response shapes of
//! `core/mcp_handler.py::handle_mcp_request` as a directly callable Rust
//! function, so an external HTTP/SSE/MCP transport (built separately,
//! outside this crate, the way the teacher's own `mcp/server.rs` wraps
//! `Orchestrator::query` for the `rmcp` transport) has a typed, testable
//! contract to call into without this crate depending on a transport crate.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::config::AppConfig;
use crate::generate::GenerateOrchestrator;
use crate::item::SiteSelector;
use crate::orchestrator::QueryOrchestrator;
use crate::prompts::PromptStore;
use crate::providers::{Embedder, LlmProvider, Retriever};
use crate::query::{GenerateMode, QueryContext, QueryRequest};
use crate::stream::StreamSink;

/// Function names that all resolve to the same ask/retrieve/rank flow,
/// matching `handle_mcp_request`'s aliasing of `ask`/`ask_nlw`/`query`/`search`.
pub const ASK_ALIASES: &[&str] = &["ask", "ask_nlw", "query", "search"];

/// Every prompt name this crate ships a compiled-in default for, used by
/// `list_prompts`.
const KNOWN_PROMPT_NAMES: &[&str] = &[
    "RankingPrompt",
    "RankingPromptForGenerate",
    "PrevQueryDecontextualizer",
    "DecontextualizeContextPrompt",
    "FullDecontextualizePrompt",
    "DetectItemTypePrompt",
    "DetectMultiItemTypeQueryPrompt",
    "DetectQueryTypePrompt",
    "RelevanceDetectionPrompt",
    "MemoryPrompt",
    "RequiredInfoPrompt",
    "SummarizeResultsPrompt",
    "SynthesizePromptForGenerate",
    "DescriptionPromptForGenerate",
];

/// The tool table `list_tools` reports: name plus a short description,
/// matching the reference deployment's static tool manifest.
const TOOL_TABLE: &[(&str, &str)] = &[
    ("ask", "Retrieve and rank items relevant to a natural-language query."),
    ("get_sites", "List the sites this deployment is configured to search."),
    ("list_prompts", "List the named prompt templates this deployment resolves."),
    ("get_prompt", "Fetch the resolved template text for a named prompt."),
];

/// A dispatched MCP call's response: the function invoked, the query id it
/// was correlated to, and the JSON body.
#[derive(Debug, Clone)]
pub struct McpResponse {
    /// The function name actually dispatched to (post-alias-resolution for
    /// the ask aliases — always the literal `function_name` passed in).
    pub function_name: String,
    /// Correlation id, echoed from `arguments["query_id"]` or empty.
    pub query_id: String,
    /// The JSON response body.
    pub body: Value,
}

fn string_field(arguments: &Map<String, Value>, key: &str) -> String {
    arguments.get(key).and_then(Value::as_str).unwrap_or_default().to_string()
}

fn string_array_field(arguments: &Map<String, Value>, key: &str) -> Vec<String> {
    arguments
        .get(key)
        .and_then(Value::as_array)
        .map(|values| values.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn generate_mode_field(arguments: &Map<String, Value>) -> GenerateMode {
    match arguments.get("generate_mode").and_then(Value::as_str) {
        Some("summarize") => GenerateMode::Summarize,
        Some("generate") => GenerateMode::Generate,
        _ => GenerateMode::None,
    }
}

fn build_request(arguments: &Map<String, Value>) -> QueryRequest {
    let site = string_field(arguments, "site");
    QueryRequest {
        query: string_field(arguments, "query"),
        prev_queries: string_array_field(arguments, "prev_queries"),
        context_url: string_field(arguments, "context_url"),
        site: SiteSelector::from_param(&site),
        generate_mode: generate_mode_field(arguments),
        decontextualized_query: arguments
            .get("decontextualized_query")
            .and_then(Value::as_str)
            .map(str::to_string),
        query_id: string_field(arguments, "query_id"),
    }
}

/// Dispatches one MCP function call against a fresh, non-streaming query
/// context. An external streaming transport would instead hand each
/// orchestration stage's sends through [`function_stream_event`] as they
/// happen and close with [`function_stream_end`]; this entry point runs the
/// whole query to completion and returns the accumulated result, the way
/// a non-streaming MCP tool call would.
pub async fn dispatch(
    function_name: &str,
    arguments: &Map<String, Value>,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    embedder: Arc<dyn Embedder>,
    prompts: PromptStore,
    config: Arc<AppConfig>,
) -> McpResponse {
    let query_id = string_field(arguments, "query_id");

    if ASK_ALIASES.contains(&function_name) {
        return run_ask(function_name, arguments, llm, retriever, embedder, prompts, config).await;
    }

    let body = match function_name {
        "list_tools" => list_tools(),
        "list_prompts" => list_prompts(),
        "get_prompt" => get_prompt(arguments, &prompts),
        "get_sites" => get_sites(&config),
        other => json!({ "error": format!("unknown function: {other}") }),
    };

    McpResponse {
        function_name: function_name.to_string(),
        query_id,
        body,
    }
}

async fn run_ask(
    function_name: &str,
    arguments: &Map<String, Value>,
    llm: Arc<dyn LlmProvider>,
    retriever: Arc<dyn Retriever>,
    embedder: Arc<dyn Embedder>,
    prompts: PromptStore,
    config: Arc<AppConfig>,
) -> McpResponse {
    let request = build_request(arguments);
    let query_id = request.query_id.clone();
    let generate_mode = request.generate_mode;

    let ctx = QueryContext::new(request, llm, retriever, embedder, prompts, config, StreamSink::non_streaming());

    match generate_mode {
        GenerateMode::Generate => GenerateOrchestrator::run(&ctx).await,
        GenerateMode::None | GenerateMode::Summarize => QueryOrchestrator::run(&ctx).await,
    }

    let accumulated = ctx.sink.accumulated().unwrap_or_default();
    let mut body = Map::new();
    body.insert("results".to_string(), Value::Array(accumulated.results));
    for (message_type, fields) in accumulated.fields {
        body.insert(message_type, Value::Object(fields));
    }

    McpResponse {
        function_name: function_name.to_string(),
        query_id,
        body: Value::Object(body),
    }
}

fn list_tools() -> Value {
    let tools: Vec<Value> = TOOL_TABLE
        .iter()
        .map(|(name, description)| json!({ "name": name, "description": description }))
        .collect();
    json!({ "tools": tools })
}

fn list_prompts() -> Value {
    json!({ "prompts": KNOWN_PROMPT_NAMES })
}

fn get_prompt(arguments: &Map<String, Value>, prompts: &PromptStore) -> Value {
    let name = string_field(arguments, "name");
    let site = string_field(arguments, "site");
    let item_type = string_field(arguments, "item_type");
    let item_type = if item_type.is_empty() { "Thing".to_string() } else { item_type };

    match prompts.resolve(&site, &item_type, &name) {
        Some(template) => json!({ "name": name, "template": template }),
        None => json!({ "error": format!("unknown prompt: {name}") }),
    }
}

fn get_sites(config: &AppConfig) -> Value {
    json!({ "sites": config.allowed_sites })
}

/// One streamed MCP event, wrapping a single outbound message the way
/// `MCPFormatter.write_stream` wraps each `send_message` call for the MCP
/// transport.
#[must_use]
pub fn function_stream_event(query_id: &str, message_type: &str, fields: &Map<String, Value>) -> Value {
    let mut event = fields.clone();
    event.insert("message_type".to_string(), Value::String(message_type.to_string()));
    event.insert("query_id".to_string(), Value::String(query_id.to_string()));
    json!({ "type": "function_stream_event", "data": Value::Object(event) })
}

/// The terminal envelope closing a streamed MCP function call.
#[must_use]
pub fn function_stream_end(query_id: &str) -> Value {
    json!({ "type": "function_stream_end", "query_id": query_id })
}
