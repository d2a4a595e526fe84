//! The per-request context threaded through every orchestration stage:
//! the incoming request, the mutable working state every precheck/ranking
//! task reads and writes, and the collaborators (LLM, retriever, prompts,
//! stream sink) those tasks call through.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use crate::config::AppConfig;
use crate::item::{Item, SiteSelector};
use crate::prompts::PromptStore;
use crate::providers::{Embedder, LlmProvider, Retriever};
use crate::ranking::RankedAnswer;
use crate::state::HandlerState;
use crate::stream::StreamSink;

/// What kind of answer the caller wants back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerateMode {
    /// Plain ranked-list response, no extra synthesis.
    None,
    /// Ranked list plus a short summary of the top 3 results.
    Summarize,
    /// RAG-style single synthesized answer with citations (no ranked list).
    Generate,
}

/// The incoming request, as handed to an orchestrator. Immutable for the
/// lifetime of the query — rewrites go into [`WorkingState::decontextualized_query`]
/// rather than mutating this struct.
#[derive(Debug, Clone)]
pub struct QueryRequest {
    /// The user's raw query text.
    pub query: String,
    /// Prior queries in this conversation, oldest first.
    pub prev_queries: Vec<String>,
    /// URL of the page the user was on when they asked, if any.
    pub context_url: String,
    /// Site(s) to search.
    pub site: SiteSelector,
    /// Whether/how to layer synthesis on top of ranking.
    pub generate_mode: GenerateMode,
    /// A caller-supplied decontextualized query, if the caller already did
    /// this rewriting upstream (e.g. a chat client with its own history).
    pub decontextualized_query: Option<String>,
    /// Correlation id stamped onto every outbound message.
    pub query_id: String,
}

/// Mutable fields every stage of the pipeline reads and writes. Guarded by a
/// single mutex since the set of stages touching it overlaps heavily and the
/// critical sections are all short (field reads/writes, no `.await` held
/// across the lock).
#[derive(Debug, Clone)]
pub struct WorkingState {
    /// The query to actually retrieve/rank with, after decontextualization.
    pub decontextualized_query: String,
    /// Whether a decontextualizer determined the query needed rewriting.
    pub requires_decontextualization: bool,
    /// Working item type, refined by `DetectItemType`.
    pub item_type: String,
    /// Set once the query is fully answered (or abandoned) and no further
    /// stage should do work.
    pub query_done: bool,
    /// Set by the ranker when a fast-track run actually sent results.
    pub fast_track_worked: bool,
    /// Items produced by retrieval (fast-track or fallback).
    pub final_retrieved_items: Vec<Item>,
    /// Items that cleared the ranking bar, in the order they were scored.
    pub final_ranked_answers: Vec<RankedAnswer>,
    /// Summary text, once `post_ranking` has produced one.
    pub summary: Option<String>,
}

impl WorkingState {
    fn new(request: &QueryRequest) -> Self {
        Self {
            decontextualized_query: request
                .decontextualized_query
                .clone()
                .unwrap_or_else(|| request.query.clone()),
            requires_decontextualization: false,
            item_type: "Thing".to_string(),
            query_done: false,
            fast_track_worked: false,
            final_retrieved_items: Vec::new(),
            final_ranked_answers: Vec::new(),
            summary: None,
        }
    }
}

/// Everything a precheck/ranking/orchestration stage needs: the request,
/// shared mutable state, the synchronization events, and the provider
/// collaborators.
pub struct QueryContext {
    /// The incoming request.
    pub request: QueryRequest,
    /// Mutable fields shared across stages.
    pub working: StdMutex<WorkingState>,
    /// Precheck step bookkeeping and synchronization events.
    pub state: HandlerState,
    /// LLM backend used by every prompt-driven stage.
    pub llm: Arc<dyn LlmProvider>,
    /// Vector-store retriever.
    pub retriever: Arc<dyn Retriever>,
    /// Embedding backend (used by retrieval-adjacent stages, not by most
    /// prompt-driven ones).
    pub embedder: Arc<dyn Embedder>,
    /// Prompt template resolution.
    pub prompts: PromptStore,
    /// Application configuration (models, timeouts, allowed sites).
    pub config: Arc<AppConfig>,
    /// Outbound message sink.
    pub sink: StreamSink,
}

impl QueryContext {
    /// Builds a fresh context for one incoming request.
    #[must_use]
    pub fn new(
        request: QueryRequest,
        llm: Arc<dyn LlmProvider>,
        retriever: Arc<dyn Retriever>,
        embedder: Arc<dyn Embedder>,
        prompts: PromptStore,
        config: Arc<AppConfig>,
        sink: StreamSink,
    ) -> Self {
        let working = WorkingState::new(&request);
        Self {
            request,
            working: StdMutex::new(working),
            state: HandlerState::new(),
            llm,
            retriever,
            embedder,
            prompts,
            config,
            sink,
        }
    }

    /// The site to use for prompt/item-type resolution.
    #[must_use]
    pub fn primary_site(&self) -> String {
        self.request.site.primary().to_string()
    }

    /// Locks and returns a clone of the current working state — convenient
    /// for stages that read several fields at once without holding the lock
    /// across an `.await`.
    #[must_use]
    pub fn snapshot(&self) -> WorkingState {
        self.working
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}
