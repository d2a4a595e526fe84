//! `nlweb-rs`: a natural-language query orchestration engine over a
//! schema.org item corpus.
//!
//! A query flows through four layers:
//!
//! 1. **Context** ([`query`], [`state`]) — a [`query::QueryContext`] bundles
//!    the incoming request, shared mutable [`query::WorkingState`], the
//!    precheck synchronization events in [`state::HandlerState`], and the
//!    provider/prompt/sink collaborators every stage calls through.
//! 2. **Prechecks** ([`analyzers`], [`decontextualize`], [`fast_track`]) —
//!    a concurrent fan-out of LLM-backed analyzers (item type, query type,
//!    relevance, memory, required info) plus query rewriting and a
//!    speculative retrieval+ranking path, all driven through [`llm::run_prompt`].
//! 3. **Ranking and synthesis** ([`ranking`], [`post_ranking`], [`generate`]) —
//!    scores retrieved items against the query, early-sends high scorers,
//!    then either summarizes the top results or (in generate mode) replaces
//!    the ranked list with a single synthesized, cited answer.
//! 4. **Orchestration and surfaces** ([`orchestrator`], [`mcp`], [`who`]) —
//!    ties prechecks, retrieval, and ranking into one pipeline per
//!    [`query::GenerateMode`], and exposes a typed dispatch surface an
//!    external HTTP/SSE/MCP transport would call into.
//!
//! [`providers`] defines the LLM/embedding/retrieval ports those stages are
//! written against, with one concrete `OpenAI`-compatible backend per port
//! plus an in-memory cosine-similarity retriever. [`stream`] is the single
//! chokepoint every stage sends outbound messages through, supporting both
//! a streaming transport and a non-streaming accumulated response. [`trim`]
//! strips bulky schema.org fields from an item's JSON before it reaches any
//! ranking, synthesis, or context prompt.

pub mod analyzers;
pub mod config;
pub mod decontextualize;
pub mod error;
pub mod fast_track;
pub mod generate;
pub mod item;
pub mod json_extract;
pub mod llm;
pub mod mcp;
pub mod message;
pub mod orchestrator;
pub mod post_ranking;
pub mod prompts;
pub mod providers;
pub mod query;
pub mod ranking;
pub mod state;
pub mod stream;
pub mod trim;
pub mod who;

#[cfg(test)]
mod test_support;

pub use config::AppConfig;
pub use error::Error;
pub use query::{GenerateMode, QueryContext, QueryRequest};
