//! Shared test fixtures: scriptable provider stand-ins and a `QueryContext`
//! builder, used across this crate's unit tests.

#![cfg(test)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::Error;
use crate::item::{Item, SiteSelector};
use crate::message::{ChatRequest, ChatResponse};
use crate::prompts::PromptStore;
use crate::providers::{Embedder, LlmProvider, Retriever};
use crate::query::QueryContext;
use crate::query::QueryRequest;
use crate::stream::StreamSink;

/// An [`LlmProvider`] that returns a fixed, or queued, sequence of raw
/// response bodies — enough to drive the JSON-extraction + parsing path
/// without a real network call.
pub struct ScriptedLlm {
    responses: StdMutex<VecDeque<String>>,
}

impl ScriptedLlm {
    /// Always returns `content` for every call.
    #[must_use]
    pub fn constant(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            responses: StdMutex::new(VecDeque::from([content])),
        }
    }

    /// Returns each entry in `responses` once, in order, then repeats the
    /// last entry for any further calls.
    #[must_use]
    pub fn sequence(responses: Vec<String>) -> Self {
        Self {
            responses: StdMutex::new(responses.into()),
        }
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlm {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, _request: &ChatRequest) -> Result<ChatResponse, Error> {
        let mut queue = self.responses.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        let content = if queue.len() > 1 {
            queue.pop_front().unwrap_or_default()
        } else {
            queue.front().cloned().unwrap_or_default()
        };
        Ok(ChatResponse {
            content,
            usage: crate::message::TokenUsage::default(),
            finish_reason: None,
        })
    }
}

/// A [`Retriever`] backed by a fixed in-memory item list.
pub struct FixtureRetriever {
    items: Vec<Item>,
}

impl FixtureRetriever {
    /// A retriever over `items`, matched by exact URL for `search_by_url`
    /// and returned verbatim (truncated to `num_results`) for `search`.
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }
}

#[async_trait]
impl Retriever for FixtureRetriever {
    async fn search(&self, _query: &str, _site: &SiteSelector, num_results: usize) -> Result<Vec<Item>, Error> {
        Ok(self.items.iter().take(num_results).cloned().collect())
    }

    async fn search_by_url(&self, url: &str) -> Result<Option<Item>, Error> {
        Ok(self.items.iter().find(|item| item.url == url).cloned())
    }

    async fn delete_by_site(&self, _site: &str) -> Result<usize, Error> {
        Ok(0)
    }

    async fn upload(&self, items: &[Item]) -> Result<usize, Error> {
        Ok(items.len())
    }
}

/// A no-op [`Embedder`] — no test in this crate exercises real embeddings.
pub struct ZeroEmbedder;

#[async_trait]
impl Embedder for ZeroEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>, Error> {
        Ok(Vec::new())
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        Ok(texts.iter().map(|_| Vec::new()).collect())
    }
}

/// A `QueryContext` wired up with a dead LLM (every call fails) and an
/// empty retriever — suitable for tests that only exercise selection logic
/// or state bookkeeping, not actual LLM/retrieval calls.
#[must_use]
pub fn test_context(request: QueryRequest) -> QueryContext {
    test_context_with(request, ScriptedLlm::constant(String::new()), Vec::new())
}

/// A `QueryContext` wired up with `llm` and a [`FixtureRetriever`] over
/// `items`.
#[must_use]
pub fn test_context_with(request: QueryRequest, llm: ScriptedLlm, items: Vec<Item>) -> QueryContext {
    let config = AppConfig::builder()
        .api_key("test")
        .build()
        .unwrap_or_else(|_| unreachable!());
    QueryContext::new(
        request,
        Arc::new(llm),
        Arc::new(FixtureRetriever::new(items)),
        Arc::new(ZeroEmbedder),
        PromptStore::new(),
        Arc::new(config),
        StreamSink::non_streaming(),
    )
}
