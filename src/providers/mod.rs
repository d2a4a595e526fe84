//! The three provider ports the orchestration pipeline is built against:
//! an LLM completion port, an embedding port, and a vector-store retrieval
//! port. Concrete backends live in [`openai`], [`embedder`] and
//! [`memory_retriever`]; the registry in [`registry`] maps configured
//! provider names to implementations.

pub mod embedder;
pub mod memory_retriever;
pub mod openai;
pub mod registry;

use async_trait::async_trait;

use crate::error::Error;
use crate::item::{Item, SiteSelector};
use crate::message::{ChatRequest, ChatResponse};

/// A chat-completion backend.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Stable provider name, e.g. `"openai"`.
    fn name(&self) -> &'static str;

    /// Runs a single completion request.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, Error>;
}

/// A text-embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a single string.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error>;

    /// Embeds a batch of strings in one call.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error>;
}

/// A vector-store retrieval backend.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Searches `site` for items relevant to `query`.
    async fn search(
        &self,
        query: &str,
        site: &SiteSelector,
        num_results: usize,
    ) -> Result<Vec<Item>, Error>;

    /// Looks up a single item by its exact URL.
    async fn search_by_url(&self, url: &str) -> Result<Option<Item>, Error>;

    /// Deletes every indexed item for a site, returning the count removed.
    async fn delete_by_site(&self, site: &str) -> Result<usize, Error>;

    /// Uploads/indexes a batch of items, returning the count uploaded.
    async fn upload(&self, items: &[Item]) -> Result<usize, Error>;
}
