//! Provider registry: maps a configured provider name to a concrete
//! [`LlmProvider`] implementation.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::Error;

use super::embedder::OpenAiEmbedder;
use super::memory_retriever::InMemoryRetriever;
use super::openai::OpenAiProvider;
use super::{Embedder, LlmProvider, Retriever};

/// Builds an [`LlmProvider`] for the configured provider name.
///
/// Only `"openai"` (and OpenAI-compatible deployments reached via
/// `base_url`) has a concrete implementation in this crate; every other
/// name in [`crate::config::KNOWN_PROVIDERS`] is recognized as valid
/// configuration but rejected here with [`Error::UnsupportedProvider`].
pub fn create_llm_provider(config: &AppConfig) -> Result<Arc<dyn LlmProvider>, Error> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config))),
        other => Err(Error::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Builds an [`Embedder`] for the configured provider name. Same
/// single-backend-with-rejection shape as [`create_llm_provider`].
pub fn create_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, Error> {
    match config.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiEmbedder::new(config))),
        other => Err(Error::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}

/// Builds the [`Retriever`] backing a fresh item index. Unlike the LLM
/// and embedding ports, this is not dispatched by provider name: every
/// deployment gets the same in-memory vector index, seeded via
/// [`Retriever::upload`].
#[must_use]
pub fn create_retriever(embedder: Arc<dyn Embedder>) -> Arc<dyn Retriever> {
    Arc::new(InMemoryRetriever::new(embedder))
}
