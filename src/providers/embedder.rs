//! `OpenAI`-compatible embedding backend — the one concrete [`Embedder`]
//! implementation this crate ships, mirroring [`super::openai::OpenAiProvider`]'s
//! single-backend-with-registry-rejection pattern.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{CreateEmbeddingRequestArgs, EmbeddingInput};
use async_trait::async_trait;

use crate::config::AppConfig;
use crate::error::Error;

use super::Embedder;

const DEFAULT_EMBEDDING_MODEL: &str = "text-embedding-3-small";

/// `OpenAI`-compatible text embedding backend.
pub struct OpenAiEmbedder {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiEmbedder {
    /// Builds an embedder from application configuration.
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);
        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }
        Self {
            client: Client::with_config(openai_config),
            model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl std::fmt::Debug for OpenAiEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiEmbedder").field("model", &self.model).finish()
    }
}

#[async_trait]
impl Embedder for OpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, Error> {
        let embeddings = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        embeddings.into_iter().next().ok_or_else(|| Error::BadResponse {
            provider: "openai".to_string(),
            message: "embeddings response had no entries".to_string(),
            content: String::new(),
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, Error> {
        let request = CreateEmbeddingRequestArgs::default()
            .model(self.model.clone())
            .input(EmbeddingInput::StringArray(texts.to_vec()))
            .build()
            .map_err(|e| Error::Config(e.to_string()))?;

        let response = self
            .client
            .embeddings()
            .create(request)
            .await
            .map_err(|e| Error::TransientProvider {
                provider: "openai".to_string(),
                message: e.to_string(),
            })?;

        Ok(response.data.into_iter().map(|d| d.embedding).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_impl_does_not_leak_api_key() {
        let config = AppConfig::builder()
            .api_key("super-secret-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let embedder = OpenAiEmbedder::new(&config);
        let debug = format!("{embedder:?}");
        assert!(!debug.contains("super-secret-key"));
    }
}
