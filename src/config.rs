//! Application configuration: builder plus `from_env` resolution, in the
//! same style as the agent-config builders this crate is descended from.

use std::time::Duration;

use crate::error::Error;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_SEARCH_TOP_K: usize = 50;

/// Recognized LLM provider names (matches the reference deployment's
/// provider table). Only `openai` ships a concrete implementation in this
/// crate; the rest are accepted as configuration values and rejected at
/// provider-construction time with [`Error::UnsupportedProvider`].
pub const KNOWN_PROVIDERS: &[&str] = &[
    "openai",
    "anthropic",
    "gemini",
    "azure_openai",
    "llama_azure",
    "deepseek_azure",
    "inception",
    "snowflake",
];

/// Top-level application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Name of the configured LLM provider.
    pub provider: String,
    /// API key for the provider.
    pub api_key: String,
    /// Optional API base URL override (for proxies / Azure-style deployments).
    pub base_url: Option<String>,
    /// Model used for low-tier calls (analyzers, ranking).
    pub low_model: String,
    /// Model used for high-tier calls (decontextualization, synthesis).
    pub high_model: String,
    /// Request timeout.
    pub timeout: Duration,
    /// Max retries for transient provider failures.
    pub max_retries: u32,
    /// Default number of results requested from the retriever.
    pub search_top_k: usize,
    /// Sites allowed when a request does not specify (or specifies an
    /// unrecognized) site.
    pub allowed_sites: Vec<String>,
    /// Whether the `RelevanceDetection` precheck can short-circuit a query
    /// as irrelevant. Disabled by default, matching the reference
    /// deployment's conservative default.
    pub relevance_detection_enabled: bool,
}

impl AppConfig {
    /// Starts a new builder.
    #[must_use]
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder::default()
    }

    /// Builds configuration from environment variables, falling back to
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, Error> {
        AppConfigBuilder::default().from_env().build()
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug, Clone, Default)]
pub struct AppConfigBuilder {
    provider: Option<String>,
    api_key: Option<String>,
    base_url: Option<String>,
    low_model: Option<String>,
    high_model: Option<String>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    search_top_k: Option<usize>,
    allowed_sites: Option<Vec<String>>,
    relevance_detection_enabled: Option<bool>,
}

impl AppConfigBuilder {
    /// Sets the provider name.
    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the low-tier model.
    #[must_use]
    pub fn low_model(mut self, model: impl Into<String>) -> Self {
        self.low_model = Some(model.into());
        self
    }

    /// Sets the high-tier model.
    #[must_use]
    pub fn high_model(mut self, model: impl Into<String>) -> Self {
        self.high_model = Some(model.into());
        self
    }

    /// Sets the allowed-sites list.
    #[must_use]
    pub fn allowed_sites(mut self, sites: Vec<String>) -> Self {
        self.allowed_sites = Some(sites);
        self
    }

    /// Enables or disables the `RelevanceDetection` precheck.
    #[must_use]
    pub fn relevance_detection_enabled(mut self, enabled: bool) -> Self {
        self.relevance_detection_enabled = Some(enabled);
        self
    }

    /// Fills unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.provider.is_none() {
            self.provider = std::env::var("NLWEB_PROVIDER").ok();
        }
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("NLWEB_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("NLWEB_BASE_URL"))
                .ok();
        }
        if self.low_model.is_none() {
            self.low_model = std::env::var("NLWEB_LOW_MODEL").ok();
        }
        if self.high_model.is_none() {
            self.high_model = std::env::var("NLWEB_HIGH_MODEL").ok();
        }
        if self.search_top_k.is_none() {
            self.search_top_k = std::env::var("NLWEB_SEARCH_TOP_K")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.allowed_sites.is_none() {
            self.allowed_sites = std::env::var("NLWEB_ALLOWED_SITES").ok().map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            });
        }
        if self.relevance_detection_enabled.is_none() {
            self.relevance_detection_enabled = std::env::var("NLWEB_RELEVANCE_DETECTION")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        self
    }

    /// Validates and constructs the final configuration.
    pub fn build(self) -> Result<AppConfig, Error> {
        let api_key = self
            .api_key
            .ok_or_else(|| Error::Config("missing API key".to_string()))?;

        Ok(AppConfig {
            provider: self.provider.unwrap_or_else(|| "openai".to_string()),
            api_key,
            base_url: self.base_url,
            low_model: self.low_model.unwrap_or_else(|| "gpt-4o-mini".to_string()),
            high_model: self.high_model.unwrap_or_else(|| "gpt-4o".to_string()),
            timeout: self.timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            search_top_k: self.search_top_k.unwrap_or(DEFAULT_SEARCH_TOP_K),
            allowed_sites: self.allowed_sites.unwrap_or_default(),
            relevance_detection_enabled: self.relevance_detection_enabled.unwrap_or(false),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_requires_api_key() {
        let result = AppConfig::builder().build();
        assert!(result.is_err());
    }

    #[test]
    fn build_applies_defaults() {
        let config = AppConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "openai");
        assert_eq!(config.search_top_k, DEFAULT_SEARCH_TOP_K);
        assert_eq!(config.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn build_honors_overrides() {
        let config = AppConfig::builder()
            .api_key("test-key")
            .provider("anthropic")
            .low_model("low")
            .high_model("high")
            .allowed_sites(vec!["imdb".to_string()])
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.provider, "anthropic");
        assert_eq!(config.low_model, "low");
        assert_eq!(config.high_model, "high");
        assert_eq!(config.allowed_sites, vec!["imdb".to_string()]);
    }

    #[test]
    fn known_providers_includes_openai() {
        assert!(KNOWN_PROVIDERS.contains(&"openai"));
    }

    #[test]
    fn relevance_detection_disabled_by_default() {
        let config = AppConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(!config.relevance_detection_enabled);
    }
}
