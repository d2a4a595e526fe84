//! Crate-wide error type.
//!
//! Mirrors the distilled error-kind taxonomy: transient provider failures,
//! unparseable responses, lost connections, configuration problems, and
//! fatal orchestration errors.

use thiserror::Error;

/// All errors produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    /// A provider call failed in a way that may succeed on retry.
    #[error("transient provider error ({provider}): {message}")]
    TransientProvider {
        /// Name of the provider that failed.
        provider: String,
        /// Human-readable failure detail.
        message: String,
    },

    /// A provider returned a response that could not be parsed into the
    /// expected shape.
    #[error("bad response from {provider}: {message} (content: {content})")]
    BadResponse {
        /// Name of the provider that returned the response.
        provider: String,
        /// What went wrong.
        message: String,
        /// A preview of the raw content that failed to parse.
        content: String,
    },

    /// The client connection was lost mid-stream.
    #[error("connection lost")]
    ConnectionLost,

    /// The crate was misconfigured (missing API key, unknown provider, …).
    #[error("configuration error: {0}")]
    Config(String),

    /// No provider implementation is registered under this name.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The requested provider name.
        name: String,
    },

    /// An unrecoverable error in the orchestration pipeline itself.
    #[error("orchestration error: {0}")]
    FatalOrchestration(String),
}

impl Error {
    /// True for errors a precheck step should swallow (log and mark its
    /// step done anyway) rather than propagate and abort the whole query.
    #[must_use]
    pub const fn is_swallowable(&self) -> bool {
        matches!(
            self,
            Self::TransientProvider { .. } | Self::BadResponse { .. } | Self::ConnectionLost
        )
    }
}
