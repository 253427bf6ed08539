//! The provider capability and its error types.

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised while talking to a configured provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Errors raised while constructing a provider.
///
/// Distinguishes "not configured" ([`InitError::MissingApiKey`]) from
/// "misconfigured" ([`InitError::UnknownProvider`], [`InitError::KeyCommand`])
/// and from a client that could not be built at all.
#[derive(Debug, Error)]
pub enum InitError {
    #[error("unknown provider '{0}'")]
    UnknownProvider(String),
    #[error("{provider}: no API key configured (set {env_var} or api_key_cmd)")]
    MissingApiKey {
        provider: &'static str,
        env_var: &'static str,
    },
    #[error("{provider}: api_key_cmd failed: {message}")]
    KeyCommand {
        provider: &'static str,
        message: String,
    },
    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Resolved settings handed to a provider constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderSettings {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
}

impl ProviderSettings {
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Return the API key or the "not configured" error for `provider`.
    pub(crate) fn require_api_key(
        &self,
        provider: &'static str,
        env_var: &'static str,
    ) -> Result<String, InitError> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(InitError::MissingApiKey { provider, env_var }),
        }
    }
}

/// A text-generation backend.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name of this provider.
    fn name(&self) -> &str;

    /// Send `prompt` and return the model's text reply.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;
}
