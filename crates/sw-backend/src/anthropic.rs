//! Anthropic Messages API client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_http_client, check_status};
use crate::provider::{InitError, Provider, ProviderError, ProviderSettings};

const API_URL: &str = "https://api.anthropic.com/v1/messages";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: u32 = 1000;

pub const ENV_VAR: &str = "ANTHROPIC_API_KEY";

/// Anthropic API client.
pub struct AnthropicClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl AnthropicClient {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Result<Self, InitError> {
        Self::with_model(api_key, DEFAULT_MODEL)
    }

    /// Create a new client with a custom model.
    pub fn with_model(
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, InitError> {
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: API_URL.to_string(),
            http: build_http_client()?,
        })
    }

    /// Registry constructor.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Box<dyn Provider>, InitError> {
        let key = settings.require_api_key("anthropic", ENV_VAR)?;
        let model = settings.model.as_deref().unwrap_or(DEFAULT_MODEL);
        let mut client = Self::with_model(key, model)?;
        if let Some(url) = &settings.base_url {
            client.base_url = url.clone();
        }
        Ok(Box::new(client))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Provider for AnthropicClient {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = MessagesRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![ApiMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        let response = self
            .http
            .post(&self.base_url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let resp: MessagesResponse = check_status(response).await?.json().await?;
        extract_text(resp)
    }
}

fn extract_text(resp: MessagesResponse) -> Result<String, ProviderError> {
    resp.content
        .into_iter()
        .find_map(|block| match block {
            ResponseContentBlock::Text { text } => Some(text),
            ResponseContentBlock::Other => None,
        })
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<ApiMessage>,
}

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ResponseContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ResponseContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}
