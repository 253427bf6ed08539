//! OpenAI chat completions client.
//!
//! Also works against any server exposing the same `/chat/completions`
//! route when `base_url` is overridden.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_http_client, check_status};
use crate::provider::{InitError, Provider, ProviderError, ProviderSettings};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const MAX_TOKENS: u32 = 1000;
const TEMPERATURE: f32 = 0.1;

pub const ENV_VAR: &str = "OPENAI_API_KEY";

pub struct OpenAiClient {
    api_key: String,
    model: String,
    base_url: String,
    http: Client,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, InitError> {
        Ok(Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            http: build_http_client()?,
        })
    }

    /// Registry constructor.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Box<dyn Provider>, InitError> {
        let mut client = Self::new(settings.require_api_key("openai", ENV_VAR)?)?;
        if let Some(model) = &settings.model {
            client.model = model.clone();
        }
        if let Some(url) = &settings.base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(Box::new(client))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl Provider for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: MAX_TOKENS,
            temperature: TEMPERATURE,
        };

        let response = self
            .http
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let resp: ChatResponse = check_status(response).await?.json().await?;
        first_choice(resp)
    }
}

fn first_choice(resp: ChatResponse) -> Result<String, ProviderError> {
    resp.choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or(ProviderError::EmptyResponse)
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
