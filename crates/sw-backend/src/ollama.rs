//! Local model client for an Ollama server.
//!
//! Needs no API key; the server URL and model come from settings.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::http::{build_http_client, check_status};
use crate::provider::{InitError, Provider, ProviderError, ProviderSettings};

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "qwen2.5-coder:7b";

#[derive(Serialize, Deserialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: Message,
    #[serde(default)]
    done: bool,
}

pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new() -> Result<Self, InitError> {
        Ok(Self {
            http: build_http_client()?,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    /// Registry constructor.
    pub fn from_settings(settings: &ProviderSettings) -> Result<Box<dyn Provider>, InitError> {
        let mut client = Self::new()?;
        if let Some(model) = &settings.model {
            client.model = model.clone();
        }
        if let Some(url) = &settings.base_url {
            client.base_url = url.trim_end_matches('/').to_string();
        }
        Ok(Box::new(client))
    }
}

#[async_trait]
impl Provider for OllamaClient {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            stream: false,
        };
        let response = self.http.post(&url).json(&request).send().await?;
        let text = check_status(response).await?.text().await?;
        collect_chat_lines(&text)
    }
}

/// Concatenate message content from one or more newline-delimited chat
/// responses, stopping at the first `done` line.
fn collect_chat_lines(text: &str) -> Result<String, ProviderError> {
    let mut full_content = String::new();
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let chat_resp: ChatResponse = serde_json::from_str(line)?;
        full_content.push_str(&chat_resp.message.content);
        if chat_resp.done {
            break;
        }
    }
    if full_content.trim().is_empty() {
        return Err(ProviderError::EmptyResponse);
    }
    Ok(full_content)
}
