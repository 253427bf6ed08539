//! Mock provider for testing.
//!
//! Replays a scripted sequence of replies and records every prompt it
//! receives, so tests at every layer can run without HTTP.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::sleep;

use crate::provider::{Provider, ProviderError};

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockResponse {
    /// Reply with text.
    Text { content: String },
    /// Fail with an API error.
    Error { message: String },
    /// Wait before producing the next scripted reply.
    Delay { ms: u64 },
}

/// Scripted provider. Once the script is exhausted every call returns
/// [`ProviderError::EmptyResponse`].
pub struct MockProvider {
    name: String,
    script: Mutex<VecDeque<MockResponse>>,
    prompts: Mutex<Vec<String>>,
}

impl MockProvider {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: Mutex::new(VecDeque::new()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn with_responses(self, responses: Vec<MockResponse>) -> Self {
        if let Ok(mut script) = self.script.lock() {
            script.extend(responses);
        }
        self
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> Option<MockResponse> {
        self.script.lock().ok().and_then(|mut s| s.pop_front())
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        loop {
            match self.next_response() {
                Some(MockResponse::Text { content }) => return Ok(content),
                Some(MockResponse::Error { message }) => return Err(ProviderError::Api(message)),
                Some(MockResponse::Delay { ms }) => {
                    // Delay doesn't consume the call
                    sleep(Duration::from_millis(ms)).await;
                }
                None => return Err(ProviderError::EmptyResponse),
            }
        }
    }
}

/// Built-in test fixtures for common scenarios.
pub mod fixtures {
    use super::*;

    /// A provider that answers once with a well-formed suggestion.
    pub fn suggestion(name: &str, command: &str, safety_level: &str) -> MockProvider {
        let body = serde_json::json!({
            "command": command,
            "explanation": format!("Runs {command}"),
            "safety_level": safety_level,
            "requires_sudo": command.starts_with("sudo "),
            "destructive": false,
            "alternatives": [],
            "prerequisites": [],
            "confidence": 0.9,
        });
        MockProvider::new(name).with_responses(vec![MockResponse::Text {
            content: format!("```json\n{body}\n```"),
        }])
    }

    /// A provider whose only reply is an API error.
    pub fn failing(name: &str, message: &str) -> MockProvider {
        MockProvider::new(name).with_responses(vec![MockResponse::Error {
            message: message.to_string(),
        }])
    }
}
