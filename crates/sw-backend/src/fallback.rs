//! Keyword-based provider used when no AI backend is configured.

use async_trait::async_trait;

use crate::provider::{Provider, ProviderError};

/// Marker the generation prompt uses in front of the user's request.
const REQUEST_MARKER: &str = "Request: \"";

pub struct FallbackProvider;

impl FallbackProvider {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for FallbackProvider {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let query = extract_request(prompt).to_lowercase();
        let command = suggest(&query);
        let reply = serde_json::json!({
            "command": command,
            "explanation": "Basic command suggestion (configure an AI provider for better results)",
            "safety_level": "LOW",
            "requires_sudo": false,
            "destructive": false,
            "alternatives": [],
            "prerequisites": [],
            "confidence": 0.3,
        });
        Ok(reply.to_string())
    }
}

fn extract_request(prompt: &str) -> &str {
    match prompt.find(REQUEST_MARKER) {
        Some(start) => {
            let rest = &prompt[start + REQUEST_MARKER.len()..];
            rest.find('"').map(|end| &rest[..end]).unwrap_or(rest)
        }
        None => "",
    }
}

fn suggest(query: &str) -> &'static str {
    if query.contains("list") || query.contains("show") {
        "ls -la"
    } else if query.contains("find") {
        "find . -name '*'"
    } else if query.contains("disk") || query.contains("space") {
        "df -h"
    } else if query.contains("process") {
        "ps aux"
    } else {
        "echo 'Configure an AI provider (anthropic, openai, gemini, ollama) for better command generation'"
    }
}
