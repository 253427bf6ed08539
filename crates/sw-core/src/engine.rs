//! Turns a natural-language request into a [`CommandSuggestion`].
//!
//! Providers are tried in order; the first reply that parses into a
//! suggestion wins. Replies are parsed leniently: models wrap JSON in
//! fences, quote booleans and numbers, and leave fields out.

use std::fmt::Write as _;

use serde_json::Value;
use sw_backend::Provider;
use sw_protocol::{CommandSuggestion, RiskLevel, SystemContext};
use thiserror::Error;

/// How many recent commands go into the prompt.
const RECENT_COMMANDS: usize = 5;
const DEFAULT_CONFIDENCE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no providers configured")]
    NoProviders,
    #[error("all providers failed: {}", summarize(.0))]
    AllProvidersFailed(Vec<ProviderFailure>),
}

/// Why one provider did not produce a usable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub provider: String,
    pub reason: String,
}

fn summarize(failures: &[ProviderFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: {}", f.provider, f.reason))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Reasons a provider reply could not become a suggestion.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("reply is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("reply is not a JSON object")]
    NotAnObject,
    #[error("reply has no command")]
    MissingCommand,
}

pub struct CommandEngine {
    providers: Vec<Box<dyn Provider>>,
    context: SystemContext,
}

impl CommandEngine {
    /// `providers` in preference order.
    pub fn new(providers: Vec<Box<dyn Provider>>, context: SystemContext) -> Self {
        Self { providers, context }
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    pub fn build_prompt(&self, query: &str, recent: &[String]) -> String {
        let ctx = &self.context;
        let mut prompt = String::from(
            "You are shellwise, an expert system administrator and shell command specialist.\n\n",
        );
        let _ = writeln!(prompt, "System Context:");
        let _ = writeln!(prompt, "- OS: {}", ctx.os);
        let _ = writeln!(prompt, "- Architecture: {}", ctx.arch);
        let _ = writeln!(prompt, "- Shell: {}", ctx.shell);
        let _ = writeln!(prompt, "- Working Directory: {}", ctx.cwd);
        let _ = writeln!(prompt, "- User: {}", ctx.user);

        let start = recent.len().saturating_sub(RECENT_COMMANDS);
        if start < recent.len() {
            let _ = writeln!(prompt, "\nRecent Commands:");
            for cmd in &recent[start..] {
                let _ = writeln!(prompt, "{cmd}");
            }
        }

        let _ = writeln!(prompt, "\nRequest: \"{query}\"\n");
        prompt.push_str(RESPONSE_FORMAT);
        prompt
    }

    pub async fn generate_command(
        &self,
        query: &str,
        recent: &[String],
    ) -> Result<CommandSuggestion, EngineError> {
        if self.providers.is_empty() {
            return Err(EngineError::NoProviders);
        }

        let prompt = self.build_prompt(query, recent);
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name();
            tracing::info!(provider = name, "requesting command");

            let reason = match provider.generate(&prompt).await {
                Ok(reply) => match parse_response(&reply, name) {
                    Ok(suggestion) => {
                        tracing::info!(provider = name, command = %suggestion.command, "command generated");
                        return Ok(suggestion);
                    }
                    Err(e) => e.to_string(),
                },
                Err(e) => e.to_string(),
            };

            tracing::warn!(provider = name, reason = %reason, "provider failed, trying next");
            failures.push(ProviderFailure {
                provider: name.to_string(),
                reason,
            });
        }

        Err(EngineError::AllProvidersFailed(failures))
    }

    /// Ask for a plain-text explanation of `command`.
    pub async fn explain_command(&self, command: &str) -> Result<String, EngineError> {
        if self.providers.is_empty() {
            return Err(EngineError::NoProviders);
        }

        let prompt = explain_prompt(command);
        let mut failures = Vec::new();

        for provider in &self.providers {
            let name = provider.name();
            match provider.generate(&prompt).await {
                Ok(text) if !text.trim().is_empty() => return Ok(text.trim().to_string()),
                Ok(_) => failures.push(ProviderFailure {
                    provider: name.to_string(),
                    reason: "empty explanation".to_string(),
                }),
                Err(e) => {
                    tracing::warn!(provider = name, error = %e, "explain failed, trying next");
                    failures.push(ProviderFailure {
                        provider: name.to_string(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        Err(EngineError::AllProvidersFailed(failures))
    }
}

const RESPONSE_FORMAT: &str = r#"Generate a safe, efficient shell command following this exact JSON format:

{
    "command": "[exact shell command]",
    "explanation": "[brief explanation of what it does]",
    "safety_level": "[LOW/MEDIUM/HIGH]",
    "requires_sudo": "[true/false]",
    "destructive": "[true/false]",
    "alternatives": ["alternative approach 1", "alternative approach 2"],
    "prerequisites": ["required tool/package 1", "required tool/package 2"],
    "confidence": "[0.0-1.0]"
}

Safety Guidelines:
- Never suggest commands that could harm the system
- Always prefer safer alternatives when available
- Flag destructive operations clearly
- Suggest backups for risky operations
- Use appropriate safety levels: LOW for safe commands, MEDIUM for system changes, HIGH for destructive operations
"#;

fn explain_prompt(command: &str) -> String {
    format!(
        "Explain this shell command in detail:\n\n\
         Command: {command}\n\n\
         Cover what the command does, each part and flag, potential risks or \
         side effects, common use cases and alternative approaches.\n\
         Format as plain structured text suitable for a terminal.\n"
    )
}

/// Parse a provider reply into a suggestion attributed to `provider`.
pub fn parse_response(reply: &str, provider: &str) -> Result<CommandSuggestion, ResponseError> {
    let value: Value = serde_json::from_str(extract_json(reply))?;
    let Value::Object(obj) = value else {
        return Err(ResponseError::NotAnObject);
    };

    let command = obj
        .get("command")
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("");
    if command.is_empty() {
        return Err(ResponseError::MissingCommand);
    }

    Ok(CommandSuggestion {
        command: command.to_string(),
        explanation: obj
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim()
            .to_string(),
        risk_level: obj
            .get("safety_level")
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or(RiskLevel::Medium),
        requires_sudo: lenient_bool(obj.get("requires_sudo")),
        destructive: lenient_bool(obj.get("destructive")),
        alternatives: string_list(obj.get("alternatives")),
        prerequisites: string_list(obj.get("prerequisites")),
        confidence: lenient_confidence(obj.get("confidence")),
        provider: provider.to_string(),
    })
}

/// Strip a markdown fence or surrounding prose around a JSON object.
fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        let body_start = after_fence.find('\n').map(|i| i + 1).unwrap_or(0);
        let body = &after_fence[body_start..];
        if let Some(end) = body.find("```") {
            return body[..end].trim();
        }
    }

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

fn lenient_bool(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "yes" | "1"),
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => false,
    }
}

fn lenient_confidence(value: Option<&Value>) -> f32 {
    let raw = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    match raw {
        Some(c) if c.is_finite() => c.clamp(0.0, 1.0) as f32,
        _ => DEFAULT_CONFIDENCE,
    }
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::String(_) | Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}
