//! Explicit mapping from configured provider names to constructors.

use std::collections::BTreeMap;

use crate::provider::{InitError, Provider, ProviderSettings};
use crate::{AnthropicClient, FallbackProvider, GeminiClient, OllamaClient, OpenAiClient};

/// Builds a provider from resolved settings.
pub type Constructor = fn(&ProviderSettings) -> Result<Box<dyn Provider>, InitError>;

/// Alternative spellings accepted on the command line and in config.
const ALIASES: &[(&str, &str)] = &[
    ("claude", "anthropic"),
    ("gpt", "openai"),
    ("gpt4", "openai"),
    ("gpt3.5", "openai"),
    ("local", "ollama"),
];

pub struct ProviderRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl ProviderRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registry with every built-in backend.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        registry.register("anthropic", AnthropicClient::from_settings);
        registry.register("openai", OpenAiClient::from_settings);
        registry.register("gemini", GeminiClient::from_settings);
        registry.register("ollama", OllamaClient::from_settings);
        registry.register("fallback", |_| Ok(Box::new(FallbackProvider::new())));
        registry
    }

    pub fn register(&mut self, name: &'static str, constructor: Constructor) {
        self.constructors.insert(name, constructor);
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    /// Resolve a name or alias to its registered name.
    pub fn canonical_name(&self, name: &str) -> Option<&'static str> {
        let lower = name.trim().to_ascii_lowercase();
        let target = ALIASES
            .iter()
            .find(|(alias, _)| *alias == lower)
            .map(|(_, target)| *target)
            .unwrap_or(lower.as_str());
        self.constructors.get_key_value(target).map(|(k, _)| *k)
    }

    /// Construct the provider registered under `name`.
    pub fn build(
        &self,
        name: &str,
        settings: &ProviderSettings,
    ) -> Result<Box<dyn Provider>, InitError> {
        let canonical = self
            .canonical_name(name)
            .ok_or_else(|| InitError::UnknownProvider(name.to_string()))?;
        let provider = (self.constructors[canonical])(settings)?;
        tracing::debug!(provider = canonical, "provider constructed");
        Ok(provider)
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
