//! sw-backend: AI provider adapters for shellwise.
//!
//! Every backend implements the single [`Provider`] capability: turn a
//! prompt into text. Backends are constructed through the explicit
//! [`ProviderRegistry`], which reports configuration problems as
//! [`InitError`] values instead of silently dropping a provider.

pub mod anthropic;
pub mod fallback;
pub mod gemini;
mod http;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod provider;
pub mod registry;

pub use anthropic::AnthropicClient;
pub use fallback::FallbackProvider;
pub use gemini::GeminiClient;
pub use mock::{MockProvider, MockResponse};
pub use ollama::OllamaClient;
pub use openai::OpenAiClient;
pub use provider::{InitError, Provider, ProviderError, ProviderSettings};
pub use registry::ProviderRegistry;
