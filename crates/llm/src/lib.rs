//! Proposal Forge LLM
//!
//! Provides a unified interface for the hosted models the proposal pipeline
//! talks to:
//! - Google Gemini (Generative Language API, with hosted web search)
//! - OpenAI and OpenAI-compatible chat-completions endpoints
//!
//! Also includes the HTTP client factory and the `create_provider` factory.

use std::sync::Arc;

pub mod gemini;
pub mod http_client;
pub mod openai;
pub mod provider;
pub mod types;

// Re-export main types
pub use gemini::GeminiProvider;
pub use http_client::build_http_client;
pub use openai::OpenAIProvider;
pub use provider::LlmProvider;
pub use types::*;

/// Build the provider selected by `config.provider`.
pub fn create_provider(config: ProviderConfig) -> LlmResult<Arc<dyn LlmProvider>> {
    tracing::debug!(provider = %config.provider, model = %config.model, "creating LLM provider");
    let provider: Arc<dyn LlmProvider> = match config.provider {
        ProviderType::Gemini => Arc::new(GeminiProvider::new(config)?),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(config)?),
    };
    Ok(provider)
}
