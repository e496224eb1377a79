//! LLM provider implementations

mod ollama;
pub mod retry;
mod traits;

use std::sync::Arc;

use crate::config::{ProviderConfig, ProviderName};
use crate::metrics::MetricsTracker;
use crate::Result;

pub use ollama::OllamaProvider;
pub use traits::{
    CompletionStream, LlmProvider, StreamChunk, TokenUsage, ToolCall, ToolDefinition,
};

/// Create a provider from configuration
pub fn create_provider(
    config: &ProviderConfig,
    metrics: MetricsTracker,
) -> Result<Arc<dyn LlmProvider>> {
    match config.name {
        ProviderName::Ollama => {
            let provider = OllamaProvider::with_endpoint(&config.endpoint, &config.model, metrics)?;
            Ok(Arc::new(provider))
        }
    }
}
