//! Provider trait definitions

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::memory::{Conversation, Role};
use crate::metrics::MetricsTracker;
use crate::{Error, Result};

/// Token usage reported at the end of a generation.
///
/// `user_tokens` is already isolated to the newest user message: the backend
/// reports the whole prompt's token count, and the provider subtracts the
/// system prompt estimate plus every prior message's recorded length.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub user_tokens: u64,
    pub assistant_tokens: u64,
}

/// One item of a generation stream.
///
/// Content chunks carry `usage: None`. The final item of every stream is a
/// sentinel with empty content and `usage: Some(..)`, because the backend
/// reports token counts only once generation is complete. Consumers detect
/// end-of-generation by checking `usage`, never by inspecting content.
#[derive(Debug, Clone)]
pub struct StreamChunk {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

impl StreamChunk {
    /// A content-bearing chunk
    pub fn content(text: impl Into<String>) -> Self {
        Self {
            content: text.into(),
            usage: None,
        }
    }

    /// The terminal usage sentinel
    pub fn sentinel(usage: TokenUsage) -> Self {
        Self {
            content: String::new(),
            usage: Some(usage),
        }
    }
}

/// Lazy sequence of generation output, finite once the backend completes.
/// Restartable only by querying again; a dropped receiver stops the producer.
pub type CompletionStream = mpsc::Receiver<Result<StreamChunk>>;

/// Tool definition surfaced to the model for function calling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// A structured tool call returned by a tool-capable model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

/// LLM provider trait
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Get provider name
    fn name(&self) -> &str;

    /// Check if the configured model supports native tool calling
    fn supports_tools(&self) -> bool;

    /// Stream a chat completion for the conversation
    async fn query(&self, conversation: &Conversation) -> Result<CompletionStream>;

    /// Ask a tool-capable model for a structured tool call. `Ok(None)` means
    /// the model declined to call a tool.
    async fn tool_query(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<Option<ToolCall>>;

    /// Get the metrics tracker
    fn metrics(&self) -> &MetricsTracker;
}

/// A conversation is queryable only when it ends with a non-empty user
/// message; anything else is a malformed request to the backend.
pub(crate) fn validate_for_query(conversation: &Conversation) -> Result<()> {
    let last = conversation
        .last_message()
        .ok_or_else(|| Error::Provider("empty conversation".to_string()))?;
    if last.role != Role::User || last.content.is_empty() {
        return Err(Error::Provider("last message is not user".to_string()));
    }
    Ok(())
}
