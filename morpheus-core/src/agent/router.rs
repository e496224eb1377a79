//! Query routing: pick the behavior branch for a user query

use std::sync::Arc;

use tracing::warn;

use crate::memory::{Conversation, Message};
use crate::providers::LlmProvider;
use crate::Result;

/// The behavior branch selected for a query
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Route {
    /// Plain conversational answer
    #[default]
    General,
    /// Step-by-step reasoning with hidden thought blocks
    Reasoning,
    /// Tool-augmented answer
    ToolUse,
}

impl Route {
    /// Parse a router reply. The contract with the router prompt is a single
    /// leading digit; anything else is unparseable.
    fn from_reply(reply: &str) -> Option<Self> {
        match reply.trim().chars().next()? {
            '1' => Some(Route::General),
            '2' => Some(Route::Reasoning),
            '3' => Some(Route::ToolUse),
            _ => None,
        }
    }
}

/// Classifies user queries with a dedicated single-shot generation call
pub struct QueryRouter {
    provider: Arc<dyn LlmProvider>,
    prompt: String,
}

impl QueryRouter {
    pub fn new(provider: Arc<dyn LlmProvider>, prompt: impl Into<String>) -> Self {
        Self {
            provider,
            prompt: prompt.into(),
        }
    }

    /// Route a query. Classification never fails a turn: an unparseable
    /// reply logs a warning and falls back to [`Route::General`]. Only a
    /// provider transport failure is an error.
    pub async fn route(&self, user_input: &str) -> Result<Route> {
        // side-channel conversation; the real history never sees this
        let mut request = Conversation::new(0, "router");
        request.add_message(Message::system(&self.prompt));
        request.add_message(Message::user(user_input));

        let mut stream = self.provider.query(&request).await?;
        let mut reply = String::new();
        while let Some(chunk) = stream.recv().await {
            let chunk = chunk?;
            if chunk.usage.is_some() {
                break;
            }
            reply.push_str(&chunk.content);
        }

        match Route::from_reply(&reply) {
            Some(route) => Ok(route),
            None => {
                warn!(%reply, "unparseable router reply, defaulting to general");
                Ok(Route::General)
            }
        }
    }
}
