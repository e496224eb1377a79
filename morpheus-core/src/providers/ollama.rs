//! Ollama provider: streaming chat over the NDJSON `/api/chat` endpoint

use backon::Retryable;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc;

use async_trait::async_trait;

use crate::memory::{Conversation, Role};
use crate::metrics::MetricsTracker;
use crate::providers::retry::{build_backoff, is_retriable_error, RetryConfig};
use crate::providers::traits::validate_for_query;
use crate::{Error, Result};

use super::{CompletionStream, LlmProvider, StreamChunk, TokenUsage, ToolCall, ToolDefinition};

/// Generation options and capability flags for a supported model family.
/// Model availability on the Ollama host itself is up to the operator.
struct ModelSpec {
    prefix: &'static str,
    temperature: f32,
    num_ctx: u32,
    tools: bool,
}

const SUPPORTED_MODELS: &[ModelSpec] = &[
    ModelSpec {
        prefix: "mistral",
        temperature: 0.5,
        num_ctx: 8192,
        tools: true,
    },
    ModelSpec {
        prefix: "llama3.1",
        temperature: 0.5,
        num_ctx: 8192,
        tools: false,
    },
    ModelSpec {
        prefix: "gemma2:9b",
        temperature: 0.5,
        num_ctx: 8192,
        tools: false,
    },
];

/// Match a model name (possibly tagged, e.g. `mistral:7b-instruct`) against
/// the supported families by prefix.
fn match_model(model: &str) -> Option<&'static ModelSpec> {
    SUPPORTED_MODELS
        .iter()
        .find(|spec| model.starts_with(spec.prefix))
}

/// Estimate token count from text (roughly 4 characters per token).
/// Used for the system prompt, whose per-message cost Ollama never reports.
fn estimate_tokens(text: &str) -> u64 {
    (text.len() as u64).div_ceil(4)
}

/// One NDJSON line of a streamed chat response
#[derive(Debug, Deserialize)]
struct ChatLine {
    #[serde(default)]
    message: Option<ChatLineMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    prompt_eval_count: Option<u64>,
    #[serde(default)]
    eval_count: Option<u64>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatLineMessage {
    #[serde(default)]
    content: String,
}

/// Ollama provider
pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    spec: &'static ModelSpec,
    retry: RetryConfig,
    metrics: MetricsTracker,
}

impl OllamaProvider {
    /// Create with the default localhost endpoint (http://localhost:11434)
    pub fn new(model: impl Into<String>, metrics: MetricsTracker) -> Result<Self> {
        Self::with_endpoint("http://localhost:11434", model, metrics)
    }

    /// Create with a custom endpoint
    pub fn with_endpoint(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        metrics: MetricsTracker,
    ) -> Result<Self> {
        let model = model.into();
        let spec = match_model(&model)
            .ok_or_else(|| Error::Provider(format!("model {model} is not supported")))?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Provider(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model,
            spec,
            retry: RetryConfig::default(),
            metrics,
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.endpoint)
    }

    /// POST with backoff on transient failures; non-2xx statuses are errors
    async fn send(&self, url: String, body: serde_json::Value) -> Result<reqwest::Response> {
        let request = || async {
            let response = self.client.post(&url).json(&body).send().await?;
            response.error_for_status()
        };

        request
            .retry(build_backoff(&self.retry))
            .when(|err: &reqwest::Error| is_retriable_error(&err.to_string()))
            .await
            .map_err(|e| Error::Provider(format!("Ollama request failed: {e}")))
    }
}

/// Serialize a conversation into the wire message list
fn payload_messages(conversation: &Conversation) -> Vec<serde_json::Value> {
    conversation
        .messages
        .iter()
        .map(|m| json!({ "role": m.role.to_string(), "content": m.content }))
        .collect()
}

/// Values subtracted from the reported prompt token count to isolate the
/// cost of the newest user message: (system prompt estimate, sum of prior
/// messages' recorded token lengths).
fn user_token_adjustments(conversation: &Conversation) -> (u64, u64) {
    let system_estimate = conversation
        .messages
        .first()
        .filter(|m| m.role == Role::System)
        .map(|m| estimate_tokens(&m.content))
        .unwrap_or(0);

    let prior = conversation.messages[..conversation.messages.len().saturating_sub(1)]
        .iter()
        .map(|m| m.token_length)
        .sum();

    (system_estimate, prior)
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn supports_tools(&self) -> bool {
        self.spec.tools
    }

    async fn query(&self, conversation: &Conversation) -> Result<CompletionStream> {
        validate_for_query(conversation)?;

        let (system_estimate, prior_tokens) = user_token_adjustments(conversation);

        let body = json!({
            "model": self.model,
            "messages": payload_messages(conversation),
            "stream": true,
            "options": {
                "temperature": self.spec.temperature,
                "num_ctx": self.spec.num_ctx,
            },
        });

        let response = self.send(self.chat_url(), body).await?;
        let mut byte_stream = response.bytes_stream();

        let (tx, rx) = mpsc::channel(32);
        let metrics = self.metrics.clone();

        tokio::spawn(async move {
            let mut buffer = String::new();

            while let Some(chunk) = byte_stream.next().await {
                let bytes = match chunk {
                    Ok(bytes) => bytes,
                    Err(e) => {
                        let _ = tx
                            .send(Err(Error::Provider(format!("Ollama stream failed: {e}"))))
                            .await;
                        return;
                    }
                };
                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // parse newline-delimited JSON
                while let Some(pos) = buffer.find('\n') {
                    let line = buffer[..pos].trim().to_string();
                    buffer.drain(..=pos);
                    if line.is_empty() {
                        continue;
                    }

                    let parsed: ChatLine = match serde_json::from_str(&line) {
                        Ok(parsed) => parsed,
                        Err(_) => continue,
                    };

                    if let Some(message) = parsed.error {
                        let _ = tx.send(Err(Error::Provider(message))).await;
                        return;
                    }

                    if let Some(content) = parsed.message.map(|m| m.content) {
                        if !content.is_empty()
                            && tx.send(Ok(StreamChunk::content(content))).await.is_err()
                        {
                            // receiver dropped, stop streaming
                            return;
                        }
                    }

                    if parsed.done {
                        let prompt_tokens = parsed.prompt_eval_count.unwrap_or(0);
                        let user_tokens = prompt_tokens
                            .saturating_sub(system_estimate)
                            .saturating_sub(prior_tokens);
                        let assistant_tokens = parsed.eval_count.unwrap_or(0);

                        metrics.record_tokens(user_tokens, assistant_tokens);
                        let _ = tx
                            .send(Ok(StreamChunk::sentinel(TokenUsage {
                                user_tokens,
                                assistant_tokens,
                            })))
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn tool_query(
        &self,
        conversation: &Conversation,
        tools: &[ToolDefinition],
    ) -> Result<Option<ToolCall>> {
        if !self.spec.tools {
            return Err(Error::Unsupported(format!(
                "{} does not support tool calling",
                self.model
            )));
        }
        if tools.is_empty() {
            return Err(Error::Validation("empty tool list".to_string()));
        }
        validate_for_query(conversation)?;

        let payload_tools: Vec<serde_json::Value> = tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.parameters,
                    },
                })
            })
            .collect();

        let body = json!({
            "model": self.model,
            "messages": payload_messages(conversation),
            "stream": false,
            "tools": payload_tools,
        });

        let response = self.send(self.chat_url(), body).await?;
        let data: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Provider(format!("Ollama response decode failed: {e}")))?;

        let call = data
            .get("message")
            .and_then(|m| m.get("tool_calls"))
            .and_then(|calls| calls.as_array())
            .and_then(|calls| calls.first())
            .and_then(|call| call.get("function"))
            .and_then(|function| {
                let name = function.get("name")?.as_str()?.to_string();
                let arguments = function
                    .get("arguments")
                    .cloned()
                    .unwrap_or(serde_json::Value::Null);
                Some(ToolCall { name, arguments })
            });

        Ok(call)
    }

    fn metrics(&self) -> &MetricsTracker {
        &self.metrics
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::memory::Message;

    #[test]
    fn test_provider_default_endpoint() {
        let provider = OllamaProvider::new("mistral", MetricsTracker::new()).unwrap();
        assert_eq!(provider.chat_url(), "http://localhost:11434/api/chat");
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn test_provider_trims_trailing_slash() {
        let provider =
            OllamaProvider::with_endpoint("http://ollama.lab:11434/", "mistral", MetricsTracker::new())
                .unwrap();
        assert_eq!(provider.chat_url(), "http://ollama.lab:11434/api/chat");
    }

    #[test]
    fn test_unsupported_model_rejected() {
        let result = OllamaProvider::new("wizardcoder", MetricsTracker::new());
        assert!(matches!(result, Err(Error::Provider(_))));
    }

    #[test]
    fn test_model_prefix_matching() {
        assert!(match_model("mistral:7b-instruct").unwrap().tools);
        assert!(!match_model("llama3.1:70b").unwrap().tools);
        assert!(match_model("gemma2:9b").is_some());
        assert!(match_model("gemma2:2b").is_none());
    }

    #[test]
    fn test_supports_tools_follows_model() {
        let mistral = OllamaProvider::new("mistral", MetricsTracker::new()).unwrap();
        assert!(mistral.supports_tools());

        let llama = OllamaProvider::new("llama3.1", MetricsTracker::new()).unwrap();
        assert!(!llama.supports_tools());
    }

    #[test]
    fn test_payload_messages_roles() {
        let mut conversation = Conversation::new(1, "test");
        conversation.add_message(Message::system("prompt"));
        conversation.add_message(Message::user("Hi"));

        let payload = payload_messages(&conversation);
        assert_eq!(payload[0]["role"], "system");
        assert_eq!(payload[1]["role"], "user");
        assert_eq!(payload[1]["content"], "Hi");
    }

    #[test]
    fn test_user_token_adjustments() {
        let mut conversation = Conversation::new(1, "test");
        // 40 chars of system prompt -> estimate 10 tokens
        conversation.add_message(Message::system("a".repeat(40)));
        let mut prior_user = Message::user("earlier question");
        prior_user.set_token_length(7);
        let mut prior_assistant = Message::assistant("earlier answer");
        prior_assistant.set_token_length(11);
        conversation.add_message(prior_user);
        conversation.add_message(prior_assistant);
        conversation.add_message(Message::user("new question"));

        let (system_estimate, prior) = user_token_adjustments(&conversation);
        assert_eq!(system_estimate, 10);
        assert_eq!(prior, 18);
    }

    #[test]
    fn test_user_token_adjustments_without_system() {
        let mut conversation = Conversation::new(1, "test");
        conversation.add_message(Message::user("only message"));

        let (system_estimate, prior) = user_token_adjustments(&conversation);
        assert_eq!(system_estimate, 0);
        assert_eq!(prior, 0);
    }

    #[test]
    fn test_chat_line_parses_content_chunk() {
        let line = r#"{"model":"mistral","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let parsed: ChatLine = serde_json::from_str(line).unwrap();
        assert_eq!(parsed.message.unwrap().content, "Hel");
        assert!(!parsed.done);
        assert!(parsed.prompt_eval_count.is_none());
    }

    #[test]
    fn test_chat_line_parses_terminal_counts() {
        let line = r#"{"model":"mistral","message":{"role":"assistant","content":""},"done":true,"prompt_eval_count":42,"eval_count":128}"#;
        let parsed: ChatLine = serde_json::from_str(line).unwrap();
        assert!(parsed.done);
        assert_eq!(parsed.prompt_eval_count, Some(42));
        assert_eq!(parsed.eval_count, Some(128));
    }

    #[tokio::test]
    async fn test_tool_query_unsupported_model() {
        let provider = OllamaProvider::new("llama3.1", MetricsTracker::new()).unwrap();
        let mut conversation = Conversation::new(1, "test");
        conversation.add_message(Message::user("search this"));

        let tools = vec![ToolDefinition {
            name: "search_web".to_string(),
            description: "Search the web".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let result = provider.tool_query(&conversation, &tools).await;
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_tool_query_empty_tool_list() {
        let provider = OllamaProvider::new("mistral", MetricsTracker::new()).unwrap();
        let mut conversation = Conversation::new(1, "test");
        conversation.add_message(Message::user("search this"));

        let result = provider.tool_query(&conversation, &[]).await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }
}
