//! Tool-call extraction and execution
//!
//! The model is asked for a tool call in free text and reliably emits prose
//! before the structured part, so extraction hunts for the last top-level
//! JSON-like object in the reply. Every failure mode of this pipeline is
//! modeled as an outcome value; only provider transport failures are errors.

use std::collections::HashMap;
use std::sync::Arc;

use futures::Stream;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{error, info};

use crate::memory::{Conversation, Message, Role};
use crate::providers::LlmProvider;
use crate::tools::ToolRegistry;
use crate::Result;

static TOOL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    // last top-level {...} or [...] at the end of the reply
    Regex::new(r"\s*(\{[^}]*(?:\{[^}]*\})*[^}]*\}|\[[^\]]*(?:\[[^\]]*\])*[^\]]*\])\s*$")
        .expect("tool pattern should compile")
});

/// A tool call parsed out of model output
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    #[serde(rename = "parameters")]
    pub arguments: HashMap<String, String>,
}

/// Progress of one tool invocation. Zero or more `Running` events precede
/// exactly one terminal `Done` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCallOutcome {
    Running { message: String },
    Done { result: String },
    Error { message: String },
}

/// Extract the trailing tool call from a model reply. Best-effort: the
/// result is data either way, never a process-ending fault.
fn extract_tool_call(reply: &str) -> std::result::Result<ToolCallRequest, String> {
    let Some(captures) = TOOL_PATTERN.captures(reply) else {
        return Err(format!("not found in LLM response: {reply}"));
    };

    // models regularly emit single-quoted pseudo-JSON
    let raw = captures
        .get(1)
        .map(|m| m.as_str())
        .unwrap_or_default()
        .replace('\'', "\"");

    serde_json::from_str(raw.trim())
        .map_err(|err| format!("not found in LLM response: {reply}\nError: {err}"))
}

/// Human-readable progress line for a call, e.g.
/// `Running Search web nmap stealth scan`
fn running_description(request: &ToolCallRequest) -> String {
    let mut name = request.name.replace('_', " ");
    if let Some(first) = name.get_mut(0..1) {
        first.make_ascii_uppercase();
    }

    let mut keys: Vec<&String> = request.arguments.keys().collect();
    keys.sort();
    let argument = keys
        .first()
        .and_then(|key| request.arguments.get(*key))
        .map(String::as_str)
        .unwrap_or_default();

    format!("Running {name} {argument}").trim_end().to_string()
}

/// Generates, validates and executes a tool call for a user query
pub struct ToolCallPipeline {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ToolRegistry>,
    tool_prompt: String,
}

impl ToolCallPipeline {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        tool_prompt: impl Into<String>,
    ) -> Self {
        Self {
            provider,
            registry,
            tool_prompt: tool_prompt.into(),
        }
    }

    /// Run the pipeline for a query against the current history.
    ///
    /// The generation call sees a scratch copy of the history with the tool
    /// prompt in the system slot and the query as the final user message;
    /// the canonical conversation is never touched.
    pub fn invoke<'a>(
        &'a self,
        user_input: &'a str,
        history: &'a Conversation,
    ) -> impl Stream<Item = Result<ToolCallOutcome>> + 'a {
        async_stream::try_stream! {
            let mut scratch = history.clone();
            scratch.set_system_prompt(&self.tool_prompt);
            let last_is_user = scratch
                .last_message()
                .is_some_and(|m| m.role == Role::User);
            if last_is_user {
                if let Some(last) = scratch.messages.last_mut() {
                    last.content = user_input.to_string();
                }
            } else {
                scratch.add_message(Message::user(user_input));
            }

            let mut stream = self.provider.query(&scratch).await?;
            let mut reply = String::new();
            while let Some(chunk) = stream.recv().await {
                let chunk = chunk?;
                if chunk.usage.is_some() {
                    break;
                }
                reply.push_str(&chunk.content);
            }

            let request = match extract_tool_call(&reply) {
                Ok(request) => request,
                Err(message) => {
                    error!("Tool call failed: {message}");
                    yield ToolCallOutcome::Error { message };
                    return;
                }
            };

            if !self.registry.contains(&request.name) {
                let message = format!("{} is not a tool", request.name);
                error!("Tool call failed: {message}");
                yield ToolCallOutcome::Error { message };
                return;
            }

            let message = running_description(&request);
            info!("{message}");
            yield ToolCallOutcome::Running { message };

            self.provider.metrics().record_tool_call();
            match self.registry.invoke(&request.name, &request.arguments).await {
                Ok(result) => {
                    yield ToolCallOutcome::Done { result };
                }
                Err(err) => {
                    let message = format!("({}): tool execution failed, {err}", err.kind());
                    error!("{message}");
                    yield ToolCallOutcome::Error { message };
                }
            }
        }
    }
}
