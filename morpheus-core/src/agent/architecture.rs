//! The per-turn orchestration state machine
//!
//! One `query` call is one turn: route the latest user message, optionally
//! fold a tool result into the prompt, stream the response through the
//! thought filter, then commit the finalized turn to the conversation.

use std::sync::Arc;

use futures::{pin_mut, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::agent::prompts::Prompts;
use crate::agent::router::{QueryRouter, Route};
use crate::agent::stream::{StreamState, ThoughtFilter};
use crate::agent::tool_call::{ToolCallOutcome, ToolCallPipeline};
use crate::memory::{Conversation, Message, Role};
use crate::providers::{LlmProvider, TokenUsage};
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// The default conversational architecture: router, thought filter, and
/// prompt-extracted tool calls over a streaming provider.
///
/// Collaborators are injected; nothing here is global. A single architecture
/// serves any number of conversations, but callers must not run two turns
/// against the same conversation concurrently: a turn performs a multi-step
/// mutation of the history it finalizes only at the end.
pub struct DefaultArchitecture {
    provider: Arc<dyn LlmProvider>,
    prompts: Prompts,
    router: QueryRouter,
    pipeline: ToolCallPipeline,
}

impl DefaultArchitecture {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        registry: Arc<ToolRegistry>,
        prompts: Prompts,
    ) -> Self {
        let router = QueryRouter::new(Arc::clone(&provider), prompts.router());
        let tool_prompt = prompts.tool_prompt(&registry.definitions());
        let pipeline =
            ToolCallPipeline::new(Arc::clone(&provider), Arc::clone(&registry), tool_prompt);

        let tool_names = registry
            .definitions()
            .iter()
            .map(|t| t.name.clone())
            .collect::<Vec<_>>()
            .join(", ");
        info!(
            provider = provider.name(),
            tools = %tool_names,
            "initialized default architecture"
        );

        Self {
            provider,
            prompts,
            router,
            pipeline,
        }
    }

    /// Generate the response to the conversation's latest user message,
    /// yielding it in chunks.
    ///
    /// On success the conversation gains exactly one assistant message, the
    /// user message keeps its original wording, and both carry backend
    /// token counts. The prompt swap and any tool augmentation happen on a
    /// scratch copy sent to the provider, so an abandoned or failed stream
    /// leaves the conversation exactly as it was.
    pub fn query<'a>(
        &'a self,
        conversation: &'a mut Conversation,
    ) -> impl Stream<Item = Result<String>> + 'a {
        async_stream::try_stream! {
            let valid_last = conversation
                .last_message()
                .is_some_and(|m| m.role == Role::User && !m.content.is_empty());
            if !valid_last {
                Err(Error::Validation(
                    "last message in conversation is not a user message".to_string(),
                ))?;
            }
            let user_input = conversation
                .last_message()
                .map(|m| m.content.clone())
                .unwrap_or_default();

            // seed the system slot on a fresh conversation; routing and the
            // response phase both overwrite index 0
            if !conversation.has_system_prompt() {
                conversation.set_system_prompt(self.prompts.general());
            }

            let mut route = self.router.route(&user_input).await?;
            debug!(?route, conversation = conversation.id, "routed query");

            let mut augmented_input = user_input.clone();
            if route == Route::ToolUse {
                let mut description = None;
                let mut tool_result = None;
                {
                    let outcomes = self.pipeline.invoke(&user_input, conversation);
                    pin_mut!(outcomes);
                    while let Some(outcome) = outcomes.next().await {
                        match outcome? {
                            ToolCallOutcome::Running { message } => {
                                description = Some(message);
                            }
                            ToolCallOutcome::Done { result } => {
                                tool_result = Some(result);
                                break;
                            }
                            ToolCallOutcome::Error { message } => {
                                warn!(%message, "tool call failed, answering without tool results");
                                break;
                            }
                        }
                    }
                }

                if let (Some(description), Some(result)) = (description, tool_result) {
                    augmented_input = format!(
                        "{user_input}\n### TOOL {description} ###\n{result}\n### TOOL {description} END ###"
                    );
                }
                // with or without a result, the tool branch answers as general
                route = Route::General;
            }

            let prompt = match route {
                Route::Reasoning => self.prompts.reasoning(),
                _ => self.prompts.general(),
            };

            // the provider sees a scratch copy; the canonical history is only
            // committed in the finalize step below
            let mut outbound = conversation.clone();
            outbound.set_system_prompt(prompt);
            if let Some(last) = outbound.messages.last_mut() {
                last.content = augmented_input;
            }

            let mut stream = self.provider.query(&outbound).await?;
            let mut response = String::new();
            let mut usage = TokenUsage::default();
            let mut filter = ThoughtFilter::new();
            let reasoning = route == Route::Reasoning;

            while let Some(chunk) = stream.recv().await {
                let chunk = chunk?;
                if let Some(final_usage) = chunk.usage {
                    usage = final_usage;
                    break;
                }

                if !reasoning {
                    response.push_str(&chunk.content);
                    yield chunk.content;
                    continue;
                }

                let spoken: String = chunk
                    .content
                    .chars()
                    .filter(|&c| filter.feed(c) == StreamState::Speaking)
                    .collect();
                if !spoken.is_empty() {
                    response.push_str(&spoken);
                    yield spoken;
                }
            }

            // finalize: commit the turn
            conversation.set_system_prompt(prompt);
            if let Some(last) = conversation.messages.last_mut() {
                last.set_token_length(usage.user_tokens);
            }
            let mut reply = Message::assistant(response);
            reply.set_token_length(usage.assistant_tokens);
            conversation.add_message(reply);

            debug!(
                conversation = conversation.id,
                messages = conversation.messages.len(),
                tokens = conversation.token_total(),
                "turn complete"
            );
        }
    }
}
