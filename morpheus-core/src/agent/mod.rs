//! The conversational architecture: routing, thought filtering, tool calls,
//! and the per-turn orchestrator

mod architecture;
mod prompts;
mod router;
mod stream;
mod tool_call;

use std::sync::Arc;

use crate::config::AgentConfig;
use crate::metrics::MetricsTracker;
use crate::providers::create_provider;
use crate::tools::ToolRegistry;
use crate::Result;

pub use architecture::DefaultArchitecture;
pub use prompts::{AgentPrompt, Prompts};
pub use router::{QueryRouter, Route};
pub use stream::{StreamState, ThoughtFilter, THOUGHT_DELIMITER};
pub use tool_call::{ToolCallOutcome, ToolCallPipeline, ToolCallRequest};

/// Wire a default architecture from configuration: provider, registry and
/// the embedded prompt set.
pub fn build_architecture(
    config: &AgentConfig,
    registry: Arc<ToolRegistry>,
) -> Result<DefaultArchitecture> {
    let provider = create_provider(&config.provider, MetricsTracker::new())?;
    Ok(DefaultArchitecture::new(
        provider,
        registry,
        Prompts::default(),
    ))
}
