//! Assistant tools: registry and built-in capabilities

mod web_search;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::providers::ToolDefinition;
use crate::{Error, Result};

pub use web_search::SearchTool;

/// A callable capability exposed to the model
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name as the model must emit it
    fn name(&self) -> &str;

    /// One-line description used for prompt construction
    fn description(&self) -> &str;

    /// JSON schema of the tool's parameters
    fn parameters(&self) -> serde_json::Value;

    /// Execute the tool with named string arguments
    async fn invoke(&self, arguments: &HashMap<String, String>) -> Result<String>;
}

/// Registry of available tools, loaded once at startup and injected into the
/// orchestrator.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the built-in tools
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(SearchTool::new()));
        registry
    }

    /// Register a tool
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        self.tools.push(tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools
            .iter()
            .find(|t| t.name() == name)
            .map(|t| t.as_ref())
    }

    /// Whether a tool with this name is registered
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Marshal every tool into the definition format used for prompt
    /// construction and native tool calling
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools
            .iter()
            .map(|t| ToolDefinition {
                name: t.name().to_string(),
                description: t.description().to_string(),
                parameters: t.parameters(),
            })
            .collect()
    }

    /// Execute a tool by name
    pub async fn invoke(&self, name: &str, arguments: &HashMap<String, String>) -> Result<String> {
        let tool = self
            .get(name)
            .ok_or_else(|| Error::Tool(format!("{name} is not a tool")))?;
        tool.invoke(arguments).await
    }
}
