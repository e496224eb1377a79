//! System prompts for the assistant's behavior branches

use serde::Deserialize;
use std::path::Path;

use crate::providers::ToolDefinition;
use crate::{Error, Result};

/// A single named prompt
#[derive(Debug, Clone, Deserialize)]
pub struct AgentPrompt {
    pub prompt: String,
}

/// The prompt set driving one architecture: routing, the two response
/// behaviors, and tool-call generation. A total struct, so a missing prompt
/// is a parse error rather than a runtime surprise.
#[derive(Debug, Clone, Deserialize)]
pub struct Prompts {
    pub router: AgentPrompt,
    pub general: AgentPrompt,
    pub reasoning: AgentPrompt,
    pub tool: AgentPrompt,
}

impl Prompts {
    /// Load prompts from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse prompts from TOML string
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse prompts: {e}")))
    }

    /// Load from the embedded default prompt set
    #[allow(clippy::expect_used)]
    pub fn default_prompts() -> Self {
        let content = include_str!("../../prompts.toml");
        Self::parse(content).expect("Embedded prompts.toml should be valid")
    }

    pub fn router(&self) -> &str {
        &self.router.prompt
    }

    pub fn general(&self) -> &str {
        &self.general.prompt
    }

    pub fn reasoning(&self) -> &str {
        &self.reasoning.prompt
    }

    /// The tool prompt with the `{tools}` placeholder replaced by the
    /// declared tool descriptions
    pub fn tool_prompt(&self, tools: &[ToolDefinition]) -> String {
        let listing = tools
            .iter()
            .map(|t| format!("- {}: {} Parameters: {}", t.name, t.description, t.parameters))
            .collect::<Vec<_>>()
            .join("\n");
        self.tool.prompt.replace("{tools}", &listing)
    }
}

impl Default for Prompts {
    fn default() -> Self {
        Self::default_prompts()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_embedded_prompts_parse() {
        let prompts = Prompts::default();
        assert!(prompts.router().contains('1'));
        assert!(!prompts.general().is_empty());
        assert!(prompts.reasoning().contains("@@@"));
        assert!(prompts.tool.prompt.contains("{tools}"));
    }

    #[test]
    fn test_missing_prompt_is_parse_error() {
        let incomplete = r#"
[router]
prompt = "route it"

[general]
prompt = "answer it"
"#;
        assert!(Prompts::parse(incomplete).is_err());
    }

    #[test]
    fn test_tool_prompt_substitution() {
        let prompts = Prompts::default();
        let tools = vec![ToolDefinition {
            name: "search_web".to_string(),
            description: "Make an online search using a query string.".to_string(),
            parameters: json!({"type": "object"}),
        }];

        let rendered = prompts.tool_prompt(&tools);
        assert!(rendered.contains("- search_web: Make an online search"));
        assert!(!rendered.contains("{tools}"));
    }
}
