//! Error types for morpheus-core

use miette::Diagnostic;
use thiserror::Error;

/// Result type alias using morpheus Error
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for morpheus
#[derive(Debug, Error, Diagnostic)]
pub enum Error {
    #[error("Configuration error: {0}")]
    #[diagnostic(code(morpheus::config))]
    Config(String),

    #[error("Validation error: {0}")]
    #[diagnostic(code(morpheus::validation))]
    Validation(String),

    #[error("Provider error: {0}")]
    #[diagnostic(code(morpheus::provider))]
    Provider(String),

    #[error("Unsupported: {0}")]
    #[diagnostic(code(morpheus::unsupported))]
    Unsupported(String),

    #[error("Tool error: {0}")]
    #[diagnostic(code(morpheus::tool))]
    Tool(String),

    #[error("IO error: {0}")]
    #[diagnostic(code(morpheus::io))]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    #[diagnostic(code(morpheus::serde))]
    Serde(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    #[diagnostic(code(morpheus::toml))]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Variant name, used when a tool failure is reported back into a turn
    /// as data rather than as a propagated error.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "Config",
            Error::Validation(_) => "Validation",
            Error::Provider(_) => "Provider",
            Error::Unsupported(_) => "Unsupported",
            Error::Tool(_) => "Tool",
            Error::Io(_) => "Io",
            Error::Serde(_) => "Serde",
            Error::Toml(_) => "Toml",
        }
    }
}
