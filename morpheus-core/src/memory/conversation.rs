//! Message and conversation types

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        };
        f.write_str(s)
    }
}

/// A message in a conversation.
///
/// `token_length` is set after the fact, once the generation backend has
/// reported usage for the turn that produced (or consumed) this message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub token_length: u64,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            token_length: 0,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            token_length: 0,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            token_length: 0,
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            token_length: 0,
        }
    }

    /// Record backend-reported token usage for this message
    pub fn set_token_length(&mut self, tokens: u64) {
        self.token_length = tokens;
    }
}

/// An ordered, mutable message history rooted at a system-role message.
///
/// Index 0, when present, holds the active system prompt and is the only
/// message ever replaced in place. After the system slot, messages alternate
/// user/assistant in steady state; a turn in progress may deviate but must
/// restore the alternation before yielding control back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    /// Create an empty conversation
    pub fn new(id: i64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            messages: Vec::new(),
        }
    }

    /// Append a message
    pub fn add_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// The most recent message, if any
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the system slot (index 0) is populated
    pub fn has_system_prompt(&self) -> bool {
        self.messages
            .first()
            .is_some_and(|m| m.role == Role::System)
    }

    /// Replace the active system prompt in place, inserting the slot when
    /// the conversation has none yet.
    pub fn set_system_prompt(&mut self, content: impl Into<String>) {
        let message = Message::system(content);
        if self.has_system_prompt() {
            self.messages[0] = message;
        } else {
            self.messages.insert(0, message);
        }
    }

    /// Sum of recorded token lengths across all messages
    pub fn token_total(&self) -> u64 {
        self.messages.iter().map(|m| m.token_length).sum()
    }
}
