//! Conversation history: messages, roles, and the on-disk store

mod conversation;
mod store;

pub use conversation::{Conversation, Message, Role};
pub use store::MemoryStore;
