//! AI assistant integration.
//!
//! All assistant calls share one circuit breaker (named `assistant` by the CLI).

pub mod client;
pub mod types;

pub use client::{ChatClient, Conversation};
pub use types::{ChatMessage, ChatReply, ChatRequest, Role};
