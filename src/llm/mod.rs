// ABOUTME: LLM module - chat client abstraction for backend providers.
// ABOUTME: Defines types, the ChatClient trait, and provider implementations.

mod chat_completions;
mod client;
mod gemini;
mod types;

pub use chat_completions::*;
pub use client::*;
pub use gemini::*;
pub use types::*;
