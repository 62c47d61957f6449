// ABOUTME: Defines the ChatClient trait - the abstraction layer that lets
// ABOUTME: the dispatch engine talk to any backend provider uniformly.

use async_trait::async_trait;

use super::{ChatConfig, ChatMessage, ChatReply};
use crate::error::LlmError;

/// Trait for backend chat client implementations.
///
/// The dispatch engine never assumes which network protocol backs this
/// capability: it hands over an ordered message list plus a sampling
/// config and receives either a completion or an error.
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Send the ordered message list and return the completion.
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> Result<ChatReply, LlmError>;
}
