// ABOUTME: Prelude module - convenient imports for common use cases.
// ABOUTME: Use `use caravan::prelude::*;` to get started quickly.

pub use crate::aggregate::ResponseAggregator;
pub use crate::config::{
    load_from_env, parse_agents, AgentDescriptor, Provider, Role, AGENTS_CONFIG_ENV,
};
pub use crate::conversation::{
    to_chat_messages, ConversationTurn, MemoryTurnStore, Sender, TurnStore,
};
pub use crate::dispatch::{
    AgentOutcome, AgentResult, DispatchEngine, DispatchRequest, DEFAULT_CALL_TIMEOUT, SYSTEM_ALIAS,
};
pub use crate::error::{CaravanError, LlmError};
pub use crate::limiter::RateLimiter;
pub use crate::llm::{
    ChatClient, ChatCompletionsClient, ChatConfig, ChatMessage, ChatReply, ChatRole, GeminiClient,
};
pub use crate::prompt::{compose_system_prompt, itinerary_prompt};
pub use crate::registry::{AgentRegistry, RegisteredAgent};
pub use crate::router::{route, RoutedMessage};
