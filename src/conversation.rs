// ABOUTME: Conversation turns and the append-only turn store boundary.
// ABOUTME: MemoryTurnStore backs tests and short-lived sessions.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::llm::{ChatMessage, ChatRole};

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Agent,
}

/// One immutable message in a conversation, ordered by timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub id: Uuid,
    pub text: String,
    pub sender: Sender,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a user turn stamped now.
    pub fn user(text: impl Into<String>) -> Self {
        Self::new(text, Sender::User)
    }

    /// Create an agent turn stamped now.
    pub fn agent(text: impl Into<String>) -> Self {
        Self::new(text, Sender::Agent)
    }

    fn new(text: impl Into<String>, sender: Sender) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            sender,
            timestamp: Utc::now(),
        }
    }

    /// The chat role this turn takes when forwarded to a backend.
    pub fn chat_role(&self) -> ChatRole {
        match self.sender {
            Sender::User => ChatRole::User,
            Sender::Agent => ChatRole::Assistant,
        }
    }
}

/// Convert history turns into the ordered message list a backend sees.
pub fn to_chat_messages(turns: &[ConversationTurn]) -> Vec<ChatMessage> {
    turns
        .iter()
        .map(|turn| ChatMessage {
            role: turn.chat_role(),
            content: turn.text.clone(),
        })
        .collect()
}

/// Trait for persisting conversation turns.
///
/// The contract is append-only: implementations never mutate or delete
/// a previously stored turn, and `list` returns turns ordered by
/// timestamp ascending. Implement this to plug in a real database.
#[async_trait]
pub trait TurnStore: Send + Sync {
    /// Append one turn to a conversation.
    async fn append(&self, conversation_id: &str, turn: ConversationTurn)
        -> Result<(), anyhow::Error>;

    /// List a conversation's turns, oldest first.
    async fn list(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>, anyhow::Error>;
}

/// In-memory turn store for tests and short-lived sessions.
pub struct MemoryTurnStore {
    turns: RwLock<std::collections::HashMap<String, Vec<ConversationTurn>>>,
}

impl MemoryTurnStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self {
            turns: RwLock::new(std::collections::HashMap::new()),
        }
    }

    /// Create a store wrapped in Arc for sharing.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }
}

impl Default for MemoryTurnStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TurnStore for MemoryTurnStore {
    async fn append(
        &self,
        conversation_id: &str,
        turn: ConversationTurn,
    ) -> Result<(), anyhow::Error> {
        let mut turns = self.turns.write().await;
        let list = turns.entry(conversation_id.to_string()).or_default();
        list.push(turn);
        list.sort_by_key(|t| t.timestamp);
        Ok(())
    }

    async fn list(&self, conversation_id: &str) -> Result<Vec<ConversationTurn>, anyhow::Error> {
        Ok(self
            .turns
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }
}
