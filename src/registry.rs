// ABOUTME: AgentRegistry - alias-indexed backend chat handles built once
// ABOUTME: from descriptors and immutable for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{AgentDescriptor, Provider};
use crate::error::LlmError;
use crate::llm::{
    ChatClient, ChatCompletionsClient, GeminiClient, DEEPSEEK_BASE_URL, LLAMA_BASE_URL,
    OPENAI_BASE_URL,
};

/// One validated agent: its descriptor plus a live backend handle.
pub struct RegisteredAgent {
    pub descriptor: AgentDescriptor,
    pub client: Arc<dyn ChatClient>,
}

/// Immutable, alias-indexed set of backend agents.
///
/// Built once at startup and shared read-only; no request mutates it.
#[derive(Default)]
pub struct AgentRegistry {
    agents: Vec<RegisteredAgent>,
    by_alias: HashMap<String, usize>,
    by_tag: HashMap<String, usize>,
}

impl AgentRegistry {
    /// Build a registry from a descriptor sequence.
    ///
    /// Descriptors whose backend handle cannot be constructed (missing
    /// credential, for instance) are skipped with a warning. When two
    /// descriptors share an alias, the later one wins.
    pub fn build(descriptors: Vec<AgentDescriptor>) -> Self {
        let mut registry = Self::default();

        for descriptor in descriptors {
            let client = match build_client(&descriptor) {
                Ok(client) => client,
                Err(e) => {
                    warn!(
                        alias = %descriptor.alias,
                        provider = %descriptor.provider,
                        error = %e,
                        "skipping agent: backend construction failed"
                    );
                    continue;
                }
            };

            registry.insert(RegisteredAgent { descriptor, client });
        }

        info!(agents = registry.len(), "agent registry built");
        registry
    }

    /// Build a registry from pre-constructed handles. Used by tests and
    /// callers with custom `ChatClient` implementations.
    pub fn from_agents(agents: Vec<(AgentDescriptor, Arc<dyn ChatClient>)>) -> Self {
        let mut registry = Self::default();
        for (descriptor, client) in agents {
            registry.insert(RegisteredAgent { descriptor, client });
        }
        registry
    }

    fn insert(&mut self, agent: RegisteredAgent) {
        let alias = agent.descriptor.alias.clone();
        let tag = alias.to_lowercase();

        match self.by_alias.get(&alias) {
            Some(&index) => {
                warn!(alias = %alias, "duplicate alias in configuration: later entry wins");
                self.agents[index] = agent;
            }
            None => {
                let index = self.agents.len();
                self.agents.push(agent);
                self.by_alias.insert(alias.clone(), index);
                if let Some(shadowed) = self.by_tag.insert(tag, index) {
                    // Both agents stay addressable by exact alias, but
                    // only the later one answers to the shared tag.
                    warn!(
                        alias = %alias,
                        shadowed = %self.agents[shadowed].descriptor.alias,
                        "aliases differ only in case: later agent takes the @tag"
                    );
                }
            }
        }
    }

    /// Look up an agent by its exact alias.
    pub fn get(&self, alias: &str) -> Option<&RegisteredAgent> {
        self.by_alias.get(alias).map(|&i| &self.agents[i])
    }

    /// Resolve a tag name (already lower-cased or not) to the canonical
    /// alias it was registered under.
    pub fn resolve_tag(&self, name: &str) -> Option<&str> {
        self.by_tag
            .get(&name.to_lowercase())
            .map(|&i| self.agents[i].descriptor.alias.as_str())
    }

    /// All registered aliases, in insertion order.
    pub fn aliases(&self) -> Vec<String> {
        self.agents
            .iter()
            .map(|a| a.descriptor.alias.clone())
            .collect()
    }

    /// Number of registered agents.
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the registry holds no agents.
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Construct the backend chat handle for a descriptor.
fn build_client(descriptor: &AgentDescriptor) -> Result<Arc<dyn ChatClient>, LlmError> {
    let credential = descriptor.credential.clone().or_else(|| {
        descriptor
            .provider
            .credential_env()
            .and_then(|var| std::env::var(var).ok())
    });

    let require_credential = || {
        credential.clone().ok_or_else(|| {
            LlmError::Configuration(format!(
                "no credential for provider '{}' (set {} or configure one)",
                descriptor.provider,
                descriptor.provider.credential_env().unwrap_or("a key"),
            ))
        })
    };

    let client: Arc<dyn ChatClient> = match descriptor.provider {
        Provider::DeepSeek => Arc::new(ChatCompletionsClient::new(
            DEEPSEEK_BASE_URL,
            Some(require_credential()?),
            &descriptor.model,
        )),
        Provider::OpenAi => Arc::new(ChatCompletionsClient::new(
            OPENAI_BASE_URL,
            Some(require_credential()?),
            &descriptor.model,
        )),
        Provider::Llama => Arc::new(ChatCompletionsClient::new(
            LLAMA_BASE_URL,
            credential.clone(),
            &descriptor.model,
        )),
        Provider::Gemini => Arc::new(GeminiClient::new(require_credential()?, &descriptor.model)),
    };

    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ChatConfig, ChatMessage, ChatReply};
    use async_trait::async_trait;

    struct NullClient;

    #[async_trait]
    impl ChatClient for NullClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _config: &ChatConfig,
        ) -> Result<ChatReply, LlmError> {
            Ok(ChatReply {
                content: String::new(),
                tokens_used: None,
                model: None,
            })
        }
    }

    fn registry_of(aliases: &[&str]) -> AgentRegistry {
        AgentRegistry::from_agents(
            aliases
                .iter()
                .map(|a| {
                    (
                        AgentDescriptor::new(*a, Provider::Llama, "llama3.2"),
                        Arc::new(NullClient) as Arc<dyn ChatClient>,
                    )
                })
                .collect(),
        )
    }

    #[test]
    fn test_lookup_by_exact_alias() {
        let registry = registry_of(&["Paris-Bot"]);
        assert!(registry.get("Paris-Bot").is_some());
        assert!(registry.get("paris-bot").is_none());
    }

    #[test]
    fn test_tag_resolution_is_case_insensitive() {
        let registry = registry_of(&["Paris-Bot"]);
        assert_eq!(registry.resolve_tag("paris-bot"), Some("Paris-Bot"));
        assert_eq!(registry.resolve_tag("PARIS-BOT"), Some("Paris-Bot"));
        assert_eq!(registry.resolve_tag("tokyo"), None);
    }

    #[test]
    fn test_aliases_preserve_insertion_order() {
        let registry = registry_of(&["c", "a", "b"]);
        assert_eq!(registry.aliases(), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_alias_last_wins() {
        let first = AgentDescriptor::new("twin", Provider::Llama, "llama3.2");
        let second = AgentDescriptor::new("twin", Provider::Llama, "mistral");

        let registry = AgentRegistry::from_agents(vec![
            (first, Arc::new(NullClient) as Arc<dyn ChatClient>),
            (second, Arc::new(NullClient) as Arc<dyn ChatClient>),
        ]);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("twin").unwrap().descriptor.model, "mistral");
    }

    #[test]
    fn test_case_colliding_aliases_share_the_tag() {
        // "Twin" and "twin" are distinct identities but one @tag; the
        // later registration answers to it, the earlier keeps its
        // exact-alias lookup and still receives broadcasts.
        let registry = registry_of(&["Twin", "twin"]);

        assert_eq!(registry.len(), 2);
        assert!(registry.get("Twin").is_some());
        assert!(registry.get("twin").is_some());
        assert_eq!(registry.resolve_tag("TWIN"), Some("twin"));
        assert_eq!(registry.aliases(), vec!["Twin", "twin"]);
    }

    #[test]
    fn test_build_skips_agents_without_credentials() {
        // Llama needs no credential; Gemini without a key (and with the
        // env unset) is skipped rather than failing the build.
        let descriptors = vec![
            AgentDescriptor::new("local", Provider::Llama, "llama3.2"),
            AgentDescriptor::new("cloud", Provider::Gemini, "gemini-2.0-flash"),
        ];

        // Only deterministic when the ambient env lacks the key.
        if std::env::var("GEMINI_API_KEY").is_err() {
            let registry = AgentRegistry::build(descriptors);
            assert_eq!(registry.aliases(), vec!["local"]);
        }
    }

    #[test]
    fn test_build_with_explicit_credential() {
        let descriptors = vec![
            AgentDescriptor::new("cloud", Provider::Gemini, "gemini-2.0-flash")
                .credential("test-key"),
        ];
        let registry = AgentRegistry::build(descriptors);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_empty_registry() {
        let registry = AgentRegistry::build(Vec::new());
        assert!(registry.is_empty());
        assert!(registry.aliases().is_empty());
    }
}
