// ABOUTME: DispatchEngine - fans one user turn out to the resolved target
// ABOUTME: agents concurrently, with per-agent failure isolation.

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, warn};

use crate::config::AgentDescriptor;
use crate::conversation::{to_chat_messages, ConversationTurn};
use crate::error::LlmError;
use crate::limiter::RateLimiter;
use crate::llm::{ChatClient, ChatConfig, ChatMessage, ChatReply};
use crate::prompt::compose_system_prompt;
use crate::registry::AgentRegistry;
use crate::router::RoutedMessage;

/// Reserved alias under which synthetic engine-level errors are reported.
pub const SYSTEM_ALIAS: &str = "system";

/// Default per-call deadline. A backend that has not answered by then
/// gets a timeout failure instead of stalling the whole aggregate.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(60);

const DEFAULT_TEMPERATURE: f64 = 0.7;
const DEFAULT_MAX_TOKENS: u32 = 1500;

/// One user turn ready for fan-out.
#[derive(Debug, Clone)]
pub struct DispatchRequest {
    /// Clean user text (tags already stripped).
    pub text: String,

    /// Requested target aliases. Empty means every registered agent.
    pub targets: Vec<String>,

    /// Whether the caller explicitly named targets. Distinguishes
    /// "broadcast" from "asked for agents that turned out unknown".
    pub explicit: bool,

    /// Caller-supplied sampling overrides, layered over engine defaults.
    pub overrides: ChatConfig,
}

impl DispatchRequest {
    /// A request addressed to every registered agent.
    pub fn broadcast(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            targets: Vec::new(),
            explicit: false,
            overrides: ChatConfig::default(),
        }
    }

    /// A request addressed to the named aliases.
    pub fn to(text: impl Into<String>, targets: Vec<String>) -> Self {
        Self {
            text: text.into(),
            targets,
            explicit: true,
            overrides: ChatConfig::default(),
        }
    }

    /// Set sampling overrides.
    pub fn overrides(mut self, overrides: ChatConfig) -> Self {
        self.overrides = overrides;
        self
    }
}

impl From<RoutedMessage> for DispatchRequest {
    fn from(routed: RoutedMessage) -> Self {
        let explicit = !routed.targets.is_empty();
        Self {
            text: routed.clean_text,
            targets: routed.targets,
            explicit,
            overrides: ChatConfig::default(),
        }
    }
}

/// The outcome of one agent's backend call. Exactly one variant per
/// dispatched agent per request; never both content and error.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutcome {
    Reply(ChatReply),
    Failure { message: String },
}

impl AgentOutcome {
    /// The reply content, if this outcome is a reply.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::Reply(reply) => Some(&reply.content),
            Self::Failure { .. } => None,
        }
    }

    /// Whether this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }
}

/// One agent's settled result, keyed by alias.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentResult {
    pub alias: String,
    pub outcome: AgentOutcome,
}

/// Fans a single user turn out to N backends concurrently.
///
/// The engine holds a read-only registry reference; per-request state
/// lives entirely inside `dispatch` and is discarded afterwards, so
/// concurrent dispatches never share mutable state.
pub struct DispatchEngine {
    registry: Arc<AgentRegistry>,
    call_timeout: Duration,
    defaults: ChatConfig,
    limiter: Option<Arc<RateLimiter>>,
}

impl DispatchEngine {
    /// Create an engine over a registry with default sampling and timeout.
    pub fn new(registry: Arc<AgentRegistry>) -> Self {
        Self {
            registry,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            defaults: ChatConfig::default()
                .temperature(DEFAULT_TEMPERATURE)
                .max_tokens(DEFAULT_MAX_TOKENS),
            limiter: None,
        }
    }

    /// Set the per-call timeout.
    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    /// Replace the default sampling config.
    pub fn defaults(mut self, defaults: ChatConfig) -> Self {
        self.defaults = defaults;
        self
    }

    /// Throttle backend calls through a shared rate limiter.
    pub fn limiter(mut self, limiter: Arc<RateLimiter>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Dispatch one user turn and collect every agent's settled result.
    ///
    /// Returns only after all backend calls have completed or failed;
    /// callers never observe partial results. One agent's failure never
    /// contaminates its siblings. The result order follows the resolved
    /// target order.
    pub async fn dispatch(
        &self,
        request: &DispatchRequest,
        history: &[ConversationTurn],
    ) -> Vec<AgentResult> {
        if self.registry.is_empty() {
            return synthetic_failure("no agents are configured");
        }

        let targets = self.resolve_targets(request);
        if targets.is_empty() {
            // Only reachable when the caller explicitly named targets
            // and none of them are registered.
            return synthetic_failure("none of the requested agents are registered");
        }

        let sole_target = targets.len() == 1;
        let config = request.overrides.merged_over(&self.defaults);
        let history_messages = to_chat_messages(history);

        debug!(targets = ?targets, sole_target, "dispatching user turn");

        let mut handles = Vec::with_capacity(targets.len());
        for alias in &targets {
            let agent = self
                .registry
                .get(alias)
                .expect("resolved targets are registered");

            let call = AgentCall {
                alias: alias.clone(),
                client: Arc::clone(&agent.client),
                messages: build_messages(&agent.descriptor, sole_target, &history_messages, &request.text),
                config: config.clone(),
                timeout: self.call_timeout,
                limiter: self.limiter.clone(),
            };

            handles.push(tokio::spawn(call.run()));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (alias, handle) in targets.into_iter().zip(join_all(handles).await) {
            let result = match handle {
                Ok(result) => result,
                Err(e) => AgentResult {
                    alias,
                    outcome: AgentOutcome::Failure {
                        message: format!("agent task failed: {}", e),
                    },
                },
            };
            results.push(result);
        }

        results
    }

    /// Filter the requested aliases against the registry. Unknown
    /// aliases are dropped with a diagnostic, never a hard failure;
    /// repeated aliases collapse to one so each agent is dispatched
    /// exactly once per request.
    fn resolve_targets(&self, request: &DispatchRequest) -> Vec<String> {
        if !request.explicit {
            return self.registry.aliases();
        }

        let mut resolved: Vec<String> = Vec::with_capacity(request.targets.len());
        for alias in &request.targets {
            if self.registry.get(alias).is_none() {
                warn!(alias = %alias, "dropping unknown agent from target set");
                continue;
            }
            if !resolved.contains(alias) {
                resolved.push(alias.clone());
            }
        }
        resolved
    }
}

/// Everything one agent's task needs, owned, so sibling calls share
/// nothing mutable.
struct AgentCall {
    alias: String,
    client: Arc<dyn ChatClient>,
    messages: Vec<ChatMessage>,
    config: ChatConfig,
    timeout: Duration,
    limiter: Option<Arc<RateLimiter>>,
}

impl AgentCall {
    async fn run(self) -> AgentResult {
        if let Some(limiter) = &self.limiter {
            limiter.acquire().await;
        }

        let outcome = match tokio::time::timeout(
            self.timeout,
            self.client.chat(&self.messages, &self.config),
        )
        .await
        {
            Ok(Ok(reply)) => AgentOutcome::Reply(reply),
            Ok(Err(e)) => {
                warn!(alias = %self.alias, error = %e, "agent call failed");
                AgentOutcome::Failure {
                    message: e.to_string(),
                }
            }
            Err(_) => {
                let e = LlmError::Timeout(self.timeout);
                warn!(alias = %self.alias, error = %e, "agent call timed out");
                AgentOutcome::Failure {
                    message: e.to_string(),
                }
            }
        };

        AgentResult {
            alias: self.alias,
            outcome,
        }
    }
}

fn build_messages(
    descriptor: &AgentDescriptor,
    sole_target: bool,
    history: &[ChatMessage],
    text: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(compose_system_prompt(
        Some(descriptor),
        sole_target,
    )));
    messages.extend_from_slice(history);
    messages.push(ChatMessage::user(text));
    messages
}

fn synthetic_failure(message: &str) -> Vec<AgentResult> {
    vec![AgentResult {
        alias: SYSTEM_ALIAS.to_string(),
        outcome: AgentOutcome::Failure {
            message: message.to_string(),
        },
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Provider;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted client: answers with a fixed reply, error, or delay.
    struct ScriptedClient {
        reply: Result<String, String>,
        delay: Option<Duration>,
        calls: Arc<AtomicUsize>,
    }

    impl ScriptedClient {
        fn ok(content: &str) -> Self {
            Self {
                reply: Ok(content.to_string()),
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn err(message: &str) -> Self {
            Self {
                reply: Err(message.to_string()),
                delay: None,
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn slow(content: &str, delay: Duration) -> Self {
            Self {
                reply: Ok(content.to_string()),
                delay: Some(delay),
                calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl ChatClient for ScriptedClient {
        async fn chat(
            &self,
            _messages: &[ChatMessage],
            _config: &ChatConfig,
        ) -> Result<ChatReply, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            match &self.reply {
                Ok(content) => Ok(ChatReply {
                    content: content.clone(),
                    tokens_used: Some(10),
                    model: None,
                }),
                Err(message) => Err(LlmError::Api {
                    status: 500,
                    message: message.clone(),
                }),
            }
        }
    }

    fn registry_with(agents: Vec<(&str, ScriptedClient)>) -> Arc<AgentRegistry> {
        Arc::new(AgentRegistry::from_agents(
            agents
                .into_iter()
                .map(|(alias, client)| {
                    (
                        AgentDescriptor::new(alias, Provider::Llama, "llama3.2"),
                        Arc::new(client) as Arc<dyn ChatClient>,
                    )
                })
                .collect(),
        ))
    }

    #[tokio::test]
    async fn test_empty_registry_yields_synthetic_error_and_no_calls() {
        let engine = DispatchEngine::new(Arc::new(AgentRegistry::default()));
        let results = engine
            .dispatch(&DispatchRequest::broadcast("hi"), &[])
            .await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].alias, SYSTEM_ALIAS);
        assert!(results[0].outcome.is_failure());
    }

    #[tokio::test]
    async fn test_explicit_unknown_targets_yield_synthetic_error() {
        let registry = registry_with(vec![("a", ScriptedClient::ok("hi"))]);
        let engine = DispatchEngine::new(registry);

        let request = DispatchRequest::to("hello", vec!["ghost".to_string()]);
        let results = engine.dispatch(&request, &[]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].alias, SYSTEM_ALIAS);
        assert!(results[0].outcome.is_failure());
    }

    #[tokio::test]
    async fn test_unknown_targets_dropped_known_kept() {
        let registry = registry_with(vec![("paris-bot", ScriptedClient::ok("bonjour"))]);
        let engine = DispatchEngine::new(registry);

        let request = DispatchRequest::to(
            "plan a trip",
            vec!["paris-bot".to_string(), "nonexistent".to_string()],
        );
        let results = engine.dispatch(&request, &[]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].alias, "paris-bot");
        assert_eq!(results[0].outcome.content(), Some("bonjour"));
    }

    #[tokio::test]
    async fn test_repeated_explicit_target_dispatches_once() {
        let client = ScriptedClient::ok("once");
        let calls = Arc::clone(&client.calls);
        let registry = registry_with(vec![("solo", client)]);
        let engine = DispatchEngine::new(registry);

        let request =
            DispatchRequest::to("hi", vec!["solo".to_string(), "solo".to_string()]);
        let results = engine.dispatch(&request, &[]).await;

        assert_eq!(results.len(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repeated_target_still_counts_as_sole() {
        // One agent asked for twice is still a sole-target dispatch and
        // must get the generalist prompt.
        struct EchoPrompt;

        #[async_trait]
        impl ChatClient for EchoPrompt {
            async fn chat(
                &self,
                messages: &[ChatMessage],
                _config: &ChatConfig,
            ) -> Result<ChatReply, LlmError> {
                Ok(ChatReply {
                    content: messages[0].content.clone(),
                    tokens_used: None,
                    model: None,
                })
            }
        }

        let descriptor = AgentDescriptor::new("budget", Provider::Llama, "llama3.2")
            .roles(vec![crate::config::Role::BudgetAdvisor]);
        let registry = Arc::new(AgentRegistry::from_agents(vec![(
            descriptor,
            Arc::new(EchoPrompt) as Arc<dyn ChatClient>,
        )]));
        let engine = DispatchEngine::new(registry);

        let request =
            DispatchRequest::to("hi", vec!["budget".to_string(), "budget".to_string()]);
        let results = engine.dispatch(&request, &[]).await;

        assert_eq!(results.len(), 1);
        let prompt = results[0].outcome.content().unwrap();
        assert!(prompt.contains("Packing suggestions"));
        assert!(!prompt.contains("one of several specialist assistants"));
    }

    #[tokio::test]
    async fn test_broadcast_reaches_every_agent() {
        let registry = registry_with(vec![
            ("a", ScriptedClient::ok("ra")),
            ("b", ScriptedClient::ok("rb")),
            ("c", ScriptedClient::ok("rc")),
        ]);
        let engine = DispatchEngine::new(registry);

        let results = engine
            .dispatch(&DispatchRequest::broadcast("suggest beaches"), &[])
            .await;

        assert_eq!(results.len(), 3);
        let aliases: Vec<&str> = results.iter().map(|r| r.alias.as_str()).collect();
        assert_eq!(aliases, vec!["a", "b", "c"]);
        assert!(results.iter().all(|r| !r.outcome.is_failure()));
    }

    #[tokio::test]
    async fn test_failure_is_isolated_to_one_agent() {
        let registry = registry_with(vec![
            ("flaky", ScriptedClient::err("connection reset")),
            ("steady", ScriptedClient::ok("all good")),
        ]);
        let engine = DispatchEngine::new(registry);

        let results = engine
            .dispatch(&DispatchRequest::broadcast("hello"), &[])
            .await;

        assert_eq!(results.len(), 2);
        assert!(results[0].outcome.is_failure());
        assert_eq!(results[1].outcome.content(), Some("all good"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_backend_maps_to_timeout_failure() {
        let registry = registry_with(vec![
            ("snail", ScriptedClient::slow("eventually", Duration::from_secs(600))),
            ("quick", ScriptedClient::ok("now")),
        ]);
        let engine = DispatchEngine::new(registry).call_timeout(Duration::from_secs(1));

        let results = engine
            .dispatch(&DispatchRequest::broadcast("hello"), &[])
            .await;

        assert!(results[0].outcome.is_failure());
        match &results[0].outcome {
            AgentOutcome::Failure { message } => assert!(message.contains("no response within")),
            AgentOutcome::Reply(_) => unreachable!(),
        }
        assert_eq!(results[1].outcome.content(), Some("now"));
    }

    #[tokio::test]
    async fn test_routed_message_conversion() {
        let routed = RoutedMessage {
            clean_text: "hi".to_string(),
            targets: vec!["a".to_string()],
        };
        let request = DispatchRequest::from(routed);
        assert!(request.explicit);

        let broadcast = DispatchRequest::from(RoutedMessage {
            clean_text: "hi".to_string(),
            targets: Vec::new(),
        });
        assert!(!broadcast.explicit);
    }

    #[test]
    fn test_sole_target_messages_are_generalist() {
        let descriptor = AgentDescriptor::new("solo", Provider::Llama, "llama3.2")
            .roles(vec![crate::config::Role::BudgetAdvisor]);

        let sole = build_messages(&descriptor, true, &[], "plan a trip");
        assert!(sole[0].content.contains("Packing suggestions"));

        let narrowed = build_messages(&descriptor, false, &[], "plan a trip");
        assert!(narrowed[0].content.contains("BudgetAdvisor"));
        assert!(!narrowed[0].content.contains("Packing suggestions"));
    }

    #[test]
    fn test_build_messages_order() {
        let descriptor = AgentDescriptor::new("a", Provider::Llama, "llama3.2");
        let history = vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ];

        let messages = build_messages(&descriptor, true, &history, "new question");
        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].role, crate::llm::ChatRole::System);
        assert_eq!(messages[1].content, "earlier question");
        assert_eq!(messages[3].content, "new question");
    }
}
