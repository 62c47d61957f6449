// ABOUTME: Agent configuration parsing - descriptors, providers, and roles.
// ABOUTME: Parses the flat `alias:provider:model[:roles]|...` config string.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable holding the agent configuration string.
pub const AGENTS_CONFIG_ENV: &str = "CARAVAN_AGENTS";

/// Enumerated backend provider kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    DeepSeek,
    Gemini,
    OpenAi,
    Llama,
}

impl Provider {
    /// Parse a provider token, case-insensitively.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_lowercase().as_str() {
            "deepseek" => Some(Self::DeepSeek),
            "gemini" => Some(Self::Gemini),
            "openai" => Some(Self::OpenAi),
            "llama" => Some(Self::Llama),
            _ => None,
        }
    }

    /// Environment variable consulted for a credential when the
    /// descriptor carries none. Llama targets a local server and
    /// does not authenticate.
    pub fn credential_env(&self) -> Option<&'static str> {
        match self {
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Gemini => Some("GEMINI_API_KEY"),
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Llama => None,
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::DeepSeek => "deepseek",
            Self::Gemini => "gemini",
            Self::OpenAi => "openai",
            Self::Llama => "llama",
        };
        write!(f, "{}", name)
    }
}

/// A named responsibility scope assigned to an agent.
///
/// Known roles narrow the agent's system prompt during multi-agent
/// dispatch; unknown names are preserved in `Other` and still
/// contribute a generic instruction line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    ItineraryPlanner,
    BudgetAdvisor,
    LocalCultureExpert,
    RecommendationEngine,
    Other(String),
}

impl Role {
    /// Parse a role name, case-insensitively. Never fails: unmatched
    /// names become `Other` carrying the raw (trimmed) name.
    pub fn from_name(name: &str) -> Self {
        let trimmed = name.trim();
        match trimmed.to_lowercase().as_str() {
            "itineraryplanner" => Self::ItineraryPlanner,
            "budgetadvisor" => Self::BudgetAdvisor,
            "localcultureexpert" => Self::LocalCultureExpert,
            "recommendationengine" => Self::RecommendationEngine,
            _ => Self::Other(trimmed.to_string()),
        }
    }

    /// Human-readable role name, as used in the role-scope preamble.
    pub fn display_name(&self) -> &str {
        match self {
            Self::ItineraryPlanner => "ItineraryPlanner",
            Self::BudgetAdvisor => "BudgetAdvisor",
            Self::LocalCultureExpert => "LocalCultureExpert",
            Self::RecommendationEngine => "RecommendationEngine",
            Self::Other(name) => name,
        }
    }
}

/// Immutable configuration for one backend agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Unique identity key, used verbatim in config and matched
    /// case-insensitively in `@alias` tags.
    pub alias: String,

    /// Which backend serves this agent.
    pub provider: Provider,

    /// Backend-specific model identifier.
    pub model: String,

    /// Optional API credential; falls back to the provider's
    /// environment variable at registry construction.
    pub credential: Option<String>,

    /// Ordered role assignments. Empty means general-purpose.
    pub roles: Vec<Role>,
}

impl AgentDescriptor {
    /// Create a descriptor with no credential and no roles.
    pub fn new(alias: impl Into<String>, provider: Provider, model: impl Into<String>) -> Self {
        Self {
            alias: alias.into(),
            provider,
            model: model.into(),
            credential: None,
            roles: Vec::new(),
        }
    }

    /// Set the credential.
    pub fn credential(mut self, credential: impl Into<String>) -> Self {
        self.credential = Some(credential.into());
        self
    }

    /// Set the role assignments.
    pub fn roles(mut self, roles: Vec<Role>) -> Self {
        self.roles = roles;
        self
    }
}

/// Parse the flat agent configuration string.
///
/// Entries are separated by `|`, fields by `:`:
/// `alias:provider:model` or `alias:provider:model:role1,role2`.
///
/// Malformed entries (wrong field count, unknown provider) are dropped
/// with a warning; the parse itself never fails. An empty input yields
/// an empty descriptor list, which is a valid zero-agent state.
pub fn parse_agents(config: &str) -> Vec<AgentDescriptor> {
    let mut descriptors = Vec::new();

    for entry in config.split('|') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }

        let fields: Vec<&str> = entry.split(':').collect();
        if fields.len() < 3 || fields.len() > 4 {
            warn!(entry, "skipping malformed agent config entry: expected 3 or 4 fields");
            continue;
        }

        let alias = fields[0].trim();
        if alias.is_empty() {
            warn!(entry, "skipping agent config entry with empty alias");
            continue;
        }

        let Some(provider) = Provider::from_token(fields[1]) else {
            warn!(
                entry,
                provider = fields[1],
                "skipping agent config entry with unknown provider"
            );
            continue;
        };

        let roles = fields
            .get(3)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(Role::from_name)
                    .collect()
            })
            .unwrap_or_default();

        descriptors.push(AgentDescriptor {
            alias: alias.to_string(),
            provider,
            model: fields[2].trim().to_string(),
            credential: None,
            roles,
        });
    }

    descriptors
}

/// Load agent descriptors from the `CARAVAN_AGENTS` environment
/// variable. An unset variable is the zero-agent state.
pub fn load_from_env() -> Vec<AgentDescriptor> {
    match std::env::var(AGENTS_CONFIG_ENV) {
        Ok(config) => parse_agents(&config),
        Err(_) => Vec::new(),
    }
}
