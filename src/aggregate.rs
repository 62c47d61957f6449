// ABOUTME: Response aggregation - formats settled agent results into
// ABOUTME: labeled conversation turns for storage and display.

use crate::conversation::ConversationTurn;
use crate::dispatch::{AgentOutcome, AgentResult};

/// Formats each agent's result into one labeled agent turn.
#[derive(Debug, Clone)]
pub struct ResponseAggregator {
    /// Whether to prefix the alias even when the dispatch had exactly
    /// one result. Defaults to true for consistent labeling.
    prefix_sole: bool,
}

impl Default for ResponseAggregator {
    fn default() -> Self {
        Self { prefix_sole: true }
    }
}

impl ResponseAggregator {
    /// Create an aggregator with the default labeling policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop the `@alias:` prefix when a dispatch produced exactly one
    /// result.
    pub fn bare_sole_replies(mut self) -> Self {
        self.prefix_sole = false;
        self
    }

    /// Format one result as display text.
    pub fn format(&self, result: &AgentResult, sole: bool) -> String {
        match &result.outcome {
            AgentOutcome::Failure { message } => {
                format!("Error from @{}: {}", result.alias, message)
            }
            AgentOutcome::Reply(reply) if sole && !self.prefix_sole => reply.content.clone(),
            AgentOutcome::Reply(reply) => format!("@{}: {}", result.alias, reply.content),
        }
    }

    /// Turn a settled result set into agent conversation turns, one per
    /// result, in result order.
    pub fn aggregate(&self, results: &[AgentResult]) -> Vec<ConversationTurn> {
        let sole = results.len() == 1;
        results
            .iter()
            .map(|result| ConversationTurn::agent(self.format(result, sole)))
            .collect()
    }
}
