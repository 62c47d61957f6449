// ABOUTME: Tag routing - scans user text for @alias directives, resolves
// ABOUTME: them against the registry, and strips recognized tags.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use crate::registry::AgentRegistry;

static TAG_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@[\w.-]+").expect("tag pattern is valid"));

/// Result of routing one user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutedMessage {
    /// The user text with recognized tags stripped, ready to forward.
    pub clean_text: String,

    /// Canonical aliases of the tagged agents, first-seen order.
    /// Empty means no recognized tag: broadcast to every agent.
    pub targets: Vec<String>,
}

/// Scan `text` for `@alias` directives against the registry.
///
/// A candidate tag is `@` followed by word, dot, or hyphen characters,
/// and it only counts when followed by whitespace or end-of-input;
/// that keeps e-mail addresses and handles embedded mid-word intact.
/// Recognized tags (case-insensitive alias match) are stripped from
/// the forwarded text; unrecognized candidates stay untouched.
pub fn route(text: &str, registry: &AgentRegistry) -> RoutedMessage {
    let mut targets: Vec<String> = Vec::new();
    let mut clean = String::with_capacity(text.len());
    let mut last = 0;

    for m in TAG_PATTERN.find_iter(text) {
        let followed_by_boundary = text[m.end()..]
            .chars()
            .next()
            .map_or(true, char::is_whitespace);
        if !followed_by_boundary {
            continue;
        }

        let name = &m.as_str()[1..];
        let Some(canonical) = registry.resolve_tag(name) else {
            debug!(tag = name, "tag does not match a registered agent, leaving in place");
            continue;
        };

        if !targets.iter().any(|t| t == canonical) {
            targets.push(canonical.to_string());
        }

        clean.push_str(&text[last..m.start()]);
        last = m.end();

        // Swallow one following space when the tag already had leading
        // whitespace, so stripping does not leave a double gap.
        let ends_open = clean.is_empty() || clean.ends_with(char::is_whitespace);
        if ends_open && text[last..].starts_with(' ') {
            last += 1;
        }
    }

    clean.push_str(&text[last..]);

    RoutedMessage {
        clean_text: clean.trim().to_string(),
        targets,
    }
}
