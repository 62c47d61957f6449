// ABOUTME: Defines all error types for the caravan library using thiserror.
// ABOUTME: Backend failures stay per-concern and unify under CaravanError.

/// Top-level error type for the caravan library.
#[derive(Debug, thiserror::Error)]
pub enum CaravanError {
    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Store error: {0}")]
    Store(#[source] anyhow::Error),
}

/// Errors from backend chat client operations.
///
/// Inside a dispatch these are never propagated past the owning agent's
/// task: the engine converts them into that agent's failure outcome.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Deserialization error: {0}")]
    Deserialize(#[from] serde_json::Error),

    #[error("no response within {0:?}")]
    Timeout(std::time::Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),
}
