// ABOUTME: Google Gemini API client implementation.
// ABOUTME: Implements ChatClient for Gemini models.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatConfig, ChatMessage, ChatReply, ChatRole};
use crate::error::LlmError;

const GEMINI_DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Gemini API request format.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiRequest {
    pub contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GeminiGenerationConfig>,
}

/// Gemini content (message).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub parts: Vec<GeminiPart>,
}

/// Gemini content part.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiPart {
    pub text: String,
}

/// Gemini generation config.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
}

/// Gemini API response format.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiResponse {
    #[serde(default)]
    pub candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    pub usage_metadata: Option<GeminiUsageMetadata>,
    #[serde(default)]
    pub model_version: Option<String>,
}

/// Gemini response candidate.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiCandidate {
    pub content: GeminiContent,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Gemini usage metadata.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeminiUsageMetadata {
    #[serde(default)]
    pub total_token_count: u32,
}

/// Gemini API error response.
#[derive(Debug, Deserialize)]
pub struct GeminiError {
    pub error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct GeminiErrorDetail {
    pub code: i32,
    pub message: String,
}

/// Client for the Google Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    api_key: String,
    base_url: String,
    default_model: String,
    http: reqwest::Client,
}

impl GeminiClient {
    /// Create a new Gemini client with the given API key and default model.
    pub fn new(api_key: impl Into<String>, default_model: impl Into<String>) -> Self {
        let default_model = {
            let m: String = default_model.into();
            if m.is_empty() {
                GEMINI_DEFAULT_MODEL.to_string()
            } else {
                m
            }
        };
        Self {
            api_key: api_key.into(),
            base_url: GEMINI_DEFAULT_BASE_URL.to_string(),
            default_model,
            http: reqwest::Client::new(),
        }
    }

    /// Override the base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

fn convert_messages(messages: &[ChatMessage]) -> (Option<GeminiContent>, Vec<GeminiContent>) {
    // Gemini carries the system prompt out-of-band; user/assistant turns
    // map to "user"/"model" contents.
    let mut system_parts = Vec::new();
    let mut contents = Vec::new();

    for msg in messages {
        match msg.role {
            ChatRole::System => system_parts.push(GeminiPart {
                text: msg.content.clone(),
            }),
            ChatRole::User | ChatRole::Assistant => {
                let role = if msg.role == ChatRole::User { "user" } else { "model" };
                contents.push(GeminiContent {
                    role: Some(role.to_string()),
                    parts: vec![GeminiPart {
                        text: msg.content.clone(),
                    }],
                });
            }
        }
    }

    let system_instruction = if system_parts.is_empty() {
        None
    } else {
        Some(GeminiContent {
            role: None,
            parts: system_parts,
        })
    };

    (system_instruction, contents)
}

fn build_request(messages: &[ChatMessage], config: &ChatConfig) -> GeminiRequest {
    let (system_instruction, contents) = convert_messages(messages);

    let generation_config = if config.max_tokens.is_some()
        || config.temperature.is_some()
        || config.top_p.is_some()
    {
        Some(GeminiGenerationConfig {
            max_output_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        })
    } else {
        None
    };

    GeminiRequest {
        contents,
        system_instruction,
        generation_config,
    }
}

fn convert_response(resp: GeminiResponse) -> ChatReply {
    let content = resp
        .candidates
        .into_iter()
        .next()
        .map(|c| {
            c.content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    ChatReply {
        content,
        tokens_used: resp.usage_metadata.map(|u| u.total_token_count),
        model: resp.model_version,
    }
}

#[async_trait]
impl super::client::ChatClient for GeminiClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> Result<ChatReply, LlmError> {
        let gemini_req = build_request(messages, config);
        let model = config.model.as_deref().unwrap_or(&self.default_model);
        let url = format!("{}?key={}", self.endpoint(model), self.api_key);

        let response = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&gemini_req)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = match serde_json::from_str::<GeminiError>(&body) {
                Ok(err) => err.error.message,
                Err(_) => body,
            };
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let gemini_resp: GeminiResponse = response.json().await?;
        Ok(convert_response(gemini_resp))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_messages_become_system_instruction() {
        let messages = vec![
            ChatMessage::system("You are a travel planner."),
            ChatMessage::user("Plan a trip to Kyoto"),
            ChatMessage::assistant("Sure!"),
        ];

        let (system, contents) = convert_messages(&messages);
        let system = system.unwrap();
        assert_eq!(system.parts[0].text, "You are a travel planner.");
        assert_eq!(contents.len(), 2);
        assert_eq!(contents[0].role.as_deref(), Some("user"));
        assert_eq!(contents[1].role.as_deref(), Some("model"));
    }

    #[test]
    fn test_generation_config_omitted_when_unset() {
        let req = build_request(&[ChatMessage::user("hi")], &ChatConfig::default());
        assert!(req.generation_config.is_none());

        let config = ChatConfig::default().temperature(0.7);
        let req = build_request(&[ChatMessage::user("hi")], &config);
        assert_eq!(req.generation_config.unwrap().temperature, Some(0.7));
    }

    #[test]
    fn test_convert_response_joins_parts() {
        let resp: GeminiResponse = serde_json::from_str(
            r#"{
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Day 1: "}, {"text": "Gion"}]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"totalTokenCount": 42}
            }"#,
        )
        .unwrap();

        let reply = convert_response(resp);
        assert_eq!(reply.content, "Day 1: Gion");
        assert_eq!(reply.tokens_used, Some(42));
    }

    #[test]
    fn test_convert_response_no_candidates() {
        let resp: GeminiResponse = serde_json::from_str("{}").unwrap();
        let reply = convert_response(resp);
        assert_eq!(reply.content, "");
        assert_eq!(reply.tokens_used, None);
    }

    #[test]
    fn test_empty_model_falls_back_to_default() {
        let client = GeminiClient::new("key", "");
        assert_eq!(client.default_model, GEMINI_DEFAULT_MODEL);
    }
}
