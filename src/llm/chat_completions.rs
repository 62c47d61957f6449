// ABOUTME: OpenAI-compatible chat/completions client implementation.
// ABOUTME: Serves OpenAI, DeepSeek, and local Llama servers via base URL.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{ChatConfig, ChatMessage, ChatReply, ChatRole};
use crate::error::LlmError;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com/v1";
pub const LLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// Wire request for the chat/completions endpoint.
#[derive(Debug, Serialize)]
pub struct ChatCompletionsRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f64>,
}

/// Wire message format.
#[derive(Debug, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl From<&ChatMessage> for WireMessage {
    fn from(msg: &ChatMessage) -> Self {
        let role = match msg.role {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        };
        WireMessage {
            role: role.to_string(),
            content: msg.content.clone(),
        }
    }
}

/// Wire response format.
#[derive(Debug, Deserialize)]
pub struct ChatCompletionsResponse {
    pub model: Option<String>,
    pub choices: Vec<WireChoice>,
    pub usage: Option<WireUsage>,
}

/// Wire response choice.
#[derive(Debug, Deserialize)]
pub struct WireChoice {
    pub message: WireResponseMessage,
    pub finish_reason: Option<String>,
}

/// Wire response message.
#[derive(Debug, Deserialize)]
pub struct WireResponseMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

/// Wire usage stats.
#[derive(Debug, Deserialize)]
pub struct WireUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Wire error response.
#[derive(Debug, Deserialize)]
pub struct WireError {
    pub error: WireErrorDetail,
}

#[derive(Debug, Deserialize)]
pub struct WireErrorDetail {
    pub message: String,
}

/// Client for any OpenAI-compatible chat/completions endpoint.
///
/// DeepSeek and local Llama servers speak the same wire format as
/// OpenAI, so one client covers all three; only the base URL, the
/// credential requirement, and the default model differ.
#[derive(Debug, Clone)]
pub struct ChatCompletionsClient {
    base_url: String,
    api_key: Option<String>,
    default_model: String,
    http: reqwest::Client,
}

impl ChatCompletionsClient {
    /// Create a client for the given endpoint.
    ///
    /// `api_key` is optional because local servers do not authenticate.
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key,
            default_model: default_model.into(),
            http: reqwest::Client::new(),
        }
    }

    /// The model used when a request config does not name one.
    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn build_request(&self, messages: &[ChatMessage], config: &ChatConfig) -> ChatCompletionsRequest {
        ChatCompletionsRequest {
            model: config
                .model
                .clone()
                .unwrap_or_else(|| self.default_model.clone()),
            messages: messages.iter().map(WireMessage::from).collect(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
            frequency_penalty: config.frequency_penalty,
            presence_penalty: config.presence_penalty,
        }
    }
}

#[async_trait]
impl super::client::ChatClient for ChatCompletionsClient {
    async fn chat(
        &self,
        messages: &[ChatMessage],
        config: &ChatConfig,
    ) -> Result<ChatReply, LlmError> {
        let wire_req = self.build_request(messages, config);
        let url = format!("{}/chat/completions", self.base_url);

        let mut request = self
            .http
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&wire_req);

        if let Some(ref key) = self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await?;
            let message = match serde_json::from_str::<WireError>(&body) {
                Ok(err) => err.error.message,
                Err(_) => body,
            };
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let wire_resp: ChatCompletionsResponse = response.json().await?;

        let choice = wire_resp.choices.into_iter().next().ok_or(LlmError::Api {
            status: status.as_u16(),
            message: "response contained no choices".to_string(),
        })?;

        Ok(ChatReply {
            content: choice.message.content.unwrap_or_default(),
            tokens_used: wire_resp.usage.map(|u| u.total_tokens),
            model: wire_resp.model,
        })
    }
}
