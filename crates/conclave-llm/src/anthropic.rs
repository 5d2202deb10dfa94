//! Anthropic - Claude Messages API provider
//!
//! Claude takes the system prompt as a top-level field rather than as a message,
//! so system messages are folded out of the conversation before sending.

use crate::error::{Error, Result};
use crate::http::{build_client, ensure_success, map_send_error, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT};
use crate::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, ProviderKind,
    TokenUsage,
};
use crate::util::{mask_api_key, sanitize_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// Anthropic API version
const API_VERSION: &str = "2023-06-01";

/// Default model
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Default API base URL
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<AnthropicMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    #[serde(default)]
    model: String,
    content: Vec<ResponseContentBlock>,
    stop_reason: Option<String>,
    usage: Option<AnthropicUsage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ResponseContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct AnthropicUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// ============================================================================
// Provider Implementation
// ============================================================================

/// Anthropic provider configuration
#[derive(Clone)]
pub struct AnthropicConfig {
    /// API key
    pub api_key: String,
    /// Base URL
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Default max tokens
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
    /// Create a new configuration with an API key
    #[must_use]
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: sanitize_api_key(&api_key.into()),
            base_url: DEFAULT_BASE_URL.to_string(),
            default_model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the base URL
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Set the default model
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Set the timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Anthropic Claude provider
pub struct AnthropicProvider {
    client: Client,
    config: AnthropicConfig,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    /// Convert our messages to Anthropic format, returning the system prompt separately
    fn convert_messages(messages: &[Message]) -> (Option<String>, Vec<AnthropicMessage<'_>>) {
        let mut system_parts = Vec::new();
        let mut anthropic_messages = Vec::new();

        for msg in messages {
            match msg.role {
                MessageRole::System => {
                    if !msg.content.is_empty() {
                        system_parts.push(msg.content.as_str());
                    }
                }
                MessageRole::User | MessageRole::Assistant => {
                    anthropic_messages.push(AnthropicMessage {
                        role: msg.role.as_str(),
                        content: &msg.content,
                    });
                }
            }
        }

        let system = if system_parts.is_empty() {
            None
        } else {
            Some(system_parts.join("\n\n"))
        };

        (system, anthropic_messages)
    }
}

#[async_trait::async_trait]
impl LlmProvider for AnthropicProvider {
    fn name(&self) -> &str {
        ProviderKind::Anthropic.as_str()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = "anthropic", model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let (system, messages) = Self::convert_messages(&request.messages);
        let anthropic_request = AnthropicRequest {
            model,
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            system,
            messages,
            temperature: request.temperature,
        };

        debug!("Sending request to Anthropic");

        let response = self
            .client
            .post(format!("{}/v1/messages", self.config.base_url))
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .header("Content-Type", "application/json")
            .json(&anthropic_request)
            .send()
            .await
            .map_err(|e| map_send_error(e, ProviderKind::Anthropic, self.config.timeout))?;

        let response = ensure_success(response, ProviderKind::Anthropic).await?;

        let body: AnthropicResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let content = body
            .content
            .into_iter()
            .filter_map(|block| match block {
                ResponseContentBlock::Text { text } => Some(text),
                ResponseContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("");

        let usage = body.usage.map(|u| TokenUsage {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        });

        Ok(CompletionResponse {
            content,
            usage,
            finish_reason: body.stop_reason,
            model: if body.model.is_empty() {
                model.to_string()
            } else {
                body.model
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convert_messages_extracts_system() {
        let messages = vec![
            Message::system("You are the security agent."),
            Message::system("Be strict."),
            Message::user("Review this diff"),
            Message::assistant("Looking"),
        ];

        let (system, converted) = AnthropicProvider::convert_messages(&messages);
        assert_eq!(
            system.as_deref(),
            Some("You are the security agent.\n\nBe strict.")
        );
        assert_eq!(converted.len(), 2);
        assert_eq!(converted[0].role, "user");
        assert_eq!(converted[1].role, "assistant");
    }

    #[test]
    fn test_convert_messages_without_system() {
        let messages = vec![Message::user("hi")];
        let (system, converted) = AnthropicProvider::convert_messages(&messages);
        assert!(system.is_none());
        assert_eq!(converted.len(), 1);
    }

    #[test]
    fn test_response_parsing_skips_non_text_blocks() {
        let json = r#"{
            "model": "claude-3-5-sonnet-20241022",
            "content": [
                {"type": "text", "text": "APPROVE"},
                {"type": "tool_use", "id": "t1", "name": "x", "input": {}}
            ],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 10, "output_tokens": 2}
        }"#;
        let parsed: AnthropicResponse = serde_json::from_str(json).expect("valid response");
        assert_eq!(parsed.content.len(), 2);
        assert!(matches!(parsed.content[1], ResponseContentBlock::Other));
    }

    #[test]
    fn test_config_debug_masks_key() {
        let config = AnthropicConfig::new("sk-ant-REDACTED");
        let debug_str = format!("{:?}", config);
        assert!(!debug_str.contains("1234567890abcdefghijkl"));
    }
}
