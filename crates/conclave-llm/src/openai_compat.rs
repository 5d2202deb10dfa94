//! OpenAI-compatible chat completions
//!
//! OpenAI, Moonshot (Kimi), and Perplexity all speak the `/chat/completions`
//! dialect, so one adapter covers them; only the base URL, default model, and
//! the name used in errors differ.

use crate::error::{Error, Result};
use crate::http::{build_client, ensure_success, map_send_error, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT};
use crate::provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, ProviderKind, TokenUsage,
};
use crate::util::{mask_api_key, sanitize_api_key};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{debug, instrument};

/// OpenAI API base URL
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Moonshot AI API base URL
pub const KIMI_BASE_URL: &str = "https://api.moonshot.cn/v1";
/// Perplexity API base URL
pub const PERPLEXITY_BASE_URL: &str = "https://api.perplexity.ai";

/// OpenAI default model
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
/// Kimi default model
pub const KIMI_DEFAULT_MODEL: &str = "moonshot-v1-8k";
/// Perplexity default model
pub const PERPLEXITY_DEFAULT_MODEL: &str = "sonar";

/// OpenAI-compatible provider configuration
#[derive(Clone)]
pub struct OpenAiCompatConfig {
    /// Which vendor this endpoint belongs to
    pub kind: ProviderKind,
    /// API key
    pub api_key: String,
    /// Base URL (without `/chat/completions`)
    pub base_url: String,
    /// Default model
    pub default_model: String,
    /// Default max tokens
    pub max_tokens: u32,
    /// Request timeout
    pub timeout: Duration,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for OpenAiCompatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiCompatConfig")
            .field("kind", &self.kind)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("base_url", &self.base_url)
            .field("default_model", &self.default_model)
            .field("max_tokens", &self.max_tokens)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl OpenAiCompatConfig {
    /// Configuration with the vendor's official endpoint and default model
    ///
    /// Returns `None` for vendors that do not speak the OpenAI dialect.
    #[must_use]
    pub fn for_kind(kind: ProviderKind, api_key: impl Into<String>) -> Option<Self> {
        let (base_url, default_model) = match kind {
            ProviderKind::OpenAi => (OPENAI_BASE_URL, OPENAI_DEFAULT_MODEL),
            ProviderKind::Kimi => (KIMI_BASE_URL, KIMI_DEFAULT_MODEL),
            ProviderKind::Perplexity => (PERPLEXITY_BASE_URL, PERPLEXITY_DEFAULT_MODEL),
            ProviderKind::Anthropic => return None,
        };

        Some(Self {
            kind,
            api_key: sanitize_api_key(&api_key.into()),
            base_url: base_url.to_string(),
            default_model: default_model.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            timeout: DEFAULT_TIMEOUT,
        })
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

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
    #[serde(default)]
    model: String,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
    total_tokens: u32,
}

/// OpenAI-compatible LLM provider
pub struct OpenAiCompatProvider {
    client: Client,
    config: OpenAiCompatConfig,
}

impl OpenAiCompatProvider {
    /// Create a new provider
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: OpenAiCompatConfig) -> Result<Self> {
        let client = build_client(config.timeout)?;
        Ok(Self { client, config })
    }

    fn convert_messages(messages: &[Message]) -> Vec<ChatMessage<'_>> {
        messages
            .iter()
            .map(|msg| ChatMessage {
                role: msg.role.as_str(),
                content: &msg.content,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        self.config.kind.as_str()
    }

    fn default_model(&self) -> &str {
        &self.config.default_model
    }

    #[instrument(skip(self, request), fields(provider = %self.config.kind, model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            self.config.default_model.as_str()
        } else {
            request.model.as_str()
        };

        let chat_request = ChatRequest {
            model,
            messages: Self::convert_messages(&request.messages),
            max_tokens: request.max_tokens.unwrap_or(self.config.max_tokens),
            temperature: request.temperature,
        };

        debug!("Sending chat completion request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.config.base_url))
            .header("Authorization", format!("Bearer {}", self.config.api_key))
            .header("Content-Type", "application/json")
            .json(&chat_request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.kind, self.config.timeout))?;

        let response = ensure_success(response, self.config.kind).await?;

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::InvalidResponse(e.to_string()))?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::InvalidResponse("No choices in response".to_string()))?;

        let usage = chat_response.usage.map(|u| TokenUsage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });

        Ok(CompletionResponse {
            content: choice.message.content.unwrap_or_default(),
            usage,
            finish_reason: choice.finish_reason,
            model: if chat_response.model.is_empty() {
                model.to_string()
            } else {
                chat_response.model
            },
        })
    }
}
