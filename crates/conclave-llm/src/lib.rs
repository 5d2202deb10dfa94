//! Conclave LLM - LLM Provider Abstraction
//!
//! This crate provides the vendor adapters used by the Conclave engine:
//! - Provider: the [`LlmProvider`] trait and message types
//! - OpenAI-compatible: OpenAI, Kimi (Moonshot), Perplexity
//! - Anthropic: Claude Messages API
//! - Mock: scripted provider for tests
//! - Util: API key hygiene (masking, usability checks, error scrubbing)

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod anthropic;
pub mod error;
mod http;
pub mod mock;
pub mod openai_compat;
pub mod provider;
pub mod util;

pub use error::{Error, Result};
pub use http::{key_hint, DEFAULT_MAX_TOKENS, DEFAULT_TIMEOUT};
pub use provider::{
    CompletionRequest, CompletionResponse, LlmProvider, Message, MessageRole, ProviderKind,
    TokenUsage,
};

// Re-export provider types
pub use anthropic::{AnthropicConfig, AnthropicProvider};
pub use mock::MockProvider;
pub use openai_compat::{OpenAiCompatConfig, OpenAiCompatProvider};
