//! Error types for conclave-core
//!
//! This module provides error types and user-friendly error formatting.

use crate::agents::LifecycleError;
use serde::Serialize;
use thiserror::Error;

/// One failed provider attempt inside a [`Error::ProvidersExhausted`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProviderAttempt {
    /// Provider name
    pub provider: String,
    /// Why the attempt failed
    pub error: String,
}

/// Core error type
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (malformed catalog, bad event mapping, invalid settings)
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Agent id not present in the catalog
    #[error("agent not found: {0}")]
    AgentNotFound(String),

    /// Lifecycle transition rejected
    #[error("lifecycle error: {0}")]
    Lifecycle(#[from] LifecycleError),

    /// Every provider in the list failed, or none was usable
    #[error("all providers exhausted: {}", describe_attempts(.attempts))]
    ProvidersExhausted {
        /// Attempts in the order they were made
        attempts: Vec<ProviderAttempt>,
    },

    /// A reply asked for an action the agent is not permitted to perform
    #[error("agent {agent_id} is not allowed to perform action: {action}")]
    ActionNotAllowed {
        /// Agent id
        agent_id: String,
        /// Requested action
        action: String,
    },

    /// Orchestration failed before any agent result was produced
    #[error("orchestration error: {0}")]
    Orchestration(String),

    /// LLM provider error
    #[error("llm error: {0}")]
    Llm(#[from] conclave_llm::Error),

    /// Internal error (serialization, I/O, etc.)
    #[error("internal error: {0}")]
    Internal(String),
}

fn describe_attempts(attempts: &[ProviderAttempt]) -> String {
    if attempts.is_empty() {
        return "no provider had a usable key".to_string();
    }
    attempts
        .iter()
        .map(|a| format!("{}: {}", a.provider, a.error))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Trait for user-friendly error messages
///
/// Provides human-readable error messages and suggestions for fixing.
pub trait UserFriendlyError {
    /// Get a user-friendly error message
    fn user_message(&self) -> String;

    /// Get a suggestion for how to fix the error
    fn suggestion(&self) -> Option<String>;
}

impl UserFriendlyError for Error {
    fn user_message(&self) -> String {
        match self {
            Error::Configuration(msg) => format!("⚙️ Configuration error: {}", msg),
            Error::AgentNotFound(id) => format!("🔍 Agent '{}' is not in the catalog.", id),
            Error::Lifecycle(e) => format!("🚦 {}", e),
            Error::ProvidersExhausted { attempts } => {
                if attempts.is_empty() {
                    "🔑 No LLM provider has a usable API key.".to_string()
                } else {
                    format!(
                        "🤖 All {} LLM providers failed: {}",
                        attempts.len(),
                        describe_attempts(attempts)
                    )
                }
            }
            Error::ActionNotAllowed { agent_id, action } => {
                format!("🛑 Agent '{}' may not perform '{}'.", agent_id, action)
            }
            Error::Orchestration(msg) => format!("🧭 Orchestration failed: {}", msg),
            Error::Llm(e) => format!("🤖 LLM error: {}", e),
            Error::Internal(msg) => format!("❌ Internal error: {}", msg),
        }
    }

    fn suggestion(&self) -> Option<String> {
        match self {
            Error::Configuration(_) => Some(
                "💡 Check config/default.toml and the agent files in config/agents.".to_string(),
            ),
            Error::AgentNotFound(_) => {
                Some("💡 Run `conclave agents` to list the configured agents.".to_string())
            }
            Error::ProvidersExhausted { attempts } if attempts.is_empty() => Some(
                "💡 Set OPENAI_API_KEY, KIMI_API_KEY, PERPLEXITY_KEY or ANTHROPIC_API_KEY."
                    .to_string(),
            ),
            Error::ProvidersExhausted { .. } => {
                Some("💡 Check provider status and your network, then retry.".to_string())
            }
            Error::Lifecycle(LifecycleError::SafeModeBlocked { .. }) => {
                Some("💡 Disable safe mode or restrict the agent's contexts.".to_string())
            }
            _ => None,
        }
    }
}

/// Format an error for display in the CLI
pub fn format_error_for_cli(error: &Error) -> String {
    let mut output = error.user_message();

    if let Some(suggestion) = error.suggestion() {
        output.push_str("\n\n");
        output.push_str(&suggestion);
    }

    output
}
