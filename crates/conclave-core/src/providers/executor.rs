//! Ordered provider fallback
//!
//! One logical "run this prompt" call becomes a sequence of attempts, one per
//! provider in priority order. Each attempt goes through that provider's circuit
//! breaker and is bounded by a timeout that drops (and so aborts) the request.

use super::factory::ProviderFactory;
use crate::credentials::ProviderSpec;
use crate::error::{Error, ProviderAttempt, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::utils::CircuitBreakerRegistry;
use conclave_llm::util::has_usable_api_key;
use conclave_llm::{CompletionRequest, Message};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Execution layer settings
#[derive(Debug, Clone)]
pub struct ProviderExecutorConfig {
    /// Upper bound for a single provider call
    pub timeout: Duration,
    /// Completion budget sent with every request
    pub max_tokens: u32,
}

impl Default for ProviderExecutorConfig {
    fn default() -> Self {
        Self {
            timeout: conclave_llm::DEFAULT_TIMEOUT,
            max_tokens: conclave_llm::DEFAULT_MAX_TOKENS,
        }
    }
}

/// Runs prompts across an ordered provider list
pub struct ProviderExecutor {
    factory: Arc<dyn ProviderFactory>,
    breakers: Arc<CircuitBreakerRegistry>,
    events: EventBus,
    config: ProviderExecutorConfig,
}

impl ProviderExecutor {
    /// Create an executor
    #[must_use]
    pub fn new(
        factory: Arc<dyn ProviderFactory>,
        breakers: Arc<CircuitBreakerRegistry>,
        events: EventBus,
        config: ProviderExecutorConfig,
    ) -> Self {
        Self {
            factory,
            breakers,
            events,
            config,
        }
    }

    /// Breakers guarding the providers
    #[must_use]
    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.breakers
    }

    /// Run a chat completion, trying `providers` in order until one succeeds.
    ///
    /// When `messages` is empty the conversation is `[system, user]`; otherwise
    /// `messages` is sent as given. Providers without a usable key and repeated
    /// providers are skipped without counting as an attempt.
    ///
    /// # Errors
    /// Returns [`Error::ProvidersExhausted`] listing every attempted provider and
    /// its failure when none succeeds (an empty list means no provider was usable).
    pub async fn run_chat(
        &self,
        system: &str,
        user: &str,
        messages: &[Message],
        providers: &[ProviderSpec],
    ) -> Result<String> {
        let conversation = if messages.is_empty() {
            vec![Message::system(system), Message::user(user)]
        } else {
            messages.to_vec()
        };

        let mut attempts: Vec<ProviderAttempt> = Vec::new();
        let mut seen = HashSet::new();

        for spec in providers {
            if !seen.insert(spec.kind) {
                debug!(provider = %spec.kind, "Skipping duplicate provider");
                continue;
            }
            if !has_usable_api_key(&spec.api_key) {
                debug!(provider = %spec.kind, "Skipping provider without a usable key");
                continue;
            }

            let attempt = attempts.len() + 1;
            info!(provider = %spec.kind, attempt, "Calling provider");

            let breaker = self.breakers.get(spec.kind.as_str());
            let result = breaker
                .execute(|| self.call(spec, conversation.clone()))
                .await;

            match result {
                Ok(content) => {
                    info!(provider = %spec.kind, attempt, "Provider succeeded");
                    return Ok(content);
                }
                Err(e) => {
                    if e.tripped() {
                        self.events.publish(OrchestratorEvent::BreakerOpened {
                            provider: spec.kind.to_string(),
                            failures: breaker.failure_count(),
                        });
                    }
                    warn!(provider = %spec.kind, attempt, error = %e, "Provider failed");
                    attempts.push(ProviderAttempt {
                        provider: spec.kind.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }

        Err(Error::ProvidersExhausted { attempts })
    }

    async fn call(
        &self,
        spec: &ProviderSpec,
        messages: Vec<Message>,
    ) -> conclave_llm::Result<String> {
        let provider = self.factory.create(spec)?;
        let request = CompletionRequest::new(spec.model.clone().unwrap_or_default())
            .with_messages(messages)
            .with_max_tokens(self.config.max_tokens);

        match tokio::time::timeout(self.config.timeout, provider.complete(request)).await {
            Ok(response) => response.map(|r| r.content),
            Err(_) => Err(conclave_llm::Error::Timeout(
                self.config.timeout.as_millis() as u64,
            )),
        }
    }
}
