//! Single-agent runner
//!
//! Runs one agent outside of an orchestrated job, e.g. from the CLI. The runner
//! always answers with text: failures are logged and replaced by a fixed message.

use super::catalog::AgentSource;
use super::intent::{ActionCheck, IntentExtractor, KeywordIntentExtractor};
use super::knowledge::Knowledge;
use super::prompt::runner_prompts;
use crate::credentials::ProviderCredentials;
use crate::error::{Error, Result};
use crate::providers::ProviderExecutor;
use serde_json::Value;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};

/// Returned when the model produced an empty reply
pub const NO_REPLY_MESSAGE: &str = "No reply was received from the agent.";

/// Returned when the run failed for any reason
pub const FAILURE_MESSAGE: &str = "An error occurred while running the agent.";

/// Runs a single agent against the provider chain
pub struct AgentRunner {
    source: Arc<dyn AgentSource>,
    credentials: Arc<ProviderCredentials>,
    executor: Arc<ProviderExecutor>,
    knowledge: Arc<Knowledge>,
    extractor: Arc<dyn IntentExtractor>,
}

impl AgentRunner {
    /// Create a runner with the keyword intent extractor
    #[must_use]
    pub fn new(
        source: Arc<dyn AgentSource>,
        credentials: Arc<ProviderCredentials>,
        executor: Arc<ProviderExecutor>,
        knowledge: Arc<Knowledge>,
    ) -> Self {
        Self {
            source,
            credentials,
            executor,
            knowledge,
            extractor: Arc::new(KeywordIntentExtractor),
        }
    }

    /// Swap the intent extractor
    #[must_use]
    pub fn with_intent_extractor(mut self, extractor: Arc<dyn IntentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Run `agent_id` on `input`. Never fails.
    pub async fn run(&self, agent_id: &str, input: &str, payload: &Value) -> String {
        match self.try_run(agent_id, input, payload).await {
            Ok(reply) if reply.trim().is_empty() => {
                warn!(agent_id = %agent_id, "Agent returned an empty reply");
                NO_REPLY_MESSAGE.to_string()
            }
            Ok(reply) => reply,
            Err(e) => {
                error!(agent_id = %agent_id, error = %e, "Agent run failed");
                FAILURE_MESSAGE.to_string()
            }
        }
    }

    /// Run `agent_id` and surface the underlying error instead of the fixed text
    ///
    /// # Errors
    /// - [`Error::AgentNotFound`] for an unknown id
    /// - [`Error::ProvidersExhausted`] when no provider is usable or all of them fail
    /// - [`Error::ActionNotAllowed`] when the reply asks for an action outside `actions`
    #[instrument(skip(self, input, payload))]
    pub async fn try_run(&self, agent_id: &str, input: &str, payload: &Value) -> Result<String> {
        let agent = self
            .source
            .list_agents()
            .await?
            .into_iter()
            .find(|a| a.id == agent_id)
            .ok_or_else(|| Error::AgentNotFound(agent_id.to_string()))?;

        let providers = self.credentials.agent_providers(&agent);
        if providers.is_empty() {
            return Err(Error::ProvidersExhausted {
                attempts: Vec::new(),
            });
        }

        let (system, user) = runner_prompts(&agent, input, &self.knowledge, payload);
        let reply = self
            .executor
            .run_chat(&system, &user, &[], &providers)
            .await?;

        let check = ActionCheck::evaluate(self.extractor.as_ref(), &reply, &agent);
        if !check.allowed {
            return Err(Error::ActionNotAllowed {
                agent_id: agent.id,
                action: check.action.unwrap_or_default(),
            });
        }

        info!(agent_id = %agent.id, intent = %check.intent, "Agent run completed");
        Ok(reply)
    }
}
