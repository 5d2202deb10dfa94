//! Agent Orchestrator
//!
//! Turns one incoming event into one decision:
//!
//! ```text
//! event ──► strategy (agents + mode) ──► catalog lookup
//!                                            │
//!                       ┌────────────────────┴───────────────────┐
//!                       ▼                                        ▼
//!              parallel fan-out/fan-in                 sequential, list order
//!                       └────────────────────┬───────────────────┘
//!                                            ▼
//!                         AgentResults ──► decision ──► (grace) purge
//! ```
//!
//! Each agent writes its own `JobState` entry. A failure inside one agent becomes
//! that agent's failed result; only failures before any agent runs (a broken
//! catalog) are returned as errors.

mod decision;
mod execution;
mod types;

#[cfg(test)]
mod tests;

pub use decision::{synthesize_decision, CODE_REVIEW_AGENT, GOVERNANCE_AGENT, SECURITY_AGENT};
pub use types::{
    AgentResult, AgentResultStatus, DecisionAction, OrchestrationDecision, OrchestrationOutcome,
    OrchestratorConfig,
};

use super::catalog::AgentSource;
use super::definition::AgentDefinition;
use super::intent::{IntentExtractor, KeywordIntentExtractor};
use super::knowledge::Knowledge;
use super::lifecycle::{AgentLifecycle, LifecycleConfig};
use super::strategy::{EventStrategies, ExecutionMode};
use crate::credentials::ProviderCredentials;
use crate::error::{Error, Result};
use crate::event_bus::{EventBus, OrchestratorEvent};
use crate::jobs::JobStateStore;
use crate::providers::ProviderExecutor;
use crate::utils::new_job_id;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// Event-driven multi-agent orchestrator
pub struct Orchestrator {
    source: Arc<dyn AgentSource>,
    strategies: EventStrategies,
    executor: Arc<ProviderExecutor>,
    credentials: Arc<ProviderCredentials>,
    lifecycle: Arc<AgentLifecycle>,
    jobs: Arc<JobStateStore>,
    events: EventBus,
    knowledge: Arc<Knowledge>,
    extractor: Arc<dyn IntentExtractor>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    /// Create an orchestrator with the built-in strategy table, an empty
    /// lifecycle registry, a default job store and no knowledge
    #[must_use]
    pub fn new(
        source: Arc<dyn AgentSource>,
        executor: Arc<ProviderExecutor>,
        credentials: Arc<ProviderCredentials>,
        events: EventBus,
    ) -> Self {
        Self {
            source,
            strategies: EventStrategies::default(),
            executor,
            credentials,
            lifecycle: Arc::new(AgentLifecycle::new(
                LifecycleConfig::default(),
                events.clone(),
            )),
            jobs: Arc::new(JobStateStore::default()),
            events,
            knowledge: Arc::new(Knowledge::default()),
            extractor: Arc::new(KeywordIntentExtractor),
            config: OrchestratorConfig::default(),
        }
    }

    /// Use a custom event strategy table
    #[must_use]
    pub fn with_strategies(mut self, strategies: EventStrategies) -> Self {
        self.strategies = strategies;
        self
    }

    /// Share a lifecycle registry
    #[must_use]
    pub fn with_lifecycle(mut self, lifecycle: Arc<AgentLifecycle>) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Share a job state store
    #[must_use]
    pub fn with_job_store(mut self, jobs: Arc<JobStateStore>) -> Self {
        self.jobs = jobs;
        self
    }

    /// Knowledge injected into every prompt
    #[must_use]
    pub fn with_knowledge(mut self, knowledge: Arc<Knowledge>) -> Self {
        self.knowledge = knowledge;
        self
    }

    /// Swap the intent extractor
    #[must_use]
    pub fn with_intent_extractor(mut self, extractor: Arc<dyn IntentExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Orchestrator settings
    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.config = config;
        self
    }

    /// Event strategy table
    #[must_use]
    pub fn strategies(&self) -> &EventStrategies {
        &self.strategies
    }

    /// Job state store
    #[must_use]
    pub fn jobs(&self) -> &Arc<JobStateStore> {
        &self.jobs
    }

    /// Lifecycle registry
    #[must_use]
    pub fn lifecycle(&self) -> &Arc<AgentLifecycle> {
        &self.lifecycle
    }

    /// Run every agent mapped to `event` and synthesize a decision
    ///
    /// # Errors
    /// Returns [`Error::Orchestration`] if the agent catalog cannot be loaded. A
    /// `job_failed` event is published in that case.
    #[instrument(skip(self, payload, context))]
    pub async fn orchestrate(
        &self,
        event: &str,
        payload: &Value,
        context: &Value,
    ) -> Result<OrchestrationOutcome> {
        let job_id = new_job_id();
        info!(job_id = %job_id, "Starting orchestration");

        let catalog = match self.source.list_agents().await {
            Ok(agents) => agents,
            Err(e) => {
                let error = Error::Orchestration(format!("failed to load agent catalog: {e}"));
                error!(job_id = %job_id, error = %error, "Orchestration failed");
                self.events.publish(OrchestratorEvent::JobFailed {
                    job_id,
                    event: event.to_string(),
                    error: error.to_string(),
                });
                return Err(error);
            }
        };

        let strategy = self.strategies.resolve(event);
        let agents = self.select_agents(&strategy.agents, catalog);
        debug!(
            job_id = %job_id,
            mode = ?strategy.mode,
            selected = agents.len(),
            "Resolved event strategy"
        );

        let pin = self.jobs.pin_guard(&job_id);
        let results = match strategy.mode {
            ExecutionMode::Parallel => {
                self.execute_parallel(&job_id, &agents, payload, context)
                    .await
            }
            ExecutionMode::Sequential => {
                self.execute_sequential(&job_id, &agents, payload, context)
                    .await
            }
        };

        let decision = synthesize_decision(&results);
        // Detached: the store unpins and purges the job when the grace period ends
        drop(pin.finish());

        info!(
            job_id = %job_id,
            decision = %decision.action,
            results = results.len(),
            "Orchestration completed"
        );
        self.events.publish(OrchestratorEvent::JobCompleted {
            job_id: job_id.clone(),
            event: event.to_string(),
            decision: decision.action.to_string(),
        });

        Ok(OrchestrationOutcome {
            job_id,
            event: event.to_string(),
            status: "success".to_string(),
            decision,
            results,
        })
    }

    /// Map strategy ids to catalog entries, in strategy order
    fn select_agents(&self, ids: &[String], catalog: Vec<AgentDefinition>) -> Vec<AgentDefinition> {
        ids.iter()
            .filter_map(|id| {
                let agent = catalog.iter().find(|a| &a.id == id);
                if agent.is_none() {
                    debug!(agent_id = %id, "Skipping agent missing from catalog");
                }
                agent
            })
            .filter(|agent| {
                let allowed = !self.config.require_running || self.lifecycle.is_running(&agent.id);
                if !allowed {
                    debug!(agent_id = %agent.id, "Skipping agent that is not running");
                }
                allowed
            })
            .cloned()
            .collect()
    }
}
