//! Service wiring
//!
//! Builds the shared registries once and hands out orchestrators and runners
//! that share them. Nothing here is global.

use super::config::AppConfig;
use anyhow::{Context, Result};
use conclave_core::agents::AgentSource;
use conclave_core::{
    AgentLifecycle, AgentRunner, CircuitBreakerRegistry, EventBus, EventStrategies,
    HttpProviderFactory, JobStateStore, Knowledge, Orchestrator, OrchestratorConfig,
    OrchestratorEvent, ProviderCredentials, ProviderExecutor, TomlAgentLoader,
};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Shared services for one process
pub struct App {
    pub config: AppConfig,
    pub events: EventBus,
    pub credentials: Arc<ProviderCredentials>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub executor: Arc<ProviderExecutor>,
    pub lifecycle: Arc<AgentLifecycle>,
    pub jobs: Arc<JobStateStore>,
    pub loader: Arc<TomlAgentLoader>,
    pub knowledge: Arc<Knowledge>,
    pub strategies: EventStrategies,
}

impl App {
    /// Wire every service from `config`, reading provider keys from the environment
    pub fn build(config: AppConfig) -> Result<Self> {
        Self::build_with_credentials(config, ProviderCredentials::from_env())
    }

    pub fn build_with_credentials(
        config: AppConfig,
        credentials: ProviderCredentials,
    ) -> Result<Self> {
        let strategies = EventStrategies::with_overrides(config.events.clone())
            .context("Invalid [events] configuration")?;

        let knowledge = Knowledge::load_dir(&config.orchestrator.knowledge_dir)
            .context("Failed to load knowledge")?;

        let events = EventBus::default();
        let breakers = Arc::new(CircuitBreakerRegistry::new(
            config.circuit_breaker.to_breaker_config(),
        ));
        let factory = HttpProviderFactory::new(config.providers.timeout())
            .with_max_tokens(config.providers.max_tokens);
        let executor = Arc::new(ProviderExecutor::new(
            Arc::new(factory),
            breakers.clone(),
            events.clone(),
            config.providers.executor_config(),
        ));
        let lifecycle = Arc::new(AgentLifecycle::new(
            config.lifecycle.clone(),
            events.clone(),
        ));
        let jobs = Arc::new(JobStateStore::new(config.jobs.to_store_config()));
        let loader = Arc::new(TomlAgentLoader::with_path(&config.orchestrator.agents_dir));

        let configured = credentials.configured_providers();
        if configured.is_empty() {
            warn!("No LLM provider has a usable API key");
        } else {
            info!(providers = ?configured, "LLM providers configured");
        }

        Ok(Self {
            config,
            events,
            credentials: Arc::new(credentials),
            breakers,
            executor,
            lifecycle,
            jobs,
            loader,
            knowledge: Arc::new(knowledge),
            strategies,
        })
    }

    fn source(&self) -> Arc<dyn AgentSource> {
        self.loader.clone()
    }

    /// Orchestrator sharing this app's registries
    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.source(),
            self.executor.clone(),
            self.credentials.clone(),
            self.events.clone(),
        )
        .with_strategies(self.strategies.clone())
        .with_lifecycle(self.lifecycle.clone())
        .with_job_store(self.jobs.clone())
        .with_knowledge(self.knowledge.clone())
        .with_config(OrchestratorConfig {
            require_running: self.config.orchestrator.require_running,
        })
    }

    /// Single-agent runner sharing this app's registries
    pub fn runner(&self) -> AgentRunner {
        AgentRunner::new(
            self.source(),
            self.credentials.clone(),
            self.executor.clone(),
            self.knowledge.clone(),
        )
    }

    /// Start the periodic job-state sweep
    pub fn spawn_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        self.jobs
            .spawn_sweeper(self.config.jobs.sweep_interval(), shutdown)
    }

    /// Log every published event until `shutdown` is cancelled
    pub fn spawn_event_logger(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let mut rx = self.events.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => log_event(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Event logger lagged behind");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
            debug!("Event logger stopped");
        })
    }
}

fn log_event(event: &OrchestratorEvent) {
    match serde_json::to_string(event) {
        Ok(json) => info!(kind = event.kind(), event = %json, "Event"),
        Err(e) => warn!(kind = event.kind(), error = %e, "Failed to serialize event"),
    }
}
