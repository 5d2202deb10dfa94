//! Conclave Core - Orchestration Engine
//!
//! This crate provides the core logic of Conclave, including:
//! - Agents: catalog, lifecycle state machine, event orchestration and decisions
//! - Providers: ordered multi-provider execution behind circuit breakers
//! - Credentials: provider keys and per-agent fallback lists
//! - Jobs: short-lived per-job agent state with TTL and grace cleanup
//! - Event bus: lifecycle and orchestration events for audit sinks
//! - Utils: circuit breaker and id generation

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod agents;
pub mod credentials;
pub mod error;
pub mod event_bus;
pub mod jobs;
pub mod providers;
pub mod utils;

pub use agents::{
    AgentCatalog, AgentDefinition, AgentLifecycle, AgentResult, AgentRunner, AgentSource,
    DecisionAction, EventStrategies, Knowledge, LifecycleConfig, OrchestrationDecision,
    OrchestrationOutcome, Orchestrator, OrchestratorConfig, Profile, TomlAgentLoader,
};
pub use credentials::{ProviderCredentials, ProviderSpec};
pub use error::{format_error_for_cli, Error, Result, UserFriendlyError};
pub use event_bus::{EventBus, OrchestratorEvent};
pub use jobs::{JobPin, JobState, JobStateStore, JobStatus, JobStoreConfig};
pub use providers::{
    HttpProviderFactory, ProviderExecutor, ProviderExecutorConfig, ProviderFactory,
    StaticProviderFactory,
};
pub use utils::{CircuitBreakerConfig, CircuitBreakerRegistry};
