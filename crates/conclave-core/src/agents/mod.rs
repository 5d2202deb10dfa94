//! Agents
//!
//! Everything between an inbound event and a decision:
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//! │ AgentSource  │──►│ Orchestrator │──►│ ProviderExecutor     │
//! │ (catalog)    │   │  strategies  │   │ (breakers, fallback) │
//! └──────────────┘   │  decision    │   └──────────────────────┘
//!                    └──────┬───────┘
//!                           ▼
//!                  JobStateStore / EventBus
//! ```
//!
//! The lifecycle machine tracks which agents are running; the runner executes a
//! single agent outside of any job.

mod catalog;
mod definition;
mod intent;
mod knowledge;
mod lifecycle;
mod orchestrator;
mod prompt;
mod runner;
mod strategy;

pub use catalog::{AgentCatalog, AgentSource, TomlAgentLoader, DEFAULT_AGENTS_DIR};
pub use definition::{AgentContext, AgentDefinition, Profile, RiskLevel};
pub use intent::{ActionCheck, Intent, IntentExtractor, KeywordIntentExtractor};
pub use knowledge::{Knowledge, DEFAULT_KNOWLEDGE_DIR};
pub use lifecycle::{
    AgentLifecycle, AgentRuntimeState, AgentStatus, LifecycleConfig, LifecycleError,
};
pub use orchestrator::{
    synthesize_decision, AgentResult, AgentResultStatus, DecisionAction, OrchestrationDecision,
    OrchestrationOutcome, Orchestrator, OrchestratorConfig, CODE_REVIEW_AGENT, GOVERNANCE_AGENT,
    SECURITY_AGENT,
};
pub use prompt::{orchestration_prompts, render_template, runner_prompts, template_context};
pub use runner::{AgentRunner, FAILURE_MESSAGE, NO_REPLY_MESSAGE};
pub use strategy::{EventStrategies, EventStrategy, ExecutionMode, DEFAULT_EVENT};
