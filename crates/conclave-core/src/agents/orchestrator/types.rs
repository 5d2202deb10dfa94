use crate::agents::intent::ActionCheck;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of one agent within a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentResultStatus {
    /// The agent produced a reply
    Success,
    /// Every provider failed for this agent
    Failed,
}

/// Result of running one agent inside a job
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentResult {
    /// Agent id
    pub agent_id: String,
    /// Display name
    pub agent_name: String,
    /// Success or failure
    pub status: AgentResultStatus,
    /// Model reply on success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    /// Failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent on the agent
    pub execution_time_ms: u64,
    /// Intent/permission check of the reply (success only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ActionCheck>,
}

impl AgentResult {
    /// Whether the agent succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == AgentResultStatus::Success
    }

    /// Reply text, empty on failure
    #[must_use]
    pub fn text(&self) -> &str {
        self.result.as_deref().unwrap_or_default()
    }
}

/// What should happen to the change under review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    /// Every gate passed
    ApproveAndMerge,
    /// Code review asked for changes
    RequestChanges,
    /// Governance or security veto
    BlockPr,
    /// Nothing conclusive
    ManualReview,
}

impl DecisionAction {
    /// Snake-case name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApproveAndMerge => "approve_and_merge",
            Self::RequestChanges => "request_changes",
            Self::BlockPr => "block_pr",
            Self::ManualReview => "manual_review",
        }
    }
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Decision derived from one job's results. Never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrchestrationDecision {
    /// Action to take
    pub action: DecisionAction,
    /// Human-readable reason
    pub reason: String,
    /// Whether the action may be applied without a human
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub automated: bool,
}

impl OrchestrationDecision {
    pub(super) fn new(action: DecisionAction, reason: &str) -> Self {
        Self {
            action,
            reason: reason.to_string(),
            automated: false,
        }
    }
}

/// Everything `orchestrate` returns for one job
#[derive(Debug, Clone, Serialize)]
pub struct OrchestrationOutcome {
    /// Job id
    pub job_id: String,
    /// Triggering event
    pub event: String,
    /// Always `success`; failures surface as errors instead
    pub status: String,
    /// Synthesized decision
    pub decision: OrchestrationDecision,
    /// Per-agent results (list order in sequential mode)
    pub results: Vec<AgentResult>,
}

/// Orchestrator settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Only select agents the lifecycle machine reports as running
    #[serde(default)]
    pub require_running: bool,
}
