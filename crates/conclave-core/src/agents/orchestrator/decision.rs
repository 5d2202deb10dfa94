//! Decision synthesis
//!
//! Precedence is fixed and keyed by agent id, so the order results arrive in
//! (parallel mode) never matters.

use super::types::{AgentResult, DecisionAction, OrchestrationDecision};

/// Governance reviewer; a failure or a `block` verdict vetoes the change
pub const GOVERNANCE_AGENT: &str = "governance-review-agent";
/// Security reviewer; a failure or a critical finding vetoes the change
pub const SECURITY_AGENT: &str = "security-agent";
/// Code reviewer; `REQUEST_CHANGES` asks for changes
pub const CODE_REVIEW_AGENT: &str = "code-review-agent";

/// Words that cancel a directly following `critical`
const NEGATIONS: &[&str] = &["no", "not", "non", "zero", "0", "without"];

/// Combine one job's results into a decision
#[must_use]
pub fn synthesize_decision(results: &[AgentResult]) -> OrchestrationDecision {
    let by_agent = |id: &'static str| results.iter().filter(move |r| r.agent_id == id);

    if by_agent(GOVERNANCE_AGENT)
        .any(|r| !r.is_success() || r.text().contains("block") || r.text().contains("BLOCKED"))
    {
        return OrchestrationDecision::new(DecisionAction::BlockPr, "Governance violations detected");
    }

    if by_agent(SECURITY_AGENT).any(|r| !r.is_success() || reports_critical_finding(r.text())) {
        return OrchestrationDecision::new(DecisionAction::BlockPr, "Security vulnerabilities detected");
    }

    if by_agent(CODE_REVIEW_AGENT).any(|r| r.text().contains("REQUEST_CHANGES")) {
        return OrchestrationDecision::new(DecisionAction::RequestChanges, "Code quality issues found");
    }

    if !results.is_empty() && results.iter().all(AgentResult::is_success) {
        let mut decision =
            OrchestrationDecision::new(DecisionAction::ApproveAndMerge, "All quality gates passed");
        decision.automated = true;
        return decision;
    }

    OrchestrationDecision::new(DecisionAction::ManualReview, "Inconclusive results from agents")
}

/// Case-insensitive `critical` word not directly preceded by a negation
fn reports_critical_finding(text: &str) -> bool {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();

    words.iter().enumerate().any(|(i, word)| {
        *word == "critical" && !(i > 0 && NEGATIONS.contains(&words[i - 1]))
    })
}
