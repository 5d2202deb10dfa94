use super::types::{AgentResult, AgentResultStatus};
use super::Orchestrator;
use crate::agents::definition::AgentDefinition;
use crate::agents::intent::ActionCheck;
use crate::agents::prompt::orchestration_prompts;
use crate::event_bus::OrchestratorEvent;
use crate::jobs::JobStatus;
use futures::future::join_all;
use serde_json::Value;
use std::time::Instant;
use tracing::{debug, info, warn};

impl Orchestrator {
    /// Run every agent concurrently and wait for all of them
    pub(super) async fn execute_parallel(
        &self,
        job_id: &str,
        agents: &[AgentDefinition],
        payload: &Value,
        context: &Value,
    ) -> Vec<AgentResult> {
        info!(job_id = %job_id, count = agents.len(), "Executing agents in parallel");
        let futures = agents
            .iter()
            .map(|agent| self.execute_agent(job_id, agent, payload, context));
        join_all(futures).await
    }

    /// Run agents one after another in list order, continuing past failures
    pub(super) async fn execute_sequential(
        &self,
        job_id: &str,
        agents: &[AgentDefinition],
        payload: &Value,
        context: &Value,
    ) -> Vec<AgentResult> {
        info!(job_id = %job_id, count = agents.len(), "Executing agents sequentially");
        let mut results = Vec::with_capacity(agents.len());
        for agent in agents {
            results.push(self.execute_agent(job_id, agent, payload, context).await);
        }
        results
    }

    /// Run one agent. Failures are captured in the result, never returned.
    async fn execute_agent(
        &self,
        job_id: &str,
        agent: &AgentDefinition,
        payload: &Value,
        context: &Value,
    ) -> AgentResult {
        let start = Instant::now();
        self.record_state(job_id, &agent.id, JobStatus::Running, None, None);

        let providers = self.credentials.agent_providers(agent);
        let (system, user) = orchestration_prompts(agent, payload, context, &self.knowledge);
        debug!(
            job_id = %job_id,
            agent_id = %agent.id,
            providers = providers.len(),
            "Executing agent"
        );

        let outcome = self.executor.run_chat(&system, &user, &[], &providers).await;
        let execution_time_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(reply) => {
                let check = ActionCheck::evaluate(self.extractor.as_ref(), &reply, agent);
                if !check.allowed {
                    warn!(
                        job_id = %job_id,
                        agent_id = %agent.id,
                        action = ?check.action,
                        "Agent reply requests an action it is not allowed to perform"
                    );
                }
                self.record_state(
                    job_id,
                    &agent.id,
                    JobStatus::Completed,
                    Some(reply.clone()),
                    None,
                );
                info!(job_id = %job_id, agent_id = %agent.id, execution_time_ms, "Agent completed");

                AgentResult {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    status: AgentResultStatus::Success,
                    result: Some(reply),
                    error: None,
                    execution_time_ms,
                    metadata: Some(check),
                }
            }
            Err(e) => {
                let error = e.to_string();
                self.record_state(
                    job_id,
                    &agent.id,
                    JobStatus::Failed,
                    None,
                    Some(error.clone()),
                );
                warn!(job_id = %job_id, agent_id = %agent.id, error = %error, "Agent failed");

                AgentResult {
                    agent_id: agent.id.clone(),
                    agent_name: agent.name.clone(),
                    status: AgentResultStatus::Failed,
                    result: None,
                    error: Some(error),
                    execution_time_ms,
                    metadata: None,
                }
            }
        }
    }

    fn record_state(
        &self,
        job_id: &str,
        agent_id: &str,
        status: JobStatus,
        result: Option<String>,
        error: Option<String>,
    ) {
        self.jobs.record(agent_id, job_id, status, result, error);
        self.events.publish(OrchestratorEvent::AgentStateChanged {
            agent_id: agent_id.to_string(),
            job_id: job_id.to_string(),
            status: status.as_str().to_string(),
        });
    }
}
