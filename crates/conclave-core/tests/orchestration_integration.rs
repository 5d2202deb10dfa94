//! Orchestration Integration Tests
//!
//! End-to-end runs through the public API: agent files on disk, scripted
//! providers behind the real executor, breakers, lifecycle and job store.

use async_trait::async_trait;
use conclave_core::agents::{AgentLifecycle, LifecycleConfig, LifecycleError, Profile};
use conclave_core::{
    AgentDefinition, CircuitBreakerConfig, CircuitBreakerRegistry, DecisionAction, Error,
    EventBus, JobStateStore, JobStatus, JobStoreConfig, Orchestrator, OrchestratorEvent,
    ProviderCredentials, ProviderExecutor, ProviderExecutorConfig, ProviderSpec,
    StaticProviderFactory, TomlAgentLoader,
};
use conclave_llm::{
    CompletionRequest, CompletionResponse, LlmProvider, MessageRole, MockProvider, ProviderKind,
};
use serde_json::json;
use std::collections::HashMap;
use std::fs;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

const KEY: &str = "sk-proj-a1b2c3d4e5f6g7h8i9j0";

/// Replies keyed on the agent name in the system prompt; `None` fails the call
struct ScriptedAgents(HashMap<String, Option<String>>);

#[async_trait]
impl LlmProvider for ScriptedAgents {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> conclave_llm::Result<CompletionResponse> {
        let system = request
            .messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        let name = system
            .strip_prefix("You are ")
            .and_then(|rest| rest.split(".\n").next())
            .unwrap_or_default();

        match self.0.get(name) {
            Some(Some(content)) => Ok(CompletionResponse {
                content: content.clone(),
                usage: None,
                finish_reason: None,
                model: "scripted".to_string(),
            }),
            _ => Err(conclave_llm::Error::Network(format!("{name} unreachable"))),
        }
    }
}

fn write_agents(dir: &TempDir, ids: &[&str]) {
    for id in ids {
        fs::write(
            dir.path().join(format!("{id}.toml")),
            format!("id = \"{id}\"\nname = \"{id}\"\nrole = \"reviews {id}\"\n"),
        )
        .unwrap();
    }
}

fn orchestrator(dir: &TempDir, replies: &[(&str, Option<&str>)], events: EventBus) -> Orchestrator {
    let scripted = ScriptedAgents(
        replies
            .iter()
            .map(|(id, reply)| (id.to_string(), reply.map(str::to_string)))
            .collect(),
    );
    let factory =
        StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, Arc::new(scripted));
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        events.clone(),
        ProviderExecutorConfig::default(),
    );

    Orchestrator::new(
        Arc::new(TomlAgentLoader::with_path(dir.path())),
        Arc::new(executor),
        Arc::new(ProviderCredentials::new().with_key(ProviderKind::OpenAi, "default", KEY)),
        events,
    )
}

fn spec(kind: ProviderKind) -> ProviderSpec {
    ProviderSpec {
        kind,
        api_key: KEY.to_string(),
        model: None,
    }
}

#[tokio::test]
async fn test_first_provider_wins() {
    let openai = MockProvider::new("openai").with_default_reply("first");
    let kimi = MockProvider::new("kimi").with_default_reply("second");
    let factory = StaticProviderFactory::new()
        .with_provider(ProviderKind::OpenAi, Arc::new(openai.clone()))
        .with_provider(ProviderKind::Kimi, Arc::new(kimi.clone()));
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        EventBus::default(),
        ProviderExecutorConfig::default(),
    );

    let reply = executor
        .run_chat("s", "u", &[], &[spec(ProviderKind::OpenAi), spec(ProviderKind::Kimi)])
        .await
        .unwrap();
    assert_eq!(reply, "first");
    assert_eq!(openai.call_count(), 1);
    assert_eq!(kimi.call_count(), 0);
}

#[tokio::test]
async fn test_exhaustion_names_every_provider() {
    let factory = ProviderKind::FALLBACK_ORDER
        .into_iter()
        .fold(StaticProviderFactory::new(), |factory, kind| {
            let mock = MockProvider::new(kind.as_str());
            mock.push_error(conclave_llm::Error::Api {
                status: 503,
                message: format!("{kind} overloaded"),
            });
            factory.with_provider(kind, Arc::new(mock))
        });
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        EventBus::default(),
        ProviderExecutorConfig::default(),
    );
    let providers: Vec<_> = ProviderKind::FALLBACK_ORDER.into_iter().map(spec).collect();

    let err = executor.run_chat("s", "u", &[], &providers).await.unwrap_err();
    let message = err.to_string();
    for kind in ProviderKind::FALLBACK_ORDER {
        assert!(message.contains(kind.as_str()), "{message} should name {kind}");
    }
    assert!(matches!(err, Error::ProvidersExhausted { ref attempts } if attempts.len() == 4));
}

#[tokio::test(start_paused = true)]
async fn test_breaker_opens_then_recovers_through_executor() {
    let openai = MockProvider::new("openai").with_default_reply("recovered");
    for _ in 0..3 {
        openai.push_error(conclave_llm::Error::Network("down".to_string()));
    }
    let factory =
        StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, Arc::new(openai.clone()));
    let breakers = Arc::new(CircuitBreakerRegistry::new(
        CircuitBreakerConfig::new()
            .with_failure_threshold(3)
            .with_reset_timeout(Duration::from_secs(30)),
    ));
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        breakers.clone(),
        EventBus::default(),
        ProviderExecutorConfig::default(),
    );
    let providers = [spec(ProviderKind::OpenAi)];

    for _ in 0..3 {
        assert!(executor.run_chat("s", "u", &[], &providers).await.is_err());
    }
    assert!(breakers.get("openai").state().is_open());

    // Open: rejected without calling the provider
    let err = executor.run_chat("s", "u", &[], &providers).await.unwrap_err();
    assert!(err.to_string().contains("is open"));
    assert_eq!(openai.call_count(), 3);

    tokio::time::advance(Duration::from_secs(31)).await;
    assert_eq!(
        executor.run_chat("s", "u", &[], &providers).await.unwrap(),
        "recovered"
    );
    assert_eq!(openai.call_count(), 4);
    assert_eq!(breakers.get("openai").failure_count(), 0);
    assert!(!breakers.get("openai").state().is_open());
}

#[test]
fn test_lifecycle_rules() {
    let agent = AgentDefinition::new("a", "A", "r").with_profiles([Profile::Staging]);

    let staging = AgentLifecycle::new(
        LifecycleConfig {
            profile: Profile::Staging,
            safe_mode: false,
        },
        EventBus::default(),
    );
    let first = staging.start(&agent).unwrap();
    assert_eq!(
        staging.start(&agent).unwrap_err(),
        LifecycleError::AlreadyRunning("a".to_string())
    );
    assert_eq!(staging.status("a").unwrap().started_at, first.started_at);

    for profile in [Profile::Development, Profile::Production] {
        let lifecycle = AgentLifecycle::new(
            LifecycleConfig {
                profile,
                safe_mode: false,
            },
            EventBus::default(),
        );
        assert!(matches!(
            lifecycle.start(&agent),
            Err(LifecycleError::ProfileNotAllowed { .. })
        ));
        assert!(lifecycle.status("a").is_none());
    }
}

#[tokio::test]
async fn test_parallel_fail_and_success() {
    let dir = TempDir::new().unwrap();
    write_agents(
        &dir,
        &["governance-review-agent", "code-review-agent", "security-agent", "integrity-agent"],
    );
    let orchestrator = orchestrator(
        &dir,
        &[
            ("governance-review-agent", Some("compliant")),
            ("code-review-agent", Some("looks fine")),
            ("security-agent", None),
            ("integrity-agent", Some("healthy")),
        ],
        EventBus::default(),
    );

    let outcome = orchestrator
        .orchestrate("pull_request.opened", &json!({"number": 1}), &json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 4);
    let failed: Vec<_> = outcome
        .results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.agent_id.as_str())
        .collect();
    assert_eq!(failed, vec!["security-agent"]);
    assert_eq!(outcome.decision.action, DecisionAction::BlockPr);
    assert_eq!(outcome.decision.reason, "Security vulnerabilities detected");
}

#[tokio::test]
async fn test_governance_failure_blocks() {
    let dir = TempDir::new().unwrap();
    write_agents(&dir, &["governance-review-agent", "security-agent"]);
    let orchestrator = orchestrator(
        &dir,
        &[("governance-review-agent", None), ("security-agent", Some("ok"))],
        EventBus::default(),
    );

    let outcome = orchestrator
        .orchestrate("pull_request.ready_for_review", &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.decision.action, DecisionAction::BlockPr);
    assert_eq!(outcome.decision.reason, "Governance violations detected");
}

#[tokio::test]
async fn test_clean_review_is_approved() {
    let dir = TempDir::new().unwrap();
    write_agents(&dir, &["code-review-agent", "security-agent"]);
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let orchestrator = orchestrator(
        &dir,
        &[
            ("code-review-agent", Some("looks fine")),
            ("security-agent", Some("no CRITICAL issues")),
        ],
        events,
    );

    let outcome = orchestrator
        .orchestrate("pull_request.ready_for_review", &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.decision.action, DecisionAction::ApproveAndMerge);
    assert!(outcome.decision.automated);

    let mut completed = None;
    while let Ok(event) = rx.try_recv() {
        if let OrchestratorEvent::JobCompleted { job_id, decision, .. } = event {
            completed = Some((job_id, decision));
        }
    }
    assert_eq!(
        completed,
        Some((outcome.job_id.clone(), "approve_and_merge".to_string()))
    );

    let json = serde_json::to_value(&outcome).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["decision"]["action"], "approve_and_merge");
    assert!(json["job_id"].as_str().unwrap().starts_with("job_"));
}

#[tokio::test]
async fn test_broken_agent_file_fails_the_job() {
    let dir = TempDir::new().unwrap();
    write_agents(&dir, &["governance-agent"]);
    fs::write(dir.path().join("broken.toml"), "id = [").unwrap();
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let orchestrator = orchestrator(&dir, &[("governance-agent", Some("ok"))], events);

    let err = orchestrator
        .orchestrate("default", &json!({}), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Orchestration(_)));
    assert_eq!(rx.try_recv().unwrap().kind(), "job_failed");
}

#[tokio::test(start_paused = true)]
async fn test_job_store_sweep_and_cap() {
    let store = Arc::new(JobStateStore::new(JobStoreConfig {
        ttl: Duration::from_secs(3600),
        max_entries: 5,
        grace: Duration::from_secs(60),
    }));
    for i in 0..8 {
        store.record(&format!("agent{i}"), "job_old", JobStatus::Completed, None, None);
        assert!(store.len() <= 5);
    }

    tokio::time::advance(Duration::from_secs(3601)).await;
    store.record("agent", "job_new", JobStatus::Running, None, None);
    store.sweep();

    assert!(store.job_entries("job_old").is_empty());
    assert_eq!(store.job_entries("job_new").len(), 1);
}

#[tokio::test]
async fn test_orchestrated_states_are_recorded() {
    let dir = TempDir::new().unwrap();
    write_agents(&dir, &["integrity-agent"]);
    let store = Arc::new(JobStateStore::default());
    let orchestrator = orchestrator(&dir, &[("integrity-agent", Some("healthy"))], EventBus::default())
        .with_job_store(store.clone());

    let outcome = orchestrator
        .orchestrate("repository.health_check", &json!({}), &json!({}))
        .await
        .unwrap();

    let state = store.get("integrity-agent", &outcome.job_id).unwrap();
    assert_eq!(state.status, JobStatus::Completed);
    assert_eq!(state.result.as_deref(), Some("healthy"));
}
