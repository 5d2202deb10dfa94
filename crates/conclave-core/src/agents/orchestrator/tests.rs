use super::*;
use crate::agents::catalog::{AgentCatalog, MockAgentSource};
use crate::agents::strategy::EventStrategy;
use crate::jobs::{JobStatus, JobStoreConfig};
use crate::providers::{ProviderExecutorConfig, StaticProviderFactory};
use crate::utils::CircuitBreakerRegistry;
use conclave_llm::{CompletionRequest, CompletionResponse, LlmProvider, MessageRole, ProviderKind};
use serde_json::json;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Duration;

const KEY: &str = "sk-proj-a1b2c3d4e5f6g7h8i9j0";

/// Answers per agent, keyed on the name in the system prompt. `None` fails the call.
struct ScriptedAgents {
    replies: HashMap<String, Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedAgents {
    fn new(replies: &[(&str, Option<&str>)]) -> Arc<Self> {
        Arc::new(Self {
            replies: replies
                .iter()
                .map(|(name, reply)| (name.to_string(), reply.map(str::to_string)))
                .collect(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
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
            .map(|m| m.content.clone())
            .unwrap_or_default();
        let name = system
            .strip_prefix("You are ")
            .and_then(|rest| rest.split(".\n").next())
            .unwrap_or_default()
            .to_string();
        self.calls.lock().unwrap().push(name.clone());

        match self.replies.get(&name) {
            Some(Some(content)) => Ok(CompletionResponse {
                content: content.clone(),
                usage: None,
                finish_reason: Some("stop".to_string()),
                model: "scripted".to_string(),
            }),
            _ => Err(conclave_llm::Error::Api {
                status: 500,
                message: format!("scripted failure for {name}"),
            }),
        }
    }
}

fn agent(id: &str) -> AgentDefinition {
    AgentDefinition::new(id, id, format!("{id} role"))
}

fn orchestrator(agents: &[&str], provider: Arc<ScriptedAgents>, events: EventBus) -> Orchestrator {
    let catalog = AgentCatalog::new(agents.iter().map(|id| agent(id)).collect()).unwrap();
    let factory = StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, provider);
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        events.clone(),
        ProviderExecutorConfig::default(),
    );
    let credentials = ProviderCredentials::new().with_key(ProviderKind::OpenAi, "default", KEY);

    Orchestrator::new(
        Arc::new(catalog),
        Arc::new(executor),
        Arc::new(credentials),
        events,
    )
}

fn strategies(event: &str, agents: &[&str], mode: ExecutionMode) -> EventStrategies {
    let mut overrides = BTreeMap::new();
    overrides.insert(
        event.to_string(),
        EventStrategy {
            agents: agents.iter().map(|a| a.to_string()).collect(),
            mode,
        },
    );
    EventStrategies::with_overrides(overrides).unwrap()
}

#[tokio::test]
async fn test_parallel_failure_is_isolated() {
    let provider = ScriptedAgents::new(&[("agent-a", None), ("agent-b", Some("all good"))]);
    let orchestrator = orchestrator(&["agent-a", "agent-b"], provider, EventBus::default())
        .with_strategies(strategies("custom", &["agent-a", "agent-b"], ExecutionMode::Parallel));

    let outcome = orchestrator
        .orchestrate("custom", &json!({}), &json!({}))
        .await
        .unwrap();

    assert_eq!(outcome.status, "success");
    assert_eq!(outcome.results.len(), 2);
    let a = outcome.results.iter().find(|r| r.agent_id == "agent-a").unwrap();
    let b = outcome.results.iter().find(|r| r.agent_id == "agent-b").unwrap();
    assert_eq!(a.status, AgentResultStatus::Failed);
    assert!(a.error.as_deref().unwrap().contains("scripted failure"));
    assert!(a.metadata.is_none());
    assert_eq!(b.status, AgentResultStatus::Success);
    assert_eq!(b.result.as_deref(), Some("all good"));
    assert_eq!(outcome.decision.action, DecisionAction::ManualReview);
}

#[tokio::test]
async fn test_sequential_runs_in_order_past_failures() {
    let provider = ScriptedAgents::new(&[
        ("first", Some("one")),
        ("second", None),
        ("third", Some("three")),
    ]);
    let orchestrator = orchestrator(&["first", "second", "third"], provider.clone(), EventBus::default())
        .with_strategies(strategies(
            "custom",
            &["third", "first", "second"],
            ExecutionMode::Sequential,
        ));

    let outcome = orchestrator
        .orchestrate("custom", &json!({}), &json!({}))
        .await
        .unwrap();

    let order: Vec<_> = outcome.results.iter().map(|r| r.agent_id.as_str()).collect();
    assert_eq!(order, vec!["third", "first", "second"]);
    assert_eq!(provider.calls(), vec!["third", "first", "second"]);
    assert_eq!(outcome.results[2].status, AgentResultStatus::Failed);
}

#[tokio::test]
async fn test_unknown_agents_are_dropped_and_default_strategy_used() {
    let provider = ScriptedAgents::new(&[("governance-agent", Some("fine"))]);
    let orchestrator = orchestrator(&["governance-agent"], provider, EventBus::default());

    let outcome = orchestrator
        .orchestrate("unmapped.event", &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].agent_id, "governance-agent");
    assert_eq!(outcome.decision.action, DecisionAction::ApproveAndMerge);
    assert!(outcome.decision.automated);

    // pull_request.opened maps to four agents, none of which are in this catalog
    let outcome = orchestrator
        .orchestrate("pull_request.opened", &json!({}), &json!({}))
        .await
        .unwrap();
    assert!(outcome.results.is_empty());
    assert_eq!(outcome.decision.action, DecisionAction::ManualReview);
}

#[tokio::test]
async fn test_pull_request_decision() {
    let provider = ScriptedAgents::new(&[
        ("governance-review-agent", None),
        ("code-review-agent", Some("looks fine")),
        ("security-agent", Some("ok")),
        ("integrity-agent", Some("ok")),
    ]);
    let orchestrator = orchestrator(
        &[
            "governance-review-agent",
            "code-review-agent",
            "security-agent",
            "integrity-agent",
        ],
        provider,
        EventBus::default(),
    );

    let outcome = orchestrator
        .orchestrate("pull_request.opened", &json!({"number": 42}), &json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 4);
    assert_eq!(outcome.decision.action, DecisionAction::BlockPr);
    assert_eq!(outcome.decision.reason, "Governance violations detected");
}

#[tokio::test]
async fn test_catalog_failure_is_orchestration_error() {
    let mut source = MockAgentSource::new();
    source
        .expect_list_agents()
        .times(1)
        .returning(|| Err(Error::Configuration("bad agent file".into())));

    let events = EventBus::default();
    let mut rx = events.subscribe();
    let provider = ScriptedAgents::new(&[]);
    let factory = StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, provider);
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        events.clone(),
        ProviderExecutorConfig::default(),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(source),
        Arc::new(executor),
        Arc::new(ProviderCredentials::new()),
        events,
    );

    let err = orchestrator
        .orchestrate("pull_request.opened", &json!({}), &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Orchestration(_)));
    assert!(err.to_string().contains("bad agent file"));

    match rx.try_recv().unwrap() {
        OrchestratorEvent::JobFailed { event, error, .. } => {
            assert_eq!(event, "pull_request.opened");
            assert!(error.contains("bad agent file"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
    assert!(orchestrator.jobs().is_empty());
}

#[tokio::test]
async fn test_events_and_job_states() {
    let events = EventBus::default();
    let mut rx = events.subscribe();
    let provider = ScriptedAgents::new(&[("governance-agent", Some("approved"))]);
    let orchestrator = orchestrator(&["governance-agent"], provider, events);

    let outcome = orchestrator
        .orchestrate("default", &json!({}), &json!({}))
        .await
        .unwrap();

    let mut kinds = Vec::new();
    while let Ok(event) = rx.try_recv() {
        kinds.push(event.kind());
    }
    assert_eq!(
        kinds,
        vec!["agent_state_changed", "agent_state_changed", "job_completed"]
    );

    let states = orchestrator.jobs().job_entries(&outcome.job_id);
    assert_eq!(states.len(), 1);
    assert_eq!(states[0].status, JobStatus::Completed);
    assert_eq!(states[0].result.as_deref(), Some("approved"));
    assert!(orchestrator.jobs().is_pinned(&outcome.job_id));
}

#[tokio::test(start_paused = true)]
async fn test_job_states_purged_after_grace() {
    let provider = ScriptedAgents::new(&[("governance-agent", Some("ok"))]);
    let store = Arc::new(JobStateStore::new(JobStoreConfig {
        grace: Duration::from_secs(60),
        ..Default::default()
    }));
    let orchestrator = orchestrator(&["governance-agent"], provider, EventBus::default())
        .with_job_store(store.clone());

    let outcome = orchestrator
        .orchestrate("default", &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(store.job_entries(&outcome.job_id).len(), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert!(store.job_entries(&outcome.job_id).is_empty());
    assert!(!store.is_pinned(&outcome.job_id));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_orchestration_releases_its_job() {
    let slow = conclave_llm::MockProvider::new("openai").with_delay(Duration::from_secs(20));
    let events = EventBus::default();
    let executor = ProviderExecutor::new(
        Arc::new(StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, Arc::new(slow))),
        Arc::new(CircuitBreakerRegistry::default()),
        events.clone(),
        ProviderExecutorConfig::default(),
    );
    let store = Arc::new(JobStateStore::new(JobStoreConfig {
        ttl: Duration::from_secs(10),
        ..Default::default()
    }));
    let catalog = AgentCatalog::new(vec![agent("governance-agent")]).unwrap();
    let mut rx = events.subscribe();
    let orchestrator = Orchestrator::new(
        Arc::new(catalog),
        Arc::new(executor),
        Arc::new(ProviderCredentials::new().with_key(ProviderKind::OpenAi, "default", KEY)),
        events,
    )
    .with_job_store(store.clone());

    let cancelled = tokio::time::timeout(
        Duration::from_secs(1),
        orchestrator.orchestrate("default", &json!({}), &json!({})),
    )
    .await;
    assert!(cancelled.is_err());

    let job_id = match rx.try_recv().unwrap() {
        OrchestratorEvent::AgentStateChanged { job_id, .. } => job_id,
        other => panic!("unexpected event: {other:?}"),
    };
    let entries = store.job_entries(&job_id);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, JobStatus::Running);
    assert!(!store.is_pinned(&job_id));

    tokio::time::advance(Duration::from_secs(3600)).await;
    assert_eq!(store.sweep(), 1);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_require_running_filters_stopped_agents() {
    let provider = ScriptedAgents::new(&[("agent-a", Some("a")), ("agent-b", Some("b"))]);
    let events = EventBus::default();
    let orchestrator = orchestrator(&["agent-a", "agent-b"], provider, events)
        .with_strategies(strategies("custom", &["agent-a", "agent-b"], ExecutionMode::Sequential))
        .with_config(OrchestratorConfig {
            require_running: true,
        });

    orchestrator.lifecycle().start(&agent("agent-b")).unwrap();

    let outcome = orchestrator
        .orchestrate("custom", &json!({}), &json!({}))
        .await
        .unwrap();
    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.results[0].agent_id, "agent-b");

    orchestrator.lifecycle().stop_all();
    let outcome = orchestrator
        .orchestrate("custom", &json!({}), &json!({}))
        .await
        .unwrap();
    assert!(outcome.results.is_empty());
}

#[tokio::test]
async fn test_disallowed_action_goes_to_metadata() {
    let provider = ScriptedAgents::new(&[("governance-agent", Some("[EXECUTE_COMMAND]rm -rf /"))]);
    let orchestrator = orchestrator(&["governance-agent"], provider, EventBus::default());

    let outcome = orchestrator
        .orchestrate("default", &json!({}), &json!({}))
        .await
        .unwrap();
    let result = &outcome.results[0];
    assert_eq!(result.status, AgentResultStatus::Success);
    let check = result.metadata.as_ref().unwrap();
    assert_eq!(check.action.as_deref(), Some("execute_command"));
    assert!(!check.allowed);
}

#[tokio::test]
async fn test_prompt_carries_payload_and_context() {
    let mock = conclave_llm::MockProvider::new("openai");
    let events = EventBus::default();
    let factory = StaticProviderFactory::new().with_provider(ProviderKind::OpenAi, Arc::new(mock.clone()));
    let executor = ProviderExecutor::new(
        Arc::new(factory),
        Arc::new(CircuitBreakerRegistry::default()),
        events.clone(),
        ProviderExecutorConfig::default(),
    );
    let orchestrator = Orchestrator::new(
        Arc::new(AgentCatalog::new(vec![agent("governance-agent")]).unwrap()),
        Arc::new(executor),
        Arc::new(ProviderCredentials::new().with_key(ProviderKind::OpenAi, "default", KEY)),
        events,
    )
    .with_knowledge(Arc::new(Knowledge::new(vec!["house rules".into()])));

    orchestrator
        .orchestrate("default", &json!({"pr": 1}), &json!({"primaryLanguage": "Rust"}))
        .await
        .unwrap();

    let request = &mock.requests()[0];
    assert_eq!(
        request.messages[0].content,
        "You are governance-agent.\nRole: governance-agent role.\nRepository context: language=Rust, framework=Express."
    );
    assert!(request.messages[1].content.contains("\"pr\": 1"));
    assert!(request.messages[1].content.ends_with("Knowledge:\nhouse rules"));
}
