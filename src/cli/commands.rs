use crate::app::{load_config, App};
use anyhow::{Context, Result};
use conclave_core::{format_error_for_cli, ProviderCredentials};
use conclave_llm::{key_hint, ProviderKind};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

fn parse_json(label: &str, raw: &str) -> Result<Value> {
    serde_json::from_str(raw).with_context(|| format!("--{label} is not valid JSON"))
}

fn build_app() -> Result<App> {
    let config = load_config()?;
    App::build(config)
}

pub fn agents() -> Result<()> {
    let app = build_app()?;
    let catalog = match app.loader.load_catalog() {
        Ok(catalog) => catalog,
        Err(e) => anyhow::bail!(format_error_for_cli(&e)),
    };

    if catalog.is_empty() {
        println!("No agents found in {:?}", app.loader.config_dir());
        return Ok(());
    }

    println!("🧑‍⚖️ Agents ({})\n", catalog.len());
    for agent in catalog.agents() {
        let profiles: Vec<_> = agent.allowed_profiles.iter().map(|p| p.as_str()).collect();
        println!(
            "  {:<26} {:<32} provider={:<11} risk={:?} profiles=[{}]{}",
            agent.id,
            agent.name,
            agent.model_provider,
            agent.risk,
            profiles.join(","),
            if agent.approval_required { " (approval)" } else { "" }
        );
    }
    Ok(())
}

pub fn events() -> Result<()> {
    let app = build_app()?;
    println!("📡 Event strategies\n");
    for (event, strategy) in app.strategies.entries() {
        println!(
            "  {:<32} {:<10} {}",
            event,
            format!("{:?}", strategy.mode).to_lowercase(),
            strategy.agents.join(", ")
        );
    }
    Ok(())
}

pub fn providers() -> Result<()> {
    let credentials = ProviderCredentials::from_env();
    let configured = credentials.configured_providers();

    println!("🔑 Providers (fallback order)\n");
    for kind in ProviderKind::FALLBACK_ORDER {
        if configured.contains(&kind) {
            println!("  ✅ {}", kind.display_name());
        } else {
            println!("  ❌ {} (set {})", kind.display_name(), key_hint(kind));
        }
    }
    Ok(())
}

pub async fn run_agent(agent_id: &str, input: &str, payload: &str) -> Result<()> {
    let payload = parse_json("payload", payload)?;
    let app = build_app()?;
    let shutdown = CancellationToken::new();
    let logger = app.spawn_event_logger(shutdown.clone());

    let reply = app.runner().run(agent_id, input, &payload).await;
    println!("{reply}");

    shutdown.cancel();
    let _ = logger.await;
    Ok(())
}

pub async fn orchestrate(event: &str, payload: &str, context: &str, start_agents: bool) -> Result<()> {
    let payload = parse_json("payload", payload)?;
    let context = parse_json("context", context)?;
    let app = build_app()?;

    let shutdown = CancellationToken::new();
    let logger = app.spawn_event_logger(shutdown.clone());
    let sweeper = app.spawn_sweeper(shutdown.clone());

    if start_agents {
        let catalog = app.loader.load_catalog().map_err(|e| anyhow::anyhow!(format_error_for_cli(&e)))?;
        for agent in catalog.agents() {
            if let Err(e) = app.lifecycle.start(agent) {
                warn!(agent_id = %agent.id, error = %e, "Agent not started");
            }
        }
    }

    let result = app.orchestrator().orchestrate(event, &payload, &context).await;

    let stopped = app.lifecycle.stop_all();
    if !stopped.is_empty() {
        debug!(count = stopped.len(), "Stopped agents");
    }
    for snapshot in app.breakers.snapshots() {
        debug!(
            provider = %snapshot.name,
            state = %snapshot.state,
            failures = snapshot.failures,
            "Circuit breaker"
        );
    }
    shutdown.cancel();
    let _ = tokio::join!(logger, sweeper);

    match result {
        Ok(outcome) => {
            let json = serde_json::to_string_pretty(&outcome)
                .context("Failed to serialize orchestration outcome")?;
            println!("{json}");
            Ok(())
        }
        Err(e) => anyhow::bail!(format_error_for_cli(&e)),
    }
}
