//! CLI module for Conclave
//!
//! Thin adapter over the core:
//! - `agents`: list the agent catalog
//! - `events`: show the event strategy table
//! - `providers`: show which providers have usable keys
//! - `run`: run one agent on an input
//! - `orchestrate`: run the agents mapped to an event and print the decision

use clap::{Parser, Subcommand};

mod commands;

/// Conclave agent orchestrator CLI
#[derive(Parser, Debug)]
#[command(name = "conclave")]
#[command(about = "Event-driven agent orchestration over multiple LLM providers")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List configured agents
    Agents,
    /// Show the event strategy table
    Events,
    /// Show provider key status
    Providers,
    /// Run a single agent
    Run {
        /// Agent id
        agent: String,
        /// Input text
        input: String,
        /// JSON payload made available to prompt templates
        #[arg(long, default_value = "{}")]
        payload: String,
    },
    /// Orchestrate the agents mapped to an event
    Orchestrate {
        /// Event name (e.g. pull_request.opened)
        event: String,
        /// JSON payload describing the event
        #[arg(long, default_value = "{}")]
        payload: String,
        /// JSON repository context (primaryLanguage, framework)
        #[arg(long, default_value = "{}")]
        context: String,
        /// Start every catalog agent through the lifecycle machine first
        #[arg(long)]
        start_agents: bool,
    },
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Some(Commands::Agents) => commands::agents(),
        Some(Commands::Events) => commands::events(),
        Some(Commands::Providers) => commands::providers(),
        Some(Commands::Run {
            agent,
            input,
            payload,
        }) => commands::run_agent(&agent, &input, &payload).await,
        Some(Commands::Orchestrate {
            event,
            payload,
            context,
            start_agents,
        }) => commands::orchestrate(&event, &payload, &context, start_agents).await,
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}
