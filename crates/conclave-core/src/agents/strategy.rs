//! Event strategies
//!
//! Static mapping from an inbound event name to the agents that handle it and
//! whether they run in parallel or in sequence. Unknown events use `default`.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Name of the fallback strategy
pub const DEFAULT_EVENT: &str = "default";

/// How the agents of one job are executed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// All agents concurrently, wait for all
    Parallel,
    /// One at a time, in list order
    #[default]
    Sequential,
}

/// Agents and execution mode for one event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventStrategy {
    /// Agent ids, in execution order for sequential mode
    pub agents: Vec<String>,
    /// Execution mode
    #[serde(default)]
    pub mode: ExecutionMode,
}

impl EventStrategy {
    fn new(agents: &[&str], mode: ExecutionMode) -> Self {
        Self {
            agents: agents.iter().map(|a| (*a).to_string()).collect(),
            mode,
        }
    }
}

/// Event name to strategy table
#[derive(Debug, Clone)]
pub struct EventStrategies {
    strategies: HashMap<String, EventStrategy>,
}

impl Default for EventStrategies {
    fn default() -> Self {
        use ExecutionMode::{Parallel, Sequential};

        let pr_full = [
            "governance-review-agent",
            "code-review-agent",
            "security-agent",
            "integrity-agent",
        ];
        let scheduled = ["bsu-autonomous-architect", "runner", "security"];

        let strategies = HashMap::from([
            (
                "pull_request.opened".to_string(),
                EventStrategy::new(&pr_full, Parallel),
            ),
            (
                "pull_request.synchronize".to_string(),
                EventStrategy::new(&pr_full, Parallel),
            ),
            (
                "pull_request.ready_for_review".to_string(),
                EventStrategy::new(
                    &["governance-review-agent", "code-review-agent", "security-agent"],
                    Parallel,
                ),
            ),
            (
                "check_suite.completed".to_string(),
                EventStrategy::new(&["pr-merge-agent"], Sequential),
            ),
            (
                "repository.health_check".to_string(),
                EventStrategy::new(&["integrity-agent"], Sequential),
            ),
            (
                "scheduled.weekly_agents".to_string(),
                EventStrategy::new(&scheduled, Sequential),
            ),
            (
                "manual.orchestrator_run".to_string(),
                EventStrategy::new(&scheduled, Sequential),
            ),
            (
                DEFAULT_EVENT.to_string(),
                EventStrategy::new(&["governance-agent"], Sequential),
            ),
        ]);

        Self { strategies }
    }
}

impl EventStrategies {
    /// Build a table from explicit entries. A `default` entry is required.
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if any entry has no agents or `default` is missing.
    pub fn new(strategies: HashMap<String, EventStrategy>) -> Result<Self> {
        for (event, strategy) in &strategies {
            validate(event, strategy)?;
        }
        if !strategies.contains_key(DEFAULT_EVENT) {
            return Err(Error::Configuration(
                "event strategies must define a 'default' entry".to_string(),
            ));
        }
        Ok(Self { strategies })
    }

    /// Built-in table with `overrides` replacing or adding entries
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if an override has no agents.
    pub fn with_overrides(overrides: BTreeMap<String, EventStrategy>) -> Result<Self> {
        let mut table = Self::default();
        for (event, strategy) in overrides {
            validate(&event, &strategy)?;
            table.strategies.insert(event, strategy);
        }
        Ok(table)
    }

    /// Strategy for `event`, falling back to `default`
    #[must_use]
    pub fn resolve(&self, event: &str) -> &EventStrategy {
        self.strategies
            .get(event)
            .or_else(|| self.strategies.get(DEFAULT_EVENT))
            .unwrap_or(&FALLBACK)
    }

    /// Whether `event` has its own entry
    #[must_use]
    pub fn contains(&self, event: &str) -> bool {
        self.strategies.contains_key(event)
    }

    /// All entries sorted by event name
    #[must_use]
    pub fn entries(&self) -> Vec<(&str, &EventStrategy)> {
        let mut entries: Vec<_> = self
            .strategies
            .iter()
            .map(|(event, strategy)| (event.as_str(), strategy))
            .collect();
        entries.sort_by_key(|(event, _)| *event);
        entries
    }
}

// Only reachable if a table was built without `default`, which `new` forbids
static FALLBACK: EventStrategy = EventStrategy {
    agents: Vec::new(),
    mode: ExecutionMode::Sequential,
};

fn validate(event: &str, strategy: &EventStrategy) -> Result<()> {
    if strategy.agents.is_empty() || strategy.agents.iter().any(|a| a.trim().is_empty()) {
        return Err(Error::Configuration(format!(
            "event '{event}' must list at least one agent id"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = EventStrategies::default();

        let opened = table.resolve("pull_request.opened");
        assert_eq!(opened.mode, ExecutionMode::Parallel);
        assert_eq!(opened.agents.len(), 4);
        assert_eq!(opened.agents[0], "governance-review-agent");

        let merge = table.resolve("check_suite.completed");
        assert_eq!(merge.mode, ExecutionMode::Sequential);
        assert_eq!(merge.agents, vec!["pr-merge-agent"]);

        assert_eq!(table.entries().len(), 8);
    }

    #[test]
    fn test_unknown_event_uses_default() {
        let table = EventStrategies::default();
        let strategy = table.resolve("issue.opened");
        assert_eq!(strategy.agents, vec!["governance-agent"]);
        assert_eq!(strategy.mode, ExecutionMode::Sequential);
        assert!(!table.contains("issue.opened"));
    }

    #[test]
    fn test_overrides() {
        let overrides = BTreeMap::from([(
            "issue.opened".to_string(),
            EventStrategy {
                agents: vec!["triage-agent".to_string()],
                mode: ExecutionMode::Parallel,
            },
        )]);
        let table = EventStrategies::with_overrides(overrides).unwrap();
        assert_eq!(table.resolve("issue.opened").agents, vec!["triage-agent"]);
        assert!(table.contains("pull_request.opened"));
    }

    #[test]
    fn test_empty_agent_list_is_configuration_error() {
        let overrides = BTreeMap::from([(
            "pull_request.opened".to_string(),
            EventStrategy {
                agents: vec![],
                mode: ExecutionMode::Parallel,
            },
        )]);
        let err = EventStrategies::with_overrides(overrides).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_new_requires_default() {
        let err = EventStrategies::new(HashMap::from([(
            "x".to_string(),
            EventStrategy {
                agents: vec!["a".to_string()],
                mode: ExecutionMode::Sequential,
            },
        )]))
        .unwrap_err();
        assert!(err.to_string().contains("default"));
    }

    #[test]
    fn test_mode_deserialize() {
        let strategy: EventStrategy =
            toml::from_str("agents = [\"a\", \"b\"]\nmode = \"parallel\"").unwrap();
        assert_eq!(strategy.mode, ExecutionMode::Parallel);

        let defaulted: EventStrategy = toml::from_str("agents = [\"a\"]").unwrap();
        assert_eq!(defaulted.mode, ExecutionMode::Sequential);
    }
}
