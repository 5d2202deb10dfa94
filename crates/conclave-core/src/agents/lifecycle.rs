//! Agent lifecycle state machine
//!
//! Each agent is `stopped` (initial) or `running`. Nothing here starts an agent on
//! its own; every transition is an explicit request, gated at start time by the
//! deployment profile and safe mode. A rejected request leaves state untouched.

use super::definition::{AgentDefinition, Profile};
use crate::event_bus::{EventBus, OrchestratorEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tokio::time::Instant;
use tracing::{info, warn};

/// Lifecycle transition errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// Start requested for an agent that is already running
    #[error("Agent {0} is already running")]
    AlreadyRunning(String),

    /// Current profile is not in the agent's allowed profiles
    #[error("Agent {agent_id} is not allowed to run in {profile} profile. Allowed profiles: {allowed}")]
    ProfileNotAllowed {
        /// Agent id
        agent_id: String,
        /// Active profile
        profile: Profile,
        /// Comma-separated allowed profiles
        allowed: String,
    },

    /// Safe mode forbids agents with external-access contexts
    #[error("Agent {agent_id} requires external access but safe mode is enabled")]
    SafeModeBlocked {
        /// Agent id
        agent_id: String,
    },

    /// Stop requested for an agent that is not running
    #[error("Agent {0} is not running")]
    NotRunning(String),
}

/// Runtime status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Not running
    Stopped,
    /// Running
    Running,
}

/// Tracked runtime state of one agent
#[derive(Debug, Clone, Serialize)]
pub struct AgentRuntimeState {
    /// Agent id
    pub agent_id: String,
    /// Current status
    pub status: AgentStatus,
    /// When it was last started
    pub started_at: DateTime<Utc>,
    /// When it was last stopped
    pub stopped_at: Option<DateTime<Utc>>,
    /// Profile it was started under
    pub profile: Profile,
    /// Uptime in milliseconds (live while running, final once stopped)
    pub uptime_ms: u64,
    #[serde(skip)]
    started: Instant,
}

impl AgentRuntimeState {
    fn with_live_uptime(mut self) -> Self {
        if self.status == AgentStatus::Running {
            self.uptime_ms = self.started.elapsed().as_millis() as u64;
        }
        self
    }
}

/// Lifecycle settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    /// Active deployment profile; unknown names mean development
    #[serde(default, deserialize_with = "Profile::deserialize_lenient")]
    pub profile: Profile,
    /// Refuse agents that need external access
    #[serde(default)]
    pub safe_mode: bool,
}

/// Per-agent lifecycle registry
pub struct AgentLifecycle {
    config: LifecycleConfig,
    states: RwLock<HashMap<String, AgentRuntimeState>>,
    events: EventBus,
}

impl AgentLifecycle {
    /// Create an empty registry
    #[must_use]
    pub fn new(config: LifecycleConfig, events: EventBus) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Active profile
    #[must_use]
    pub fn profile(&self) -> Profile {
        self.config.profile
    }

    /// Whether safe mode is on
    #[must_use]
    pub fn safe_mode(&self) -> bool {
        self.config.safe_mode
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, AgentRuntimeState>> {
        self.states.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, AgentRuntimeState>> {
        self.states.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Start an agent
    ///
    /// # Errors
    /// Fails if the agent is already running, the active profile is not allowed, or
    /// safe mode is on and the agent has an external-access context.
    pub fn start(&self, agent: &AgentDefinition) -> Result<AgentRuntimeState, LifecycleError> {
        let profile = self.config.profile;
        let state = {
            let mut states = self.write();

            if states
                .get(&agent.id)
                .is_some_and(|s| s.status == AgentStatus::Running)
            {
                return Err(LifecycleError::AlreadyRunning(agent.id.clone()));
            }

            if !agent.allowed_profiles.contains(&profile) {
                return Err(LifecycleError::ProfileNotAllowed {
                    agent_id: agent.id.clone(),
                    profile,
                    allowed: agent
                        .allowed_profiles
                        .iter()
                        .map(Profile::as_str)
                        .collect::<Vec<_>>()
                        .join(", "),
                });
            }

            if self.config.safe_mode && agent.requires_external_access() {
                warn!(agent_id = %agent.id, "Start refused by safe mode");
                return Err(LifecycleError::SafeModeBlocked {
                    agent_id: agent.id.clone(),
                });
            }

            let state = AgentRuntimeState {
                agent_id: agent.id.clone(),
                status: AgentStatus::Running,
                started_at: Utc::now(),
                stopped_at: None,
                profile,
                uptime_ms: 0,
                started: Instant::now(),
            };
            states.insert(agent.id.clone(), state.clone());
            state
        };

        info!(
            agent_id = %agent.id,
            profile = %profile,
            contexts = ?agent.allowed_contexts,
            "Agent started"
        );
        self.events.publish(OrchestratorEvent::AgentStarted {
            agent_id: agent.id.clone(),
            profile: profile.to_string(),
        });

        Ok(state)
    }

    /// Stop a running agent
    ///
    /// # Errors
    /// Fails with [`LifecycleError::NotRunning`] if the agent is not running.
    pub fn stop(&self, agent_id: &str) -> Result<AgentRuntimeState, LifecycleError> {
        let state = {
            let mut states = self.write();
            let state = states
                .get_mut(agent_id)
                .filter(|s| s.status == AgentStatus::Running)
                .ok_or_else(|| LifecycleError::NotRunning(agent_id.to_string()))?;
            Self::mark_stopped(state);
            state.clone()
        };

        info!(agent_id = %agent_id, uptime_ms = state.uptime_ms, "Agent stopped");
        self.events.publish(OrchestratorEvent::AgentStopped {
            agent_id: agent_id.to_string(),
            uptime_ms: state.uptime_ms,
        });

        Ok(state)
    }

    fn mark_stopped(state: &mut AgentRuntimeState) {
        state.uptime_ms = state.started.elapsed().as_millis() as u64;
        state.status = AgentStatus::Stopped;
        state.stopped_at = Some(Utc::now());
    }

    /// State of one agent, if it has ever been started
    #[must_use]
    pub fn status(&self, agent_id: &str) -> Option<AgentRuntimeState> {
        self.read()
            .get(agent_id)
            .cloned()
            .map(AgentRuntimeState::with_live_uptime)
    }

    /// Whether the agent is running
    #[must_use]
    pub fn is_running(&self, agent_id: &str) -> bool {
        self.read()
            .get(agent_id)
            .is_some_and(|s| s.status == AgentStatus::Running)
    }

    /// Every tracked state sorted by agent id, with live uptime for running agents
    #[must_use]
    pub fn all_statuses(&self) -> Vec<AgentRuntimeState> {
        let mut states: Vec<_> = self
            .read()
            .values()
            .cloned()
            .map(AgentRuntimeState::with_live_uptime)
            .collect();
        states.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        states
    }

    /// Ids of running agents, sorted
    #[must_use]
    pub fn running_agents(&self) -> Vec<String> {
        let mut ids: Vec<_> = self
            .read()
            .values()
            .filter(|s| s.status == AgentStatus::Running)
            .map(|s| s.agent_id.clone())
            .collect();
        ids.sort();
        ids
    }

    /// Stop every running agent, keeping history. Returns the ids that were stopped.
    pub fn stop_all(&self) -> Vec<String> {
        let stopped: Vec<(String, u64)> = {
            let mut states = self.write();
            states
                .values_mut()
                .filter(|s| s.status == AgentStatus::Running)
                .map(|s| {
                    Self::mark_stopped(s);
                    (s.agent_id.clone(), s.uptime_ms)
                })
                .collect()
        };

        warn!(count = stopped.len(), "Emergency stop of all agents");
        for (agent_id, uptime_ms) in &stopped {
            self.events.publish(OrchestratorEvent::AgentStopped {
                agent_id: agent_id.clone(),
                uptime_ms: *uptime_ms,
            });
        }

        let mut ids: Vec<_> = stopped.into_iter().map(|(id, _)| id).collect();
        ids.sort();
        ids
    }

    /// Forget every tracked state. Returns how many were cleared.
    pub fn reset_all(&self) -> usize {
        let mut states = self.write();
        let count = states.len();
        states.clear();
        warn!(count, "All agent states reset");
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::definition::AgentContext;
    use std::time::Duration;

    fn lifecycle(profile: Profile, safe_mode: bool) -> AgentLifecycle {
        AgentLifecycle::new(LifecycleConfig { profile, safe_mode }, EventBus::default())
    }

    fn agent(id: &str) -> AgentDefinition {
        AgentDefinition::new(id, id, "test").with_profiles([
            Profile::Development,
            Profile::Staging,
            Profile::Production,
        ])
    }

    #[test]
    fn test_start_and_double_start() {
        let lc = lifecycle(Profile::Development, false);
        let a = agent("code-review-agent");

        let state = lc.start(&a).unwrap();
        assert_eq!(state.status, AgentStatus::Running);
        assert_eq!(state.profile, Profile::Development);
        let started_at = state.started_at;

        let err = lc.start(&a).unwrap_err();
        assert_eq!(err, LifecycleError::AlreadyRunning("code-review-agent".into()));
        assert_eq!(err.to_string(), "Agent code-review-agent is already running");

        // Unchanged by the rejected start
        let after = lc.status("code-review-agent").unwrap();
        assert_eq!(after.status, AgentStatus::Running);
        assert_eq!(after.started_at, started_at);
    }

    #[test]
    fn test_profile_gate() {
        let a = AgentDefinition::new("a", "A", "r").with_profiles([Profile::Development]);
        for profile in [Profile::Staging, Profile::Production] {
            let lc = lifecycle(profile, false);
            let err = lc.start(&a).unwrap_err();
            assert!(matches!(err, LifecycleError::ProfileNotAllowed { .. }));
            assert!(err.to_string().contains("Allowed profiles: development"));
            assert!(!lc.is_running("a"));
            assert!(lc.status("a").is_none());
        }
        assert!(lifecycle(Profile::Development, false).start(&a).is_ok());
    }

    #[test]
    fn test_safe_mode_gate() {
        let lc = lifecycle(Profile::Development, true);
        for ctx in [
            AgentContext::Github,
            AgentContext::Ci,
            AgentContext::System,
            AgentContext::Security,
        ] {
            let a = agent("ext").with_context(AgentContext::Chat).with_context(ctx);
            assert_eq!(
                lc.start(&a).unwrap_err(),
                LifecycleError::SafeModeBlocked {
                    agent_id: "ext".into()
                }
            );
        }

        let chat = agent("chat").with_context(AgentContext::Chat).with_context(AgentContext::Api);
        assert!(lc.start(&chat).is_ok());

        let unrestricted = lifecycle(Profile::Development, false);
        let gh = agent("gh").with_context(AgentContext::Github);
        assert!(unrestricted.start(&gh).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_records_uptime() {
        let lc = lifecycle(Profile::Development, false);
        lc.start(&agent("a")).unwrap();

        tokio::time::advance(Duration::from_millis(1500)).await;
        assert_eq!(lc.status("a").unwrap().uptime_ms, 1500);

        let stopped = lc.stop("a").unwrap();
        assert_eq!(stopped.status, AgentStatus::Stopped);
        assert_eq!(stopped.uptime_ms, 1500);
        assert!(stopped.stopped_at.is_some());

        tokio::time::advance(Duration::from_secs(10)).await;
        assert_eq!(lc.status("a").unwrap().uptime_ms, 1500);

        assert_eq!(
            lc.stop("a").unwrap_err(),
            LifecycleError::NotRunning("a".into())
        );
        assert!(lc.stop("never-started").is_err());

        // Restart after stop is allowed
        assert!(lc.start(&agent("a")).is_ok());
    }

    #[test]
    fn test_stop_all_and_reset_all() {
        let lc = lifecycle(Profile::Development, false);
        lc.start(&agent("b")).unwrap();
        lc.start(&agent("a")).unwrap();
        lc.start(&agent("c")).unwrap();
        lc.stop("c").unwrap();

        assert_eq!(lc.running_agents(), vec!["a", "b"]);
        assert_eq!(lc.stop_all(), vec!["a", "b"]);
        assert!(lc.running_agents().is_empty());
        assert_eq!(lc.all_statuses().len(), 3);

        assert_eq!(lc.reset_all(), 3);
        assert!(lc.all_statuses().is_empty());
    }

    #[tokio::test]
    async fn test_events_published() {
        let events = EventBus::default();
        let mut rx = events.subscribe();
        let lc = AgentLifecycle::new(LifecycleConfig::default(), events);

        lc.start(&agent("a")).unwrap();
        lc.stop("a").unwrap();

        assert_eq!(rx.recv().await.unwrap().kind(), "agent_started");
        assert_eq!(rx.recv().await.unwrap().kind(), "agent_stopped");
    }
}
