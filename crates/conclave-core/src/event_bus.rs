//! EventBus - broadcast-based event system for orchestration and lifecycle events.
//!
//! Audit and notification sinks subscribe here. Delivery is at-most-once and
//! publishing never fails the caller.

use serde::Serialize;
use tokio::sync::broadcast;

/// Events emitted by the lifecycle machine, the orchestrator and the provider layer.
///
/// Events carry ids and outcomes only, never payloads or provider keys.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// An agent entered the running state
    AgentStarted {
        /// Agent id
        agent_id: String,
        /// Deployment profile it was started under
        profile: String,
    },
    /// An agent was stopped
    AgentStopped {
        /// Agent id
        agent_id: String,
        /// How long it had been running
        uptime_ms: u64,
    },
    /// An agent's per-job state changed
    AgentStateChanged {
        /// Agent id
        agent_id: String,
        /// Job id
        job_id: String,
        /// New job status (running, completed, failed)
        status: String,
    },
    /// A job finished and produced a decision
    JobCompleted {
        /// Job id
        job_id: String,
        /// Triggering event name
        event: String,
        /// Decision action
        decision: String,
    },
    /// A job failed before producing any agent result
    JobFailed {
        /// Job id
        job_id: String,
        /// Triggering event name
        event: String,
        /// Error description
        error: String,
    },
    /// A provider's circuit breaker opened
    BreakerOpened {
        /// Provider name
        provider: String,
        /// Consecutive failures at the time it opened
        failures: u32,
    },
}

impl OrchestratorEvent {
    /// Snake-case event name, matching the serialized `type` tag.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::AgentStarted { .. } => "agent_started",
            Self::AgentStopped { .. } => "agent_stopped",
            Self::AgentStateChanged { .. } => "agent_state_changed",
            Self::JobCompleted { .. } => "job_completed",
            Self::JobFailed { .. } => "job_failed",
            Self::BreakerOpened { .. } => "breaker_opened",
        }
    }
}

/// Broadcast-based event bus.
///
/// Uses `tokio::broadcast` so multiple subscribers can receive the same events.
/// Slow subscribers will miss events (lagged) rather than blocking the publisher.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<OrchestratorEvent>,
}

impl EventBus {
    /// Create a new EventBus with the given channel capacity.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events. Returns a receiver that will get all future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.sender.subscribe()
    }

    /// Publish an event to all active subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    /// If there are no subscribers, the event is silently dropped.
    pub fn publish(&self, event: OrchestratorEvent) -> usize {
        // send() returns Err if there are no receivers, which is fine
        self.sender.send(event).unwrap_or(0)
    }

    /// Get the current number of active subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
