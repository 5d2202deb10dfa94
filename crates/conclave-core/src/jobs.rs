//! Job/agent state store
//!
//! Short-lived record of each agent invocation within a job, keyed by
//! `agentId_jobId`. Entries expire after a TTL, are purged per job after a grace
//! period, and the store never holds more than `max_entries` (oldest evicted first).
//!
//! Jobs that are in flight or waiting for their grace timer are *pinned*: the TTL
//! sweep skips them, though the size cap still applies.

use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Status of one agent within one job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Agent is executing
    Running,
    /// Agent returned a result
    Completed,
    /// Agent failed
    Failed,
}

impl JobStatus {
    /// Lowercase name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

/// One agent's state within one job
#[derive(Debug, Clone, Serialize)]
pub struct JobState {
    /// Agent id
    pub agent_id: String,
    /// Job id
    pub job_id: String,
    /// Status
    pub status: JobStatus,
    /// Output on completion
    pub result: Option<String>,
    /// Error on failure
    pub error: Option<String>,
    /// Last update (wall clock)
    pub timestamp: DateTime<Utc>,
    #[serde(skip)]
    updated: Instant,
    #[serde(skip)]
    seq: u64,
}

/// Store settings
#[derive(Debug, Clone)]
pub struct JobStoreConfig {
    /// Age after which an unpinned entry is swept
    pub ttl: Duration,
    /// Hard cap on entries
    pub max_entries: usize,
    /// Delay between a job finishing and its entries being purged
    pub grace: Duration,
}

impl Default for JobStoreConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60 * 60),
            max_entries: 1000,
            grace: Duration::from_secs(60),
        }
    }
}

/// Concurrent TTL store of [`JobState`]s
pub struct JobStateStore {
    config: JobStoreConfig,
    entries: DashMap<String, JobState>,
    pinned: DashSet<String>,
    seq: AtomicU64,
}

fn key(agent_id: &str, job_id: &str) -> String {
    format!("{agent_id}_{job_id}")
}

impl JobStateStore {
    /// Create an empty store
    #[must_use]
    pub fn new(config: JobStoreConfig) -> Self {
        Self {
            config,
            entries: DashMap::new(),
            pinned: DashSet::new(),
            seq: AtomicU64::new(0),
        }
    }

    /// Store settings
    #[must_use]
    pub fn config(&self) -> &JobStoreConfig {
        &self.config
    }

    /// Insert or replace the state of `agent_id` within `job_id`
    pub fn record(
        &self,
        agent_id: &str,
        job_id: &str,
        status: JobStatus,
        result: Option<String>,
        error: Option<String>,
    ) {
        let state = JobState {
            agent_id: agent_id.to_string(),
            job_id: job_id.to_string(),
            status,
            result,
            error,
            timestamp: Utc::now(),
            updated: Instant::now(),
            seq: self.seq.fetch_add(1, Ordering::Relaxed),
        };
        self.entries.insert(key(agent_id, job_id), state);
        self.enforce_cap();
    }

    fn enforce_cap(&self) {
        while self.entries.len() > self.config.max_entries {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|entry| entry.value().seq)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(k) => {
                    debug!(key = %k, "Evicting oldest job state");
                    self.entries.remove(&k);
                }
                None => break,
            }
        }
    }

    /// State of one agent within one job
    #[must_use]
    pub fn get(&self, agent_id: &str, job_id: &str) -> Option<JobState> {
        self.entries
            .get(&key(agent_id, job_id))
            .map(|entry| entry.value().clone())
    }

    /// Every entry of one job
    #[must_use]
    pub fn job_entries(&self, job_id: &str) -> Vec<JobState> {
        let mut states: Vec<_> = self
            .entries
            .iter()
            .filter(|entry| entry.value().job_id == job_id)
            .map(|entry| entry.value().clone())
            .collect();
        states.sort_by_key(|s| s.seq);
        states
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pin a job for as long as the returned guard lives
    ///
    /// Dropping the guard (for example when the owning future is cancelled)
    /// unpins the job so its entries age out normally. Call
    /// [`JobPin::finish`] to hand the job over to the grace cleanup instead.
    #[must_use = "the job is unpinned as soon as the guard is dropped"]
    pub fn pin_guard(self: &Arc<Self>, job_id: &str) -> JobPin {
        self.pin(job_id);
        JobPin {
            store: Arc::clone(self),
            job_id: job_id.to_string(),
            armed: true,
        }
    }

    /// Protect a job's entries from the TTL sweep
    pub fn pin(&self, job_id: &str) {
        self.pinned.insert(job_id.to_string());
    }

    /// Remove a job's sweep protection
    pub fn unpin(&self, job_id: &str) {
        self.pinned.remove(job_id);
    }

    /// Whether a job is pinned
    #[must_use]
    pub fn is_pinned(&self, job_id: &str) -> bool {
        self.pinned.contains(job_id)
    }

    /// Remove every entry of a job and unpin it. Returns how many entries went.
    pub fn remove_job(&self, job_id: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, state| state.job_id != job_id);
        self.unpin(job_id);
        before.saturating_sub(self.entries.len())
    }

    /// Remove unpinned entries older than the TTL. Returns how many were removed.
    pub fn sweep(&self) -> usize {
        let ttl = self.config.ttl;
        let before = self.entries.len();
        self.entries.retain(|_, state| {
            state.updated.elapsed() < ttl || self.pinned.contains(&state.job_id)
        });
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Swept expired job states");
        }
        removed
    }

    /// Purge a job's entries once the grace period elapses
    pub fn schedule_job_cleanup(self: &Arc<Self>, job_id: &str) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let job_id = job_id.to_string();
        let deadline = Instant::now() + self.config.grace;
        self.pin(&job_id);

        tokio::spawn(async move {
            tokio::time::sleep_until(deadline).await;
            let removed = store.remove_job(&job_id);
            debug!(job_id = %job_id, removed, "Job states purged after grace period");
        })
    }

    /// Run [`sweep`](Self::sweep) every `interval` until `shutdown` is cancelled
    pub fn spawn_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Job state sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        store.sweep();
                    }
                }
            }
        })
    }
}

/// Keeps a job pinned while an orchestration is in flight
pub struct JobPin {
    store: Arc<JobStateStore>,
    job_id: String,
    armed: bool,
}

impl JobPin {
    /// Job being protected
    #[must_use]
    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    /// The job finished: keep it pinned until the grace cleanup purges it
    pub fn finish(mut self) -> JoinHandle<()> {
        self.armed = false;
        self.store.schedule_job_cleanup(&self.job_id)
    }
}

impl Drop for JobPin {
    fn drop(&mut self) {
        if self.armed {
            debug!(job_id = %self.job_id, "Job abandoned before completion, unpinning");
            self.store.unpin(&self.job_id);
        }
    }
}

impl Default for JobStateStore {
    fn default() -> Self {
        Self::new(JobStoreConfig::default())
    }
}
