//! Circuit Breaker pattern implementation
//!
//! Provides fault tolerance by failing fast against a resource that keeps failing.
//! The circuit breaker has three states:
//! - Closed: Normal operation, requests pass through
//! - Open: Failures reached the threshold, requests are rejected without being run
//! - HalfOpen: Reset timeout elapsed, a single trial request decides the next state

use dashmap::DashMap;
use serde::Serialize;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Normal operation - requests pass through
    Closed,
    /// Failures reached threshold - requests are rejected
    Open,
    /// Testing recovery - one trial request passes through
    HalfOpen,
}

impl CircuitState {
    /// Whether calls are currently being rejected outright
    #[must_use]
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Open)
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half-open"),
        }
    }
}

/// Configuration for circuit breaker
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Duration to wait before transitioning from open to half-open
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(30),
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a new configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure threshold
    #[must_use]
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    /// Set reset timeout
    #[must_use]
    pub fn with_reset_timeout(mut self, timeout: Duration) -> Self {
        self.reset_timeout = timeout;
        self
    }
}

/// Error returned by [`CircuitBreaker::execute`]
#[derive(Debug, Error)]
pub enum CircuitError<E> {
    /// The breaker rejected the call without running it
    #[error("circuit breaker '{name}' is open")]
    Open {
        /// Breaker name
        name: String,
    },
    /// The operation ran and failed
    #[error("{0}")]
    Operation(E),
    /// The operation ran and failed, and that failure opened the breaker
    #[error("{0}")]
    Tripped(E),
}

impl<E> CircuitError<E> {
    /// Whether this call moved the breaker to open
    #[must_use]
    pub fn tripped(&self) -> bool {
        matches!(self, Self::Tripped(_))
    }
}

/// Point-in-time view of a breaker, for status endpoints and logs
#[derive(Debug, Clone, Serialize)]
pub struct CircuitSnapshot {
    /// Breaker name
    pub name: String,
    /// Current state
    pub state: CircuitState,
    /// Consecutive failures counted in the closed state
    pub consecutive_failures: u32,
    /// Milliseconds since the breaker last opened, if it is not closed
    pub open_for_ms: Option<u64>,
    /// Calls that went through `execute`
    pub total: u64,
    /// Successful calls
    pub successes: u64,
    /// Failed calls
    pub failures: u64,
    /// Calls rejected while open
    pub rejections: u64,
}

#[derive(Debug)]
struct Inner {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
    total: u64,
    successes: u64,
    failures: u64,
    rejections: u64,
}

enum Permit {
    Normal,
    Trial,
}

/// Clears the half-open trial flag if the trial future is dropped before finishing.
struct TrialGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.lock().trial_in_flight = false;
        }
    }
}

/// Circuit breaker for fault tolerance
///
/// State lives behind a plain mutex that is only held for bookkeeping, never
/// across the wrapped operation's await point.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    /// Create a new circuit breaker
    #[must_use]
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                consecutive_failures: 0,
                opened_at: None,
                trial_in_flight: false,
                total: 0,
                successes: 0,
                failures: 0,
                rejections: 0,
            }),
        }
    }

    /// Create with default configuration
    #[must_use]
    pub fn with_defaults(name: impl Into<String>) -> Self {
        Self::new(name, CircuitBreakerConfig::default())
    }

    /// Get the circuit breaker name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the current state
    ///
    /// An open breaker whose reset timeout has elapsed still reports `Open`
    /// until the next call moves it to half-open.
    #[must_use]
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Get current consecutive failure count
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().consecutive_failures
    }

    /// Run `operation` under the breaker's policy.
    ///
    /// # Errors
    /// Returns [`CircuitError::Open`] without running the operation while the
    /// breaker is open, [`CircuitError::Tripped`] when the operation fails and
    /// opens the breaker, or [`CircuitError::Operation`] for any other failure.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire()?;
        let mut guard = TrialGuard {
            breaker: self,
            armed: matches!(permit, Permit::Trial),
        };

        let result = operation().await;
        guard.armed = false;

        match result {
            Ok(value) => {
                self.on_success();
                Ok(value)
            }
            Err(e) => {
                if self.on_failure() {
                    Err(CircuitError::Tripped(e))
                } else {
                    Err(CircuitError::Operation(e))
                }
            }
        }
    }

    /// Force the breaker closed and clear its failure count
    pub fn reset(&self) {
        let mut inner = self.lock();
        if inner.state != CircuitState::Closed {
            info!(name = %self.name, "Circuit breaker reset");
        }
        inner.state = CircuitState::Closed;
        inner.consecutive_failures = 0;
        inner.opened_at = None;
        inner.trial_in_flight = false;
    }

    /// Snapshot counters and state
    #[must_use]
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        CircuitSnapshot {
            name: self.name.clone(),
            state: inner.state,
            consecutive_failures: inner.consecutive_failures,
            open_for_ms: inner
                .opened_at
                .map(|at| at.elapsed().as_millis() as u64),
            total: inner.total,
            successes: inner.successes,
            failures: inner.failures,
            rejections: inner.rejections,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn acquire<E>(&self) -> Result<Permit, CircuitError<E>> {
        let mut inner = self.lock();
        inner.total += 1;

        match inner.state {
            CircuitState::Closed => Ok(Permit::Normal),
            CircuitState::Open => {
                let elapsed = inner
                    .opened_at
                    .map(|at| at.elapsed())
                    .unwrap_or(Duration::ZERO);
                if elapsed >= self.config.reset_timeout {
                    info!(name = %self.name, "Circuit breaker entering half-open state");
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    Ok(Permit::Trial)
                } else {
                    inner.rejections += 1;
                    debug!(name = %self.name, "Circuit breaker open, rejecting call");
                    Err(CircuitError::Open {
                        name: self.name.clone(),
                    })
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    inner.rejections += 1;
                    debug!(name = %self.name, "Half-open trial in flight, rejecting call");
                    Err(CircuitError::Open {
                        name: self.name.clone(),
                    })
                } else {
                    inner.trial_in_flight = true;
                    Ok(Permit::Trial)
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.lock();
        inner.successes += 1;
        inner.consecutive_failures = 0;

        if inner.state == CircuitState::HalfOpen {
            info!(name = %self.name, "Circuit breaker closed");
            inner.state = CircuitState::Closed;
            inner.opened_at = None;
            inner.trial_in_flight = false;
        }
    }

    /// Record a failure. Returns true when it opened the breaker.
    fn on_failure(&self) -> bool {
        let mut inner = self.lock();
        inner.failures += 1;

        match inner.state {
            CircuitState::Closed => {
                inner.consecutive_failures += 1;
                debug!(
                    name = %self.name,
                    failures = inner.consecutive_failures,
                    threshold = self.config.failure_threshold,
                    "Circuit breaker failure recorded"
                );
                if inner.consecutive_failures >= self.config.failure_threshold {
                    warn!(
                        name = %self.name,
                        failures = inner.consecutive_failures,
                        "Circuit breaker opened"
                    );
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(Instant::now());
                    return true;
                }
                false
            }
            CircuitState::HalfOpen => {
                warn!(
                    name = %self.name,
                    "Circuit breaker failure in half-open state, reopening"
                );
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
                inner.trial_in_flight = false;
                true
            }
            // A call admitted before the breaker opened; already open
            CircuitState::Open => false,
        }
    }
}

/// One shared breaker per named resource
///
/// Owned by whoever wires the engine and injected where needed.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl CircuitBreakerRegistry {
    /// Create a registry whose breakers all use `config`
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            breakers: DashMap::new(),
        }
    }

    /// Get the breaker for `name`, creating it on first use
    #[must_use]
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }
        Arc::clone(
            self.breakers
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(CircuitBreaker::new(name, self.config.clone())))
                .value(),
        )
    }

    /// Snapshot every breaker, sorted by name
    #[must_use]
    pub fn snapshots(&self) -> Vec<CircuitSnapshot> {
        let mut snapshots: Vec<_> = self
            .breakers
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Force every breaker closed
    pub fn reset_all(&self) {
        for entry in self.breakers.iter() {
            entry.value().reset();
        }
    }
}

impl Default for CircuitBreakerRegistry {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
