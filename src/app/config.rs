//! Application configuration types
//!
//! One struct per `config/default.toml` section. Every field has a default so a
//! partial override file is always enough.

use conclave_core::agents::{EventStrategy, DEFAULT_AGENTS_DIR, DEFAULT_KNOWLEDGE_DIR};
use conclave_core::{CircuitBreakerConfig, JobStoreConfig, LifecycleConfig, ProviderExecutorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub circuit_breaker: CircuitBreakerAppConfig,
    #[serde(default)]
    pub jobs: JobsConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorAppConfig,
    /// Event strategy overrides keyed by event name
    #[serde(default)]
    pub events: BTreeMap<String, EventStrategy>,
}

/// Provider execution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_max_tokens() -> u32 {
    conclave_llm::DEFAULT_MAX_TOKENS
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl ProvidersConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.max(1))
    }

    pub fn executor_config(&self) -> ProviderExecutorConfig {
        ProviderExecutorConfig {
            timeout: self.timeout(),
            max_tokens: self.max_tokens,
        }
    }
}

/// Circuit breaker settings (shared by every provider)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerAppConfig {
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

fn default_failure_threshold() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

impl Default for CircuitBreakerAppConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

impl CircuitBreakerAppConfig {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig::new()
            .with_failure_threshold(self.failure_threshold)
            .with_reset_timeout(Duration::from_secs(self.reset_timeout_secs))
    }
}

/// Job state store settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    #[serde(default = "default_max_entries")]
    pub max_entries: usize,
    #[serde(default = "default_grace_secs")]
    pub grace_secs: u64,
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

fn default_ttl_secs() -> u64 {
    3600
}

fn default_max_entries() -> usize {
    1000
}

fn default_grace_secs() -> u64 {
    60
}

fn default_sweep_interval_secs() -> u64 {
    300
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            max_entries: default_max_entries(),
            grace_secs: default_grace_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
        }
    }
}

impl JobsConfig {
    pub fn to_store_config(&self) -> JobStoreConfig {
        JobStoreConfig {
            ttl: Duration::from_secs(self.ttl_secs),
            max_entries: self.max_entries.max(1),
            grace: Duration::from_secs(self.grace_secs),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

/// Orchestrator settings (exposed to TOML)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestratorAppConfig {
    #[serde(default = "default_agents_dir")]
    pub agents_dir: String,
    #[serde(default = "default_knowledge_dir")]
    pub knowledge_dir: String,
    #[serde(default)]
    pub require_running: bool,
}

fn default_agents_dir() -> String {
    DEFAULT_AGENTS_DIR.to_string()
}

fn default_knowledge_dir() -> String {
    DEFAULT_KNOWLEDGE_DIR.to_string()
}

impl Default for OrchestratorAppConfig {
    fn default() -> Self {
        Self {
            agents_dir: default_agents_dir(),
            knowledge_dir: default_knowledge_dir(),
            require_running: false,
        }
    }
}
