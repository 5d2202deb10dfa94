//! Agent catalog
//!
//! [`AgentSource`] is the seam the orchestrator reads agents through. It is consulted
//! on every run. [`AgentCatalog`] is the in-memory view and [`TomlAgentLoader`] reads
//! one agent per `*.toml` file from `config/agents/`.

use super::definition::AgentDefinition;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Default agent configuration directory
pub const DEFAULT_AGENTS_DIR: &str = "config/agents";

/// Where agent definitions come from
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait AgentSource: Send + Sync {
    /// Every known agent
    ///
    /// # Errors
    /// Returns a configuration error if the catalog cannot be read.
    async fn list_agents(&self) -> Result<Vec<AgentDefinition>>;
}

/// Read-only in-memory catalog with unique ids
#[derive(Debug, Clone, Default)]
pub struct AgentCatalog {
    agents: Vec<AgentDefinition>,
    index: HashMap<String, usize>,
}

impl AgentCatalog {
    /// Build a catalog, rejecting empty or duplicate ids
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] on an empty or duplicated id.
    pub fn new(agents: Vec<AgentDefinition>) -> Result<Self> {
        let mut index = HashMap::with_capacity(agents.len());
        for (i, agent) in agents.iter().enumerate() {
            if agent.id.trim().is_empty() {
                return Err(Error::Configuration(format!(
                    "agent '{}' has an empty id",
                    agent.name
                )));
            }
            if index.insert(agent.id.clone(), i).is_some() {
                return Err(Error::Configuration(format!(
                    "duplicate agent id: {}",
                    agent.id
                )));
            }
        }
        Ok(Self { agents, index })
    }

    /// Look up an agent by id
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&AgentDefinition> {
        self.index.get(id).map(|&i| &self.agents[i])
    }

    /// All agents, in load order
    #[must_use]
    pub fn agents(&self) -> &[AgentDefinition] {
        &self.agents
    }

    /// Number of agents
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[async_trait::async_trait]
impl AgentSource for AgentCatalog {
    async fn list_agents(&self) -> Result<Vec<AgentDefinition>> {
        Ok(self.agents.clone())
    }
}

/// Agent TOML Loader
#[derive(Debug, Clone)]
pub struct TomlAgentLoader {
    config_dir: PathBuf,
}

impl Default for TomlAgentLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl TomlAgentLoader {
    /// Create loader with default path (`config/agents/`)
    #[must_use]
    pub fn new() -> Self {
        Self {
            config_dir: PathBuf::from(DEFAULT_AGENTS_DIR),
        }
    }

    /// Create loader with custom path
    #[must_use]
    pub fn with_path(path: impl AsRef<Path>) -> Self {
        Self {
            config_dir: path.as_ref().to_path_buf(),
        }
    }

    /// Return configuration directory path
    #[must_use]
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Load every agent file into a catalog
    ///
    /// A missing directory yields an empty catalog.
    ///
    /// # Errors
    /// - Directory read failure
    /// - Any file that fails to parse (unlike optional presets, a broken agent is fatal)
    /// - Duplicate ids across files
    pub fn load_catalog(&self) -> Result<AgentCatalog> {
        if !self.config_dir.exists() {
            warn!("Agents directory not found: {:?}", self.config_dir);
            return Ok(AgentCatalog::default());
        }

        let entries = std::fs::read_dir(&self.config_dir).map_err(|e| {
            Error::Configuration(format!(
                "Failed to read agents directory {:?}: {}",
                self.config_dir, e
            ))
        })?;

        let mut paths: Vec<PathBuf> = entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| Self::is_toml_file(path))
            .collect();
        paths.sort();

        let mut agents = Vec::with_capacity(paths.len());
        for path in &paths {
            let agent = self.load_file(path)?;
            debug!(agent_id = %agent.id, "Loaded agent from {:?}", path);
            agents.push(agent);
        }

        let catalog = AgentCatalog::new(agents)?;
        info!(
            "Loaded {} agents from {:?}",
            catalog.len(),
            self.config_dir
        );
        Ok(catalog)
    }

    fn load_file(&self, path: &Path) -> Result<AgentDefinition> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Configuration(format!("Failed to read {:?}: {}", path, e)))?;

        let agent: AgentDefinition = toml::from_str(&content)
            .map_err(|e| Error::Configuration(format!("Failed to parse {:?}: {}", path, e)))?;

        if agent.id.trim().is_empty() {
            return Err(Error::Configuration(format!(
                "Agent file missing id: {:?}",
                path
            )));
        }

        Ok(agent)
    }

    fn is_toml_file(path: &Path) -> bool {
        path.is_file() && path.extension().is_some_and(|ext| ext == "toml")
    }
}

#[async_trait::async_trait]
impl AgentSource for TomlAgentLoader {
    async fn list_agents(&self) -> Result<Vec<AgentDefinition>> {
        Ok(self.load_catalog()?.agents)
    }
}
