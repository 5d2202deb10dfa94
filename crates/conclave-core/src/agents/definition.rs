//! Agent definitions
//!
//! An [`AgentDefinition`] is immutable for the lifetime of the process. It names the
//! agent's role, its preferred provider, the actions it may perform and where and
//! under which profiles it may run.

use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Risk classification of an agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only or advisory
    #[default]
    Low,
    /// Writes to non-critical resources
    Medium,
    /// Writes to shared resources
    High,
    /// Can affect production systems
    Critical,
}

/// Where an agent may be invoked from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentContext {
    /// Interactive chat
    Chat,
    /// Programmatic API
    Api,
    /// Continuous integration
    Ci,
    /// Mobile clients
    Mobile,
    /// GitHub webhooks and repository access
    Github,
    /// Host system access
    System,
    /// Security tooling
    Security,
}

impl AgentContext {
    /// Contexts that reach outside the process and are refused in safe mode
    #[must_use]
    pub fn requires_external_access(&self) -> bool {
        matches!(self, Self::Github | Self::Ci | Self::System | Self::Security)
    }
}

/// Deployment profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    /// Local development
    #[default]
    Development,
    /// Pre-production
    Staging,
    /// Production
    Production,
}

impl Profile {
    /// Parse a profile name, treating anything unrecognised as development
    #[must_use]
    pub fn from_env_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to the development profile");
            Self::default()
        })
    }

    /// Deserialize through [`from_env_name`](Self::from_env_name), for settings
    /// where an unknown name must not fail the whole load
    ///
    /// # Errors
    /// Only when the value is not a string.
    pub fn deserialize_lenient<'de, D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let name = String::deserialize(deserializer)?;
        Ok(Self::from_env_name(&name))
    }

    /// Lowercase profile name
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Staging => "staging",
            Self::Production => "production",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Profile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "staging" => Ok(Self::Staging),
            "production" | "prod" => Ok(Self::Production),
            other => Err(format!("unknown profile: {other}")),
        }
    }
}

fn default_model_provider() -> String {
    "openai".to_string()
}

fn default_model_key() -> String {
    "default".to_string()
}

fn default_allowed_profiles() -> BTreeSet<Profile> {
    BTreeSet::from([Profile::Development])
}

/// A configured agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentDefinition {
    /// Unique id across the catalog
    pub id: String,
    /// Display name
    pub name: String,
    /// One-line role description used in prompts
    pub role: String,
    /// Preferred provider name
    #[serde(default = "default_model_provider")]
    pub model_provider: String,
    /// Which of the preferred provider's keys to use
    #[serde(default = "default_model_key")]
    pub model_key: String,
    /// Model for the preferred provider (fallbacks use their default)
    #[serde(default)]
    pub model_name: Option<String>,
    /// Actions this agent may perform
    #[serde(default)]
    pub actions: BTreeSet<String>,
    /// Risk classification
    #[serde(default)]
    pub risk: RiskLevel,
    /// Contexts the agent may be invoked from
    #[serde(default)]
    pub allowed_contexts: BTreeSet<AgentContext>,
    /// Profiles the agent may be started under
    #[serde(default = "default_allowed_profiles")]
    pub allowed_profiles: BTreeSet<Profile>,
    /// Whether a human must approve its actions
    #[serde(default)]
    pub approval_required: bool,
    /// Extra instructions appended to the default system prompt
    #[serde(default)]
    pub instructions: Option<String>,
    /// System prompt template (`{{ dotted.path }}` placeholders)
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// User prompt template (`{{ dotted.path }}` placeholders)
    #[serde(default)]
    pub user_prompt: Option<String>,
}

impl AgentDefinition {
    /// Minimal definition with defaults for everything but id, name and role
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, role: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            role: role.into(),
            model_provider: default_model_provider(),
            model_key: default_model_key(),
            model_name: None,
            actions: BTreeSet::new(),
            risk: RiskLevel::default(),
            allowed_contexts: BTreeSet::new(),
            allowed_profiles: default_allowed_profiles(),
            approval_required: false,
            instructions: None,
            system_prompt: None,
            user_prompt: None,
        }
    }

    /// Set the preferred provider and key name
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>, key: impl Into<String>) -> Self {
        self.model_provider = provider.into();
        self.model_key = key.into();
        self
    }

    /// Allow an action
    #[must_use]
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.actions.insert(action.into());
        self
    }

    /// Allow a context
    #[must_use]
    pub fn with_context(mut self, context: AgentContext) -> Self {
        self.allowed_contexts.insert(context);
        self
    }

    /// Replace the allowed profiles
    #[must_use]
    pub fn with_profiles(mut self, profiles: impl IntoIterator<Item = Profile>) -> Self {
        self.allowed_profiles = profiles.into_iter().collect();
        self
    }

    /// Whether any allowed context needs external access
    #[must_use]
    pub fn requires_external_access(&self) -> bool {
        self.allowed_contexts
            .iter()
            .any(AgentContext::requires_external_access)
    }
}
