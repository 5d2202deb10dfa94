//! Provider credentials
//!
//! Holds the candidate API keys per provider and key name, and builds the ordered,
//! deduplicated provider lists handed to the execution layer. Only keys that pass
//! [`has_usable_api_key`] ever make it into a list.

use crate::agents::AgentDefinition;
use conclave_llm::util::{has_usable_api_key, mask_api_key, sanitize_api_key};
use conclave_llm::ProviderKind;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use tracing::warn;

/// Name of the key used when an agent does not ask for a specific one
pub const DEFAULT_KEY_NAME: &str = "default";

/// One entry of a provider list: which vendor, with which key
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderSpec {
    /// Vendor
    pub kind: ProviderKind,
    /// API key
    pub api_key: String,
    /// Model override; only set for an agent's preferred provider
    pub model: Option<String>,
}

// SECURITY: Custom Debug implementation to mask API key
impl fmt::Debug for ProviderSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSpec")
            .field("kind", &self.kind)
            .field("api_key", &mask_api_key(&self.api_key))
            .field("model", &self.model)
            .finish()
    }
}

/// Candidate keys per provider, by key name
#[derive(Default, Clone)]
pub struct ProviderCredentials {
    keys: HashMap<ProviderKind, BTreeMap<String, String>>,
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (kind, keys) in &self.keys {
            let masked: BTreeMap<_, _> = keys
                .iter()
                .map(|(name, key)| (name.as_str(), mask_api_key(key)))
                .collect();
            map.entry(kind, &masked);
        }
        map.finish()
    }
}

impl ProviderCredentials {
    /// Empty credential set
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a key. Whitespace is stripped; unusable keys are kept but never returned.
    #[must_use]
    pub fn with_key(
        mut self,
        kind: ProviderKind,
        name: impl Into<String>,
        key: impl AsRef<str>,
    ) -> Self {
        self.insert(kind, name, key.as_ref());
        self
    }

    fn insert(&mut self, kind: ProviderKind, name: impl Into<String>, key: &str) {
        self.keys
            .entry(kind)
            .or_default()
            .insert(name.into(), sanitize_api_key(key));
    }

    /// Read keys from the process environment
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Read keys through `lookup`, which maps an environment variable name to its value
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut creds = Self::new();
        let usable = |var: &str| lookup(var).filter(|v| has_usable_api_key(v));

        for (name, var) in [
            ("bsm", "OPENAI_BSM_KEY"),
            ("bsu", "OPENAI_BSU_KEY"),
            ("brinder", "OPENAI_BRINDER_KEY"),
            ("lexnexus", "OPENAI_LEXNEXUS_KEY"),
        ] {
            if let Some(key) = lookup(var) {
                creds.insert(ProviderKind::OpenAi, name, &key);
            }
        }

        let first_usable = |vars: &[&str]| vars.iter().find_map(|var| usable(*var));

        if let Some(key) = first_usable(&["OPENAI_BSM_KEY", "OPENAI_BSU_KEY", "OPENAI_API_KEY"]) {
            creds.insert(ProviderKind::OpenAi, DEFAULT_KEY_NAME, &key);
        }
        if let Some(key) = first_usable(&["ANTHROPIC_API_KEY", "ANTHROPIC_KEY"]) {
            creds.insert(ProviderKind::Anthropic, DEFAULT_KEY_NAME, &key);
        }
        if let Some(key) = first_usable(&["PERPLEXITY_KEY"]) {
            creds.insert(ProviderKind::Perplexity, DEFAULT_KEY_NAME, &key);
        }
        if let Some(key) = first_usable(&["KIMI_API_KEY", "KIM_API_KEY"]) {
            creds.insert(ProviderKind::Kimi, DEFAULT_KEY_NAME, &key);
        }

        creds
    }

    /// Usable key for `kind` under `name`
    #[must_use]
    pub fn key(&self, kind: ProviderKind, name: &str) -> Option<&str> {
        self.keys
            .get(&kind)
            .and_then(|keys| keys.get(name))
            .map(String::as_str)
            .filter(|key| has_usable_api_key(key))
    }

    /// Usable key under `name`, falling back to the provider's default key
    #[must_use]
    pub fn resolve(&self, kind: ProviderKind, name: &str) -> Option<&str> {
        self.key(kind, name)
            .or_else(|| self.key(kind, DEFAULT_KEY_NAME))
    }

    /// Providers with at least one usable key
    #[must_use]
    pub fn configured_providers(&self) -> Vec<ProviderKind> {
        ProviderKind::FALLBACK_ORDER
            .into_iter()
            .filter(|kind| self.resolve(*kind, DEFAULT_KEY_NAME).is_some())
            .collect()
    }

    /// Provider list for generic chat: the fallback order, default keys only
    #[must_use]
    pub fn chat_providers(&self) -> Vec<ProviderSpec> {
        ProviderKind::FALLBACK_ORDER
            .into_iter()
            .filter_map(|kind| {
                self.resolve(kind, DEFAULT_KEY_NAME).map(|key| ProviderSpec {
                    kind,
                    api_key: key.to_string(),
                    model: None,
                })
            })
            .collect()
    }

    /// Provider list for an agent: its preferred provider first, then the fallbacks
    #[must_use]
    pub fn agent_providers(&self, agent: &AgentDefinition) -> Vec<ProviderSpec> {
        let mut providers = Vec::new();
        let mut seen = HashSet::new();

        match agent.model_provider.parse::<ProviderKind>() {
            Ok(preferred) => {
                if let Some(key) = self.resolve(preferred, &agent.model_key) {
                    providers.push(ProviderSpec {
                        kind: preferred,
                        api_key: key.to_string(),
                        model: agent.model_name.clone(),
                    });
                    seen.insert(preferred);
                }
            }
            Err(e) => {
                warn!(agent_id = %agent.id, error = %e, "Ignoring unknown preferred provider");
            }
        }

        for kind in ProviderKind::FALLBACK_ORDER {
            if seen.contains(&kind) {
                continue;
            }
            if let Some(key) = self.resolve(kind, DEFAULT_KEY_NAME) {
                providers.push(ProviderSpec {
                    kind,
                    api_key: key.to_string(),
                    model: None,
                });
                seen.insert(kind);
            }
        }

        providers
    }
}
