use crate::credentials::ProviderSpec;
use conclave_llm::{
    AnthropicConfig, AnthropicProvider, LlmProvider, OpenAiCompatConfig, OpenAiCompatProvider,
    ProviderKind,
};
use dashmap::DashMap;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Builds an adapter for one entry of a provider list
///
/// Injected into [`ProviderExecutor`](super::ProviderExecutor) so tests can hand out
/// scripted providers instead of HTTP clients.
pub trait ProviderFactory: Send + Sync {
    /// Create the adapter for `spec`
    ///
    /// # Errors
    /// Returns an error if the adapter cannot be constructed.
    fn create(&self, spec: &ProviderSpec) -> conclave_llm::Result<Arc<dyn LlmProvider>>;
}

/// Factory for the real HTTP adapters
///
/// Adapters are built once per `(kind, key)` and reused, so every attempt against
/// the same provider shares one connection pool.
#[derive(Clone)]
pub struct HttpProviderFactory {
    timeout: Duration,
    max_tokens: u32,
    cache: Arc<DashMap<(ProviderKind, String), Arc<dyn LlmProvider>>>,
}

impl fmt::Debug for HttpProviderFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpProviderFactory")
            .field("timeout", &self.timeout)
            .field("max_tokens", &self.max_tokens)
            .field("cached", &self.cache.len())
            .finish()
    }
}

impl HttpProviderFactory {
    /// Create a factory whose adapters use the given request timeout
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            max_tokens: conclave_llm::DEFAULT_MAX_TOKENS,
            cache: Arc::new(DashMap::new()),
        }
    }

    /// Set the completion budget
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self.cache = Arc::new(DashMap::new());
        self
    }

    fn build(&self, spec: &ProviderSpec) -> conclave_llm::Result<Arc<dyn LlmProvider>> {
        match spec.kind {
            ProviderKind::Anthropic => {
                let mut config = AnthropicConfig::new(&spec.api_key).with_timeout(self.timeout);
                config.max_tokens = self.max_tokens;
                Ok(Arc::new(AnthropicProvider::new(config)?))
            }
            kind => {
                let mut config = OpenAiCompatConfig::for_kind(kind, &spec.api_key)
                    .ok_or_else(|| conclave_llm::Error::NotConfigured(kind.to_string()))?
                    .with_timeout(self.timeout);
                config.max_tokens = self.max_tokens;
                Ok(Arc::new(OpenAiCompatProvider::new(config)?))
            }
        }
    }
}

impl Default for HttpProviderFactory {
    fn default() -> Self {
        Self::new(conclave_llm::DEFAULT_TIMEOUT)
    }
}

impl ProviderFactory for HttpProviderFactory {
    fn create(&self, spec: &ProviderSpec) -> conclave_llm::Result<Arc<dyn LlmProvider>> {
        let key = (spec.kind, spec.api_key.clone());
        if let Some(provider) = self.cache.get(&key) {
            return Ok(Arc::clone(provider.value()));
        }
        let provider = self.build(spec)?;
        Ok(Arc::clone(self.cache.entry(key).or_insert(provider).value()))
    }
}

/// Factory over pre-built adapters, one per provider kind
///
/// Used for scripted providers (tests, dry runs). A kind without an adapter
/// fails with [`conclave_llm::Error::NotConfigured`].
#[derive(Clone, Default)]
pub struct StaticProviderFactory {
    providers: HashMap<ProviderKind, Arc<dyn LlmProvider>>,
}

impl StaticProviderFactory {
    /// Empty factory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the adapter handed out for `kind`
    #[must_use]
    pub fn with_provider(mut self, kind: ProviderKind, provider: Arc<dyn LlmProvider>) -> Self {
        self.providers.insert(kind, provider);
        self
    }
}

impl ProviderFactory for StaticProviderFactory {
    fn create(&self, spec: &ProviderSpec) -> conclave_llm::Result<Arc<dyn LlmProvider>> {
        self.providers
            .get(&spec.kind)
            .cloned()
            .ok_or_else(|| conclave_llm::Error::NotConfigured(spec.kind.to_string()))
    }
}
