//! Configuration loading
//!
//! Handles loading configuration from embedded defaults, files, and environment.

use super::config::AppConfig;
use anyhow::{Context, Result};
use config::{Config, Environment, File, FileFormat};

/// Embedded default configuration (compiled into binary)
pub const DEFAULT_CONFIG: &str = include_str!("../../config/default.toml");

/// Load configuration from files and environment
pub fn load_config() -> Result<AppConfig> {
    let env_name = std::env::var("CONCLAVE_ENV").unwrap_or_else(|_| "development".to_string());

    let config = Config::builder()
        // 1. Embedded defaults (always available)
        .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
        // 2. External overrides (optional)
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{env_name}")).required(false))
        .add_source(File::with_name("config/local").required(false))
        // 3. Environment variables (highest priority)
        // prefix_separator("_") makes CONCLAVE_JOBS__GRACE_SECS work; config-rs 0.14
        // otherwise expects CONCLAVE__JOBS__GRACE_SECS.
        .add_source(
            Environment::with_prefix("CONCLAVE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    config
        .try_deserialize()
        .context("Failed to deserialize configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_defaults_parse() {
        let config: AppConfig = toml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.providers.timeout_secs, 30);
        assert_eq!(config.providers.max_tokens, 1200);
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.jobs.max_entries, 1000);
        assert_eq!(config.orchestrator.knowledge_dir, "config/knowledge");
        assert!(config.events.is_empty());
    }

    #[test]
    fn test_unknown_profile_override_falls_back() {
        let config: AppConfig = Config::builder()
            .add_source(File::from_str(DEFAULT_CONFIG, FileFormat::Toml))
            .set_override("lifecycle.profile", "qa")
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.lifecycle.profile, conclave_core::Profile::Development);
    }
}
