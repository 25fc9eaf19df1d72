//! Startup configuration.
//!
//! The ordered provider list and router settings are supplied once at
//! process start; there is no dynamic reconfiguration. Secrets are not
//! part of this file — API keys go straight into adapter constructors.

use crate::provider::ProviderDescriptor;
use crate::router::RouterConfig;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::fs;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Process-wide provider configuration, loaded once at startup.
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// Failover chain in configuration order. Order breaks priority
    /// ties, so it is meaningful.
    pub providers: Vec<ProviderDescriptor>,

    /// Per-attempt timeout in seconds.
    #[serde(default = "default_attempt_timeout_secs")]
    pub attempt_timeout_secs: u64,

    /// Base backoff between fallback attempts in milliseconds.
    #[serde(default)]
    pub backoff_ms: u64,
}

fn default_attempt_timeout_secs() -> u64 {
    10
}

impl ProvidersConfig {
    /// Parse and validate configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate configuration from a JSON file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).await?;
        Self::from_json(&content)
    }

    /// The router settings this configuration describes.
    pub fn router_config(&self) -> RouterConfig {
        RouterConfig {
            attempt_timeout: Duration::from_secs(self.attempt_timeout_secs),
            backoff: Duration::from_millis(self.backoff_ms),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.providers.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one provider is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for descriptor in &self.providers {
            if descriptor.id.is_empty() {
                return Err(ConfigError::Invalid(
                    "provider id must not be empty".to_string(),
                ));
            }
            if !seen.insert(descriptor.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate provider id: {}",
                    descriptor.id
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = ProvidersConfig::from_json(
            r#"{
                "providers": [
                    {"id": "anthropic-primary", "priority": 1, "cost_per_token": 0.000003},
                    {"id": "openai-backup", "priority": 2}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(config.providers.len(), 2);
        assert_eq!(config.attempt_timeout_secs, 10);
        assert_eq!(config.backoff_ms, 0);
        assert_eq!(
            config.router_config().attempt_timeout,
            Duration::from_secs(10)
        );
    }

    #[test]
    fn test_reject_empty_provider_list() {
        let error = ProvidersConfig::from_json(r#"{"providers": []}"#).unwrap_err();
        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_reject_duplicate_ids() {
        let error = ProvidersConfig::from_json(
            r#"{
                "providers": [
                    {"id": "same", "priority": 1},
                    {"id": "same", "priority": 2}
                ]
            }"#,
        )
        .unwrap_err();

        assert!(matches!(error, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_router_settings_parsed() {
        let config = ProvidersConfig::from_json(
            r#"{
                "providers": [{"id": "only", "priority": 1}],
                "attempt_timeout_secs": 3,
                "backoff_ms": 250
            }"#,
        )
        .unwrap();

        let router_config = config.router_config();
        assert_eq!(router_config.attempt_timeout, Duration::from_secs(3));
        assert_eq!(router_config.backoff, Duration::from_millis(250));
    }
}
