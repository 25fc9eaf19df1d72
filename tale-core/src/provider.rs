//! Narrative provider adapters.
//!
//! A provider adapter is a uniform capability wrapper around one
//! narrative-generation backend: cost estimation, descriptor queries,
//! and a single generate operation. The set of implementations is
//! closed — each hosted backend gets an explicit adapter here, and the
//! scripted adapter for tests lives in [`crate::testing`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Marker a valid narrative beat must end with.
const CHOICE_MARKER: &str = "(Y/N)";

/// Static description of one provider: identity, ordering, capabilities,
/// and pricing. Loaded once at startup and never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
    /// Stable identifier, recorded on every beat and attempt.
    pub id: String,

    /// Failover order; lower is tried first.
    pub priority: u32,

    /// Capability tags the provider advertises.
    #[serde(default)]
    pub capabilities: Vec<String>,

    /// Cost per token in account units.
    #[serde(default)]
    pub cost_per_token: f64,
}

impl ProviderDescriptor {
    /// Create a descriptor with no capabilities and zero cost.
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            id: id.into(),
            priority,
            capabilities: Vec::new(),
            cost_per_token: 0.0,
        }
    }

    /// Add a capability tag.
    pub fn with_capability(mut self, tag: impl Into<String>) -> Self {
        self.capabilities.push(tag.into());
        self
    }

    /// Set the per-token cost.
    pub fn with_cost_per_token(mut self, cost: f64) -> Self {
        self.cost_per_token = cost;
        self
    }

    /// Whether the provider advertises a capability tag.
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}

/// Failure classes for one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    Timeout,
    InvalidResponse,
    QuotaExceeded,
    Unknown,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Timeout => "timeout",
            Self::InvalidResponse => "invalid response",
            Self::QuotaExceeded => "quota exceeded",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Error from a single provider attempt.
///
/// Recovered internally by the failover router advancing to the next
/// provider; never surfaced to the session caller directly.
#[derive(Debug, Clone, Error)]
#[error("provider failure ({kind}): {message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Timeout,
            message: message.into(),
        }
    }

    pub fn invalid_response(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::InvalidResponse,
            message: message.into(),
        }
    }

    pub fn quota_exceeded(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::QuotaExceeded,
            message: message.into(),
        }
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            kind: ProviderErrorKind::Unknown,
            message: message.into(),
        }
    }
}

impl From<tale_backends::Error> for ProviderError {
    fn from(err: tale_backends::Error) -> Self {
        match err {
            tale_backends::Error::RateLimited { message } => Self::quota_exceeded(message),
            tale_backends::Error::Api { status: 429, message } => Self::quota_exceeded(message),
            tale_backends::Error::Parse(message) => Self::invalid_response(message),
            other => Self::unknown(other.to_string()),
        }
    }
}

/// Check the minimal shape of a narrative response: non-empty and ending
/// with a recognized choice-prompt marker. Pure, no side effects.
pub fn validate_response(text: &str) -> bool {
    let trimmed = text.trim();
    !trimmed.is_empty() && trimmed.to_ascii_uppercase().ends_with(CHOICE_MARKER)
}

/// Uniform wrapper around one narrative-generation backend.
///
/// Adapters never bound their own calls; the router wraps every
/// `generate` in a caller-supplied timeout.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// The provider's static descriptor.
    fn descriptor(&self) -> &ProviderDescriptor;

    /// Generate one narrative beat for the prompt.
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    /// Estimated cost of a generation touching `token_count` tokens.
    fn estimate_cost(&self, token_count: usize) -> f64 {
        self.descriptor().cost_per_token * token_count as f64
    }

    /// The provider's stable identifier.
    fn id(&self) -> &str {
        &self.descriptor().id
    }
}

/// Adapter for the Anthropic Messages API.
pub struct AnthropicProvider {
    client: tale_backends::anthropic::Client,
    descriptor: ProviderDescriptor,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl AnthropicProvider {
    /// Wrap a configured client.
    pub fn new(client: tale_backends::anthropic::Client, descriptor: ProviderDescriptor) -> Self {
        Self {
            client,
            descriptor,
            max_tokens: 1024,
            temperature: Some(0.8),
        }
    }

    /// Build from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env(descriptor: ProviderDescriptor) -> Result<Self, ProviderError> {
        let client = tale_backends::anthropic::Client::from_env()?;
        Ok(Self::new(client, descriptor))
    }

    /// Set max tokens per generation.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set generation temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl ProviderAdapter for AnthropicProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut request =
            tale_backends::NarrativeRequest::new(prompt).with_max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let completion = self.client.complete(request).await?;
        Ok(completion.text)
    }
}

/// Adapter for OpenAI-compatible chat completion backends.
pub struct OpenAiProvider {
    client: tale_backends::openai::Client,
    descriptor: ProviderDescriptor,
    max_tokens: usize,
    temperature: Option<f32>,
}

impl OpenAiProvider {
    /// Wrap a configured client.
    pub fn new(client: tale_backends::openai::Client, descriptor: ProviderDescriptor) -> Self {
        Self {
            client,
            descriptor,
            max_tokens: 1024,
            temperature: Some(0.8),
        }
    }

    /// Build from the OPENAI_API_KEY environment variable.
    pub fn from_env(descriptor: ProviderDescriptor) -> Result<Self, ProviderError> {
        let client = tale_backends::openai::Client::from_env()?;
        Ok(Self::new(client, descriptor))
    }

    /// Set max tokens per generation.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set generation temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let mut request =
            tale_backends::NarrativeRequest::new(prompt).with_max_tokens(self.max_tokens);
        if let Some(temperature) = self.temperature {
            request = request.with_temperature(temperature);
        }

        let completion = self.client.complete(request).await?;
        Ok(completion.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_accepts_marker_suffix() {
        assert!(validate_response("It was dark. (Y/N)"));
        assert!(validate_response("  Do you open the door? (y/n)  "));
    }

    #[test]
    fn test_validate_rejects_bad_shapes() {
        assert!(!validate_response(""));
        assert!(!validate_response("   \n  "));
        assert!(!validate_response("It was dark."));
        assert!(!validate_response("(Y/N) and then some more text"));
    }

    #[test]
    fn test_descriptor_capabilities() {
        let descriptor = ProviderDescriptor::new("anthropic-primary", 1)
            .with_capability("narrative")
            .with_cost_per_token(0.000_003);

        assert!(descriptor.has_capability("narrative"));
        assert!(!descriptor.has_capability("summarization"));
    }

    #[test]
    fn test_backend_error_mapping() {
        let rate_limited = tale_backends::Error::RateLimited {
            message: "slow down".to_string(),
        };
        assert_eq!(
            ProviderError::from(rate_limited).kind,
            ProviderErrorKind::QuotaExceeded
        );

        let api_429 = tale_backends::Error::Api {
            status: 429,
            message: "too many requests".to_string(),
        };
        assert_eq!(
            ProviderError::from(api_429).kind,
            ProviderErrorKind::QuotaExceeded
        );

        let parse = tale_backends::Error::Parse("bad json".to_string());
        assert_eq!(
            ProviderError::from(parse).kind,
            ProviderErrorKind::InvalidResponse
        );

        let network = tale_backends::Error::Network("connection reset".to_string());
        assert_eq!(
            ProviderError::from(network).kind,
            ProviderErrorKind::Unknown
        );
    }

    #[test]
    fn test_default_cost_estimate() {
        struct Fixed(ProviderDescriptor);

        #[async_trait]
        impl ProviderAdapter for Fixed {
            fn descriptor(&self) -> &ProviderDescriptor {
                &self.0
            }

            async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
                Ok("unused".to_string())
            }
        }

        let adapter = Fixed(ProviderDescriptor::new("fixed", 1).with_cost_per_token(0.5));
        assert_eq!(adapter.estimate_cost(10), 5.0);
    }
}
