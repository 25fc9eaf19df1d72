//! Failover routing across narrative providers.
//!
//! One routing decision tries providers strictly in ascending priority,
//! one at a time, bounding every call with a timeout. A response is only
//! accepted if it passes validation; anything else advances to the next
//! provider. The same provider is never retried within one request —
//! whole-request retry policy belongs to the caller.

use crate::context::estimate_tokens;
use crate::provider::{validate_response, ProviderAdapter, ProviderError, ProviderErrorKind};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Telemetry record for one provider try. Exists for the duration of a
/// routing decision and is handed to the telemetry hook; never retained
/// in story context.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationAttempt {
    /// Which provider was tried.
    pub provider_id: String,

    /// When the attempt started.
    pub started_at: DateTime<Utc>,

    /// How long the attempt took.
    pub elapsed: Duration,

    /// How it ended.
    pub outcome: AttemptOutcome,
}

/// Outcome of one provider try.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success {
        narrative: String,
        estimated_cost: f64,
    },
    Failure {
        kind: ProviderErrorKind,
        reason: String,
    },
}

impl AttemptOutcome {
    /// Whether this attempt produced the accepted narrative.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

/// Terminal routing failure: every provider was tried and none produced
/// a valid response. Scoped to one request; the session stays usable.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("all providers failed")]
    AllProvidersFailed { attempts: Vec<GenerationAttempt> },
}

/// Result of a successful routing decision.
#[derive(Debug, Clone)]
pub struct Generation {
    /// The accepted narrative text.
    pub narrative: String,

    /// The provider that produced it.
    pub provider_id: String,

    /// One record per provider tried, in attempt order.
    pub attempts: Vec<GenerationAttempt>,
}

/// Router tuning knobs.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// Upper bound on a single provider call.
    pub attempt_timeout: Duration,

    /// Base delay inserted before each fallback attempt, jittered.
    /// Zero disables backoff.
    pub backoff: Duration,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(10),
            backoff: Duration::ZERO,
        }
    }
}

/// Orchestrates generation attempts across an ordered provider list.
pub struct FailoverRouter {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    config: RouterConfig,
}

impl FailoverRouter {
    /// Build a router over the given adapters.
    ///
    /// Attempt order is fixed here: ascending priority, with equal
    /// priorities keeping the configuration list order.
    pub fn new(mut adapters: Vec<Arc<dyn ProviderAdapter>>) -> Self {
        adapters.sort_by_key(|adapter| adapter.descriptor().priority);
        Self {
            adapters,
            config: RouterConfig::default(),
        }
    }

    /// Apply router configuration.
    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Number of providers in the failover chain.
    pub fn provider_count(&self) -> usize {
        self.adapters.len()
    }

    /// Provider ids in attempt order.
    pub fn provider_ids(&self) -> Vec<&str> {
        self.adapters.iter().map(|a| a.id()).collect()
    }

    /// Run one routing decision for the prompt.
    ///
    /// Returns the first validated response, or the full attempt log if
    /// every provider failed.
    pub async fn generate(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let prompt_tokens = estimate_tokens(prompt);
        let mut attempts = Vec::with_capacity(self.adapters.len());

        for (index, adapter) in self.adapters.iter().enumerate() {
            if index > 0 && !self.config.backoff.is_zero() {
                tokio::time::sleep(jittered(self.config.backoff)).await;
            }

            let started_at = Utc::now();
            let clock = Instant::now();
            let result = self.attempt(adapter.as_ref(), prompt).await;
            let elapsed = clock.elapsed();

            match result {
                Ok(narrative) => {
                    let estimated_cost =
                        adapter.estimate_cost(prompt_tokens + estimate_tokens(&narrative));
                    tracing::debug!(
                        provider = %adapter.id(),
                        ?elapsed,
                        estimated_cost,
                        "generation accepted"
                    );
                    attempts.push(GenerationAttempt {
                        provider_id: adapter.id().to_string(),
                        started_at,
                        elapsed,
                        outcome: AttemptOutcome::Success {
                            narrative: narrative.clone(),
                            estimated_cost,
                        },
                    });
                    return Ok(Generation {
                        narrative,
                        provider_id: adapter.id().to_string(),
                        attempts,
                    });
                }
                Err(error) => {
                    tracing::warn!(
                        provider = %adapter.id(),
                        kind = %error.kind,
                        ?elapsed,
                        "provider attempt failed, advancing"
                    );
                    attempts.push(GenerationAttempt {
                        provider_id: adapter.id().to_string(),
                        started_at,
                        elapsed,
                        outcome: AttemptOutcome::Failure {
                            kind: error.kind,
                            reason: error.message,
                        },
                    });
                }
            }
        }

        Err(GenerationError::AllProvidersFailed { attempts })
    }

    /// One bounded, validated provider call.
    async fn attempt(
        &self,
        adapter: &dyn ProviderAdapter,
        prompt: &str,
    ) -> Result<String, ProviderError> {
        let generated =
            match tokio::time::timeout(self.config.attempt_timeout, adapter.generate(prompt)).await
            {
                Err(_) => {
                    return Err(ProviderError::timeout(format!(
                        "no response within {:?}",
                        self.config.attempt_timeout
                    )))
                }
                Ok(result) => result?,
            };

        if !validate_response(&generated) {
            return Err(ProviderError::invalid_response(
                "response is empty or missing the (Y/N) marker",
            ));
        }

        Ok(generated)
    }
}

/// Base delay plus up to 25% random jitter.
fn jittered(base: Duration) -> Duration {
    let base_ms = base.as_millis() as u64;
    let jitter_ms = rand::thread_rng().gen_range(0..=base_ms / 4);
    Duration::from_millis(base_ms + jitter_ms)
}
