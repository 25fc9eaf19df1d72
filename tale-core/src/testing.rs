//! Testing utilities for story sessions.
//!
//! This module provides tools for deterministic tests without API calls:
//! - `ScriptedProvider` with queued responses and failures
//! - `RecordingHooks` for asserting hook dispatch
//! - `TestHarness` for scripted session scenarios
//! - Assertion helpers for verifying session state

use crate::context::StoryContext;
use crate::provider::{ProviderAdapter, ProviderDescriptor, ProviderError};
use crate::router::{FailoverRouter, GenerationAttempt};
use crate::session::{SessionCoordinator, SessionState};
use crate::telemetry::SessionHooks;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// Line returned when a scripted provider runs out of responses.
const OUT_OF_SCRIPT: &str = "The story waits for direction. (Y/N)";

/// A provider that returns scripted responses in order.
///
/// Use this for deterministic tests without API calls. Responses and
/// failures share one queue; when it runs dry the provider falls back to
/// a fixed valid line.
pub struct ScriptedProvider {
    descriptor: ProviderDescriptor,
    script: Mutex<VecDeque<Result<String, ProviderError>>>,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    /// Create a scripted provider with the given id and priority.
    pub fn new(id: impl Into<String>, priority: u32) -> Self {
        Self {
            descriptor: ProviderDescriptor::new(id, priority),
            script: Mutex::new(VecDeque::new()),
            delay: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// Use a full descriptor instead of the bare id/priority pair.
    pub fn with_descriptor(mut self, descriptor: ProviderDescriptor) -> Self {
        self.descriptor = descriptor;
        self
    }

    /// Delay every call, for timeout and concurrency tests.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Queue a successful response.
    pub fn respond_with(&self, text: impl Into<String>) {
        self.lock_script().push_back(Ok(text.into()));
    }

    /// Queue a failure.
    pub fn fail_with(&self, error: ProviderError) {
        self.lock_script().push_back(Err(error));
    }

    /// How many times `generate` has been called.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn lock_script(
        &self,
    ) -> std::sync::MutexGuard<'_, VecDeque<Result<String, ProviderError>>> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ProviderAdapter for ScriptedProvider {
    fn descriptor(&self) -> &ProviderDescriptor {
        &self.descriptor
    }

    async fn generate(&self, _prompt: &str) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.lock_script().pop_front() {
            Some(result) => result,
            None => Ok(OUT_OF_SCRIPT.to_string()),
        }
    }
}

/// Hooks that record every dispatch for assertions.
#[derive(Default)]
pub struct RecordingHooks {
    updates: Mutex<Vec<StoryContext>>,
    attempt_batches: Mutex<Vec<Vec<GenerationAttempt>>>,
}

impl RecordingHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Contexts received via `on_session_updated`, in order.
    pub fn updates(&self) -> Vec<StoryContext> {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Attempt batches received via `on_attempts`, in order.
    pub fn attempt_batches(&self) -> Vec<Vec<GenerationAttempt>> {
        self.attempt_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of `on_session_updated` dispatches.
    pub fn update_count(&self) -> usize {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Number of `on_attempts` dispatches.
    pub fn attempt_batch_count(&self) -> usize {
        self.attempt_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl SessionHooks for RecordingHooks {
    fn on_session_updated(&self, context: &StoryContext) {
        self.updates
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(context.clone());
    }

    fn on_attempts(&self, attempts: &[GenerationAttempt]) {
        self.attempt_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(attempts.to_vec());
    }
}

/// Test harness wiring a coordinator to scripted providers and
/// recording hooks.
pub struct TestHarness {
    /// The coordinator under test.
    pub coordinator: Arc<SessionCoordinator>,

    /// Recording hooks installed on the coordinator.
    pub hooks: Arc<RecordingHooks>,

    /// Handle to the single scripted provider (for queuing and call
    /// counts).
    pub provider: Arc<ScriptedProvider>,
}

impl TestHarness {
    /// Harness with one scripted provider and recording hooks.
    pub fn new() -> Self {
        let provider = Arc::new(ScriptedProvider::new("scripted", 1));
        let hooks = Arc::new(RecordingHooks::new());
        let router = FailoverRouter::new(vec![provider.clone() as Arc<dyn ProviderAdapter>]);
        let coordinator = Arc::new(
            SessionCoordinator::new(router).with_hooks(hooks.clone() as Arc<dyn SessionHooks>),
        );

        Self {
            coordinator,
            hooks,
            provider,
        }
    }

    /// Queue a narrative response on the scripted provider.
    pub fn expect_narrative(&self, text: impl Into<String>) -> &Self {
        self.provider.respond_with(text);
        self
    }

    /// Queue a failure on the scripted provider.
    pub fn expect_failure(&self, error: ProviderError) -> &Self {
        self.provider.fail_with(error);
        self
    }

    /// Start the session with a known-good seed.
    pub fn start(&self) {
        self.coordinator
            .start("test-seed")
            .expect("test seed should be valid");
    }

    /// Current history length, zero before start.
    pub fn history_len(&self) -> usize {
        self.coordinator
            .context()
            .map(|context| context.len())
            .unwrap_or(0)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Assertion Helpers
// ============================================================================

/// Assert the session is awaiting a choice.
#[track_caller]
pub fn assert_awaiting_choice(coordinator: &SessionCoordinator) {
    assert_eq!(
        coordinator.state(),
        SessionState::AwaitingChoice,
        "Expected session to be awaiting a choice"
    );
}

/// Assert the recorded history has the expected length.
#[track_caller]
pub fn assert_history_len(coordinator: &SessionCoordinator, expected: usize) {
    let actual = coordinator
        .context()
        .map(|context| context.len())
        .unwrap_or(0);
    assert_eq!(
        actual, expected,
        "Expected {expected} beats in history, got {actual}"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Choice;

    #[tokio::test]
    async fn test_scripted_provider_plays_in_order() {
        let provider = ScriptedProvider::new("scripted", 1);
        provider.respond_with("First. (Y/N)");
        provider.respond_with("Second. (Y/N)");

        assert_eq!(provider.generate("p").await.unwrap(), "First. (Y/N)");
        assert_eq!(provider.generate("p").await.unwrap(), "Second. (Y/N)");
        assert_eq!(provider.generate("p").await.unwrap(), OUT_OF_SCRIPT);
        assert_eq!(provider.calls(), 3);
    }

    #[tokio::test]
    async fn test_scripted_provider_failures() {
        let provider = ScriptedProvider::new("scripted", 1);
        provider.fail_with(ProviderError::quota_exceeded("spent"));

        let error = provider.generate("p").await.unwrap_err();
        assert_eq!(
            error.kind,
            crate::provider::ProviderErrorKind::QuotaExceeded
        );
    }

    #[tokio::test]
    async fn test_harness_flow() {
        let harness = TestHarness::new();
        harness.expect_narrative("You stand at the gate. (Y/N)");
        harness.start();

        let beat = harness.coordinator.choose(Choice::Yes).await.unwrap();

        assert_eq!(beat.narrative, "You stand at the gate. (Y/N)");
        assert_awaiting_choice(&harness.coordinator);
        assert_history_len(&harness.coordinator, 1);
        assert_eq!(harness.hooks.update_count(), 1);
        assert_eq!(harness.hooks.attempt_batch_count(), 1);
    }
}
