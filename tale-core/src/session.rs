//! Session coordination - the primary public API for story sessions.
//!
//! A `SessionCoordinator` combines one story context with the failover
//! router behind an explicit state machine:
//!
//! `Created -> AwaitingChoice -> Generating -> AwaitingChoice -> ... -> Completed`
//!
//! At most one `choose` call is in flight per session: a concurrent call
//! observes `Generating` and fails fast instead of queuing. Dropping the
//! `choose` future mid-generation returns the session to `AwaitingChoice`
//! with the context untouched.

use crate::context::{Choice, PromptLimits, SessionId, StoryBeat, StoryContext};
use crate::persist::{JsonStore, PersistError};
use crate::router::{FailoverRouter, GenerationError};
use crate::telemetry::{NullHooks, SessionHooks};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Seed length bounds, inclusive.
const MAX_SEED_LEN: usize = 50;

/// Lifecycle states of a story session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Created,
    AwaitingChoice,
    Generating,
    Completed,
}

/// Errors from session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Bad input, user-correctable, no state change.
    #[error("invalid seed: {reason}")]
    Validation { reason: String },

    /// Operation not allowed in the current state; no state change.
    #[error("{operation} is not allowed while the session is {state:?}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Every provider failed for this request; the session stays usable.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Persistence collaborator failure.
    #[error("persistence error: {0}")]
    Persist(#[from] PersistError),
}

/// Check a seed against the allowed pattern: alphanumeric, hyphen, or
/// underscore, 1-50 characters.
pub fn validate_seed(seed: &str) -> Result<(), SessionError> {
    if seed.is_empty() {
        return Err(SessionError::Validation {
            reason: "seed must not be empty".to_string(),
        });
    }
    if let Some(bad) = seed
        .chars()
        .find(|c| !c.is_ascii_alphanumeric() && *c != '-' && *c != '_')
    {
        return Err(SessionError::Validation {
            reason: format!("seed contains disallowed character {bad:?}"),
        });
    }
    if seed.len() > MAX_SEED_LEN {
        return Err(SessionError::Validation {
            reason: format!("seed must be at most {MAX_SEED_LEN} characters"),
        });
    }
    Ok(())
}

struct Inner {
    state: SessionState,
    context: Option<StoryContext>,
}

/// A story session.
///
/// Owns exactly one story context once started. Methods take `&self`;
/// wrap the coordinator in an `Arc` to share it with concurrent callers.
pub struct SessionCoordinator {
    router: FailoverRouter,
    hooks: Arc<dyn SessionHooks>,
    limits: PromptLimits,
    inner: Mutex<Inner>,
}

impl SessionCoordinator {
    /// Create a coordinator in the `Created` state.
    pub fn new(router: FailoverRouter) -> Self {
        Self {
            router,
            hooks: Arc::new(NullHooks),
            limits: PromptLimits::default(),
            inner: Mutex::new(Inner {
                state: SessionState::Created,
                context: None,
            }),
        }
    }

    /// Install collaborator hooks.
    pub fn with_hooks(mut self, hooks: Arc<dyn SessionHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Set the prompt assembly limits.
    pub fn with_prompt_limits(mut self, limits: PromptLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Start the session from a seed.
    ///
    /// Fails with a validation error for a malformed seed; no context is
    /// created in that case.
    pub fn start(&self, seed: &str) -> Result<SessionId, SessionError> {
        validate_seed(seed)?;

        let mut inner = self.lock();
        if inner.state != SessionState::Created {
            return Err(SessionError::InvalidState {
                operation: "start",
                state: inner.state,
            });
        }

        let context = StoryContext::new(seed);
        let session_id = context.session_id;
        inner.context = Some(context);
        inner.state = SessionState::AwaitingChoice;

        tracing::info!(session = %session_id, seed, "session started");
        Ok(session_id)
    }

    /// Resolve one choice: build the prompt, route it through the
    /// failover chain, and append the resulting beat.
    ///
    /// On routing exhaustion the context is left exactly as it was and
    /// the session returns to `AwaitingChoice`; the caller may retry the
    /// same choice.
    pub async fn choose(&self, choice: Choice) -> Result<StoryBeat, SessionError> {
        let prompt = {
            let mut inner = self.lock();
            if inner.state != SessionState::AwaitingChoice {
                return Err(SessionError::InvalidState {
                    operation: "choose",
                    state: inner.state,
                });
            }
            let Some(ref context) = inner.context else {
                return Err(SessionError::InvalidState {
                    operation: "choose",
                    state: inner.state,
                });
            };
            let prompt = format!(
                "{}\nThe player chooses: {choice}. Continue the story.",
                context.build_prompt(&self.limits)
            );
            inner.state = SessionState::Generating;
            prompt
        };

        // If the future is dropped at the await point below, the guard
        // restores AwaitingChoice and no beat is appended.
        let guard = GeneratingGuard::arm(&self.inner);
        let result = self.router.generate(&prompt).await;
        guard.disarm();

        match result {
            Ok(generation) => {
                let beat = StoryBeat::new(choice, generation.narrative, generation.provider_id);
                let updated = {
                    let mut inner = self.lock();
                    inner.state = SessionState::AwaitingChoice;
                    let Some(ref context) = inner.context else {
                        return Err(SessionError::InvalidState {
                            operation: "choose",
                            state: inner.state,
                        });
                    };
                    let updated = context.append(beat.clone());
                    inner.context = Some(updated.clone());
                    updated
                };

                self.hooks.on_attempts(&generation.attempts);
                self.hooks.on_session_updated(&updated);
                Ok(beat)
            }
            Err(error) => {
                {
                    let mut inner = self.lock();
                    inner.state = SessionState::AwaitingChoice;
                }
                let GenerationError::AllProvidersFailed { ref attempts } = error;
                self.hooks.on_attempts(attempts);
                tracing::warn!(attempts = attempts.len(), "choice failed, context unchanged");
                Err(error.into())
            }
        }
    }

    /// Explicit terminal transition. No further choices are accepted.
    pub fn complete(&self) -> Result<(), SessionError> {
        let mut inner = self.lock();
        if inner.state != SessionState::AwaitingChoice {
            return Err(SessionError::InvalidState {
                operation: "complete",
                state: inner.state,
            });
        }
        inner.state = SessionState::Completed;
        Ok(())
    }

    /// The current lifecycle state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// Snapshot of the current context, if the session has started.
    pub fn context(&self) -> Option<StoryContext> {
        self.lock().context.clone()
    }

    /// The session id, once started.
    pub fn session_id(&self) -> Option<SessionId> {
        self.lock().context.as_ref().map(|c| c.session_id)
    }

    /// Persist the current state through the store collaborator.
    pub async fn save(&self, store: &JsonStore) -> Result<(), SessionError> {
        let (state, context) = {
            let inner = self.lock();
            (inner.state, inner.context.clone())
        };
        let Some(context) = context else {
            return Err(SessionError::InvalidState {
                operation: "save",
                state,
            });
        };
        store.save(state, &context).await?;
        Ok(())
    }

    /// Rebuild a coordinator from a saved snapshot.
    ///
    /// A persisted `Generating` state collapses to `AwaitingChoice`: no
    /// in-flight generation survives a restart.
    pub async fn resume(router: FailoverRouter, store: &JsonStore) -> Result<Self, SessionError> {
        let saved = store.load().await?;
        let state = match saved.state {
            SessionState::Generating => SessionState::AwaitingChoice,
            state => state,
        };

        tracing::info!(session = %saved.context.session_id, ?state, "session resumed");
        Ok(Self {
            router,
            hooks: Arc::new(NullHooks),
            limits: PromptLimits::default(),
            inner: Mutex::new(Inner {
                state,
                context: Some(saved.context),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Restores `AwaitingChoice` if a choice is abandoned mid-generation.
struct GeneratingGuard<'a> {
    inner: &'a Mutex<Inner>,
    armed: bool,
}

impl<'a> GeneratingGuard<'a> {
    fn arm(inner: &'a Mutex<Inner>) -> Self {
        Self { inner, armed: true }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for GeneratingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if inner.state == SessionState::Generating {
            inner.state = SessionState::AwaitingChoice;
            tracing::debug!("choice cancelled, session back to awaiting choice");
        }
    }
}
