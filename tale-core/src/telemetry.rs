//! Collaborator hooks for persistence and telemetry handoff.
//!
//! The core never talks to a database or a metrics pipeline directly.
//! It calls these hooks at well-defined points and moves on: hook
//! signatures are infallible, so a collaborator can never fail the
//! user-facing operation.

use crate::context::StoryContext;
use crate::router::GenerationAttempt;

/// Callbacks fired by the session coordinator.
///
/// `on_session_updated` fires exactly once per successful choice, never
/// on failure or cancellation. `on_attempts` fires once per choice with
/// the full attempt log, success or not.
pub trait SessionHooks: Send + Sync {
    /// The context changed; a persistence collaborator may snapshot it.
    fn on_session_updated(&self, _context: &StoryContext) {}

    /// The attempt log for one routing decision, for telemetry handoff.
    fn on_attempts(&self, _attempts: &[GenerationAttempt]) {}
}

/// Hooks that do nothing.
pub struct NullHooks;

impl SessionHooks for NullHooks {}

/// Hooks that report through tracing.
pub struct LogHooks;

impl SessionHooks for LogHooks {
    fn on_session_updated(&self, context: &StoryContext) {
        tracing::info!(
            session = %context.session_id,
            beats = context.len(),
            "session updated"
        );
    }

    fn on_attempts(&self, attempts: &[GenerationAttempt]) {
        let succeeded = attempts.iter().any(|a| a.outcome.is_success());
        tracing::info!(
            attempts = attempts.len(),
            succeeded,
            "generation attempts recorded"
        );
    }
}
