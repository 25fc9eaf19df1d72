//! Story session engine with provider failover.
//!
//! This crate provides:
//! - Append-only story context with bounded, deterministic prompt assembly
//! - A closed set of narrative provider adapters over hosted backends
//! - Sequential failover routing with per-attempt timeouts and validation
//! - A per-session state machine coordinating generation, persistence
//!   hooks, and telemetry handoff
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use tale_core::{
//!     AnthropicProvider, Choice, FailoverRouter, ProviderDescriptor, SessionCoordinator,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let primary = AnthropicProvider::from_env(ProviderDescriptor::new("anthropic", 1))?;
//!     let router = FailoverRouter::new(vec![Arc::new(primary)]);
//!
//!     let session = SessionCoordinator::new(router);
//!     session.start("cave-of-echoes")?;
//!
//!     let beat = session.choose(Choice::Yes).await?;
//!     println!("{}", beat.narrative);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod context;
pub mod persist;
pub mod provider;
pub mod router;
pub mod session;
pub mod telemetry;
pub mod testing;

// Primary public API
pub use config::{ConfigError, ProvidersConfig};
pub use context::{estimate_tokens, Choice, PromptLimits, SessionId, StoryBeat, StoryContext};
pub use persist::{JsonStore, PersistError, SavedSession, SnapshotHooks};
pub use provider::{
    validate_response, AnthropicProvider, OpenAiProvider, ProviderAdapter, ProviderDescriptor,
    ProviderError, ProviderErrorKind,
};
pub use router::{
    AttemptOutcome, FailoverRouter, Generation, GenerationAttempt, GenerationError, RouterConfig,
};
pub use session::{validate_seed, SessionCoordinator, SessionError, SessionState};
pub use telemetry::{LogHooks, NullHooks, SessionHooks};
pub use testing::{RecordingHooks, ScriptedProvider, TestHarness};
