//! Session persistence collaborator.
//!
//! Writes a versioned snapshot of session state as JSON. Durability,
//! offline queuing, and retry belong to the embedding application; this
//! store only round-trips the snapshot it is given.

use crate::context::StoryContext;
use crate::session::SessionState;
use crate::telemetry::SessionHooks;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;
use tokio::fs;

/// Current save file version.
const SAVE_VERSION: u32 = 1;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum PersistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },
}

/// A saved session with all state needed to resume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedSession {
    /// Save format version for compatibility checking.
    pub version: u32,

    /// When the save was created.
    pub saved_at: DateTime<Utc>,

    /// Lifecycle state at save time.
    pub state: SessionState,

    /// The full story context.
    pub context: StoryContext,
}

/// JSON-file persistence collaborator.
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    /// Create a store backed by the given file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Write a snapshot, replacing any previous save.
    pub async fn save(
        &self,
        state: SessionState,
        context: &StoryContext,
    ) -> Result<(), PersistError> {
        let saved = SavedSession {
            version: SAVE_VERSION,
            saved_at: Utc::now(),
            state,
            context: context.clone(),
        };

        let content = serde_json::to_string_pretty(&saved)?;
        fs::write(&self.path, content).await?;

        tracing::debug!(path = %self.path.display(), "session saved");
        Ok(())
    }

    /// Read the snapshot back, rejecting unknown versions.
    pub async fn load(&self) -> Result<SavedSession, PersistError> {
        let content = fs::read_to_string(&self.path).await?;
        let saved: SavedSession = serde_json::from_str(&content)?;

        if saved.version != SAVE_VERSION {
            return Err(PersistError::VersionMismatch {
                expected: SAVE_VERSION,
                found: saved.version,
            });
        }

        Ok(saved)
    }
}

/// Hook adapter that retains the most recent context snapshot.
///
/// For collaborators that flush asynchronously: the session fires the
/// hook synchronously, the application drains the snapshot on its own
/// schedule with [`SnapshotHooks::take`].
#[derive(Default)]
pub struct SnapshotHooks {
    latest: Mutex<Option<StoryContext>>,
}

impl SnapshotHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the most recent snapshot, if any.
    pub fn take(&self) -> Option<StoryContext> {
        self.latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl SessionHooks for SnapshotHooks {
    fn on_session_updated(&self, context: &StoryContext) {
        *self
            .latest
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(context.clone());
    }
}
