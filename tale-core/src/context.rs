//! Story context and prompt assembly.
//!
//! Holds the ordered beat history for one session and turns it into a
//! bounded prompt. Pure data and transformation functions, no I/O.
//! Context is only ever grown by appending; the seed never changes after
//! session start.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Base narrator instructions prepended to every prompt.
const NARRATOR_BASE: &str = include_str!("prompts/narrator_base.txt");

/// Unique identifier for a story session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generate a fresh session id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A player's binary choice at a story branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Choice {
    #[serde(rename = "Y")]
    Yes,
    #[serde(rename = "N")]
    No,
}

impl Choice {
    /// Parse a choice from player input. Accepts `Y`/`N` and
    /// `yes`/`no`, case-insensitively.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_ascii_uppercase().as_str() {
            "Y" | "YES" => Some(Self::Yes),
            "N" | "NO" => Some(Self::No),
            _ => None,
        }
    }

    /// The canonical single-letter form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Yes => "Y",
            Self::No => "N",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved choice-and-narrative unit in a session's history.
///
/// Immutable once appended to a context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryBeat {
    /// The choice the player made.
    pub choice: Choice,

    /// The narrative the provider generated for it.
    pub narrative: String,

    /// Which provider produced the narrative.
    pub provider_id: String,

    /// When the beat was recorded.
    pub recorded_at: DateTime<Utc>,
}

impl StoryBeat {
    /// Create a beat stamped with the current time.
    pub fn new(
        choice: Choice,
        narrative: impl Into<String>,
        provider_id: impl Into<String>,
    ) -> Self {
        Self {
            choice,
            narrative: narrative.into(),
            provider_id: provider_id.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Limits applied when assembling a prompt.
#[derive(Debug, Clone)]
pub struct PromptLimits {
    /// Most recent beats kept verbatim; older beats are condensed.
    pub max_verbatim_beats: usize,
}

impl Default for PromptLimits {
    fn default() -> Self {
        Self {
            max_verbatim_beats: 10,
        }
    }
}

/// The full story state for one session.
///
/// The seed is immutable once set and history is append-only: `append`
/// returns a new value rather than mutating shared state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryContext {
    /// The session this context belongs to.
    pub session_id: SessionId,

    seed: String,

    history: Vec<StoryBeat>,

    /// Summary of beats condensed out of the prompt window, if any.
    pub derived_summary: Option<String>,
}

impl StoryContext {
    /// Create a fresh context anchored on the given seed.
    ///
    /// Seed validation happens in the session coordinator before this is
    /// called.
    pub fn new(seed: impl Into<String>) -> Self {
        Self {
            session_id: SessionId::new(),
            seed: seed.into(),
            history: Vec::new(),
            derived_summary: None,
        }
    }

    /// The seed this session was anchored on.
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// The ordered beat history.
    pub fn history(&self) -> &[StoryBeat] {
        &self.history
    }

    /// Number of beats recorded so far.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether any beats have been recorded.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// Return a new context with the beat appended.
    ///
    /// The original context is untouched; append order is preserved.
    pub fn append(&self, beat: StoryBeat) -> StoryContext {
        let mut next = self.clone();
        next.history.push(beat);
        next
    }

    /// Assemble the bounded prompt for the next generation.
    ///
    /// Deterministic: the same context and limits always produce the
    /// same string. The seed and the most recent beats stay verbatim;
    /// when history exceeds the limit, the middle is condensed into a
    /// short recap.
    pub fn build_prompt(&self, limits: &PromptLimits) -> String {
        let mut prompt = String::new();
        prompt.push_str(NARRATOR_BASE);

        prompt.push_str("\n## Story Seed\n");
        prompt.push_str(&self.seed);
        prompt.push('\n');

        if let Some(ref summary) = self.derived_summary {
            prompt.push_str("\n## Previously\n");
            prompt.push_str(summary);
            prompt.push('\n');
        }

        if self.history.is_empty() {
            return prompt;
        }

        let verbatim_start = self
            .history
            .len()
            .saturating_sub(limits.max_verbatim_beats.max(1));

        if verbatim_start > 0 {
            prompt.push_str("\n## Earlier Beats (condensed)\n");
            prompt.push_str(&condense_beats(&self.history[..verbatim_start]));
        }

        prompt.push_str("\n## Story So Far\n");
        for beat in &self.history[verbatim_start..] {
            prompt.push_str(&format!("Player chose: {}\n", beat.choice));
            prompt.push_str(&beat.narrative);
            prompt.push_str("\n\n");
        }

        prompt
    }
}

/// Condense old beats into a compact recap block.
fn condense_beats(beats: &[StoryBeat]) -> String {
    let mut recap = format!("{} earlier beats:\n", beats.len());
    for beat in beats {
        let snippet: String = beat.narrative.chars().take(80).collect();
        let ellipsis = if beat.narrative.chars().count() > 80 {
            "..."
        } else {
            ""
        };
        recap.push_str(&format!("- [{}] {snippet}{ellipsis}\n", beat.choice));
    }
    recap
}

/// Rough token estimate used for cost accounting handoff.
pub fn estimate_tokens(text: &str) -> usize {
    text.len().div_ceil(4).max(1)
}
