//! Minimal HTTP clients for hosted narrative-generation APIs.
//!
//! Each module is a focused client for one backend's completion API:
//! non-streaming, text in, text out, with explicit errors. The adapters
//! in `tale-core` wrap these clients behind a uniform trait; nothing in
//! this crate knows about sessions, routing, or validation.

pub mod anthropic;
pub mod openai;

use thiserror::Error;

/// Errors that can occur when calling a backend.
#[derive(Debug, Error)]
pub enum Error {
    #[error("API key not configured")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Rate limited: {message}")]
    RateLimited { message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// A single-shot completion request, shared by all backends.
#[derive(Debug, Clone)]
pub struct NarrativeRequest {
    /// The full prompt, already assembled by the caller.
    pub prompt: String,

    /// Maximum tokens to generate.
    pub max_tokens: usize,

    /// Temperature (0.0 - 1.0).
    pub temperature: Option<f32>,
}

impl NarrativeRequest {
    /// Create a request with default generation settings.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            max_tokens: 1024,
            temperature: None,
        }
    }

    /// Set max tokens for the response.
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set temperature for generation.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature.clamp(0.0, 1.0));
        self
    }
}

/// A completed generation.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Generated text.
    pub text: String,

    /// Token usage reported by the backend.
    pub usage: Usage,
}

/// Token usage statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl Usage {
    /// Get total tokens used.
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}
