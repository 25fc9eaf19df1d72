//! Anthropic Messages API client.
//!
//! Covers exactly what the story engine needs: send one prompt, get one
//! block of narrative text back.

use crate::{Completion, Error, NarrativeRequest, Usage};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

const API_BASE: &str = "https://api.anthropic.com/v1";
const API_VERSION: &str = "2023-06-01";
const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// Anthropic API client.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl Client {
    /// Create a new client with the given API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .connect_timeout(std::time::Duration::from_secs(10))
                .build()
                .expect("Failed to build HTTP client"),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Create a client from the ANTHROPIC_API_KEY environment variable.
    pub fn from_env() -> Result<Self, Error> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").map_err(|_| Error::NoApiKey)?;
        Ok(Self::new(api_key))
    }

    /// Set the model for this client.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// The model this client generates with.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a completion request and return the generated text.
    pub async fn complete(&self, request: NarrativeRequest) -> Result<Completion, Error> {
        let payload = ApiRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            messages: vec![ApiMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
        };

        let response = self
            .http
            .post(format!("{API_BASE}/messages"))
            .headers(self.build_headers()?)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            if status.as_u16() == 429 {
                return Err(Error::RateLimited { message });
            }
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(e.to_string()))?;

        tracing::debug!(
            model = %self.model,
            input_tokens = body.usage.input_tokens,
            output_tokens = body.usage.output_tokens,
            "anthropic completion finished"
        );

        Ok(body.into_completion())
    }

    fn build_headers(&self) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| Error::Config(format!("Invalid API key: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        Ok(headers)
    }
}

// ============================================================================
// API wire types
// ============================================================================

#[derive(Serialize)]
struct ApiRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    messages: Vec<ApiMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ApiResponse {
    content: Vec<ApiContent>,
    usage: ApiUsage,
}

impl ApiResponse {
    fn into_completion(self) -> Completion {
        let text = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ApiContent::Text { text } => Some(text),
                ApiContent::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Completion {
            text,
            usage: Usage {
                input_tokens: self.usage.input_tokens,
                output_tokens: self.usage.output_tokens,
            },
        }
    }
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ApiContent {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct ApiUsage {
    input_tokens: usize,
    output_tokens: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_response() {
        let raw = serde_json::json!({
            "id": "msg_0123",
            "content": [
                {"type": "text", "text": "The door creaks open. (Y/N)"},
                {"type": "thinking", "thinking": "internal"}
            ],
            "usage": {"input_tokens": 42, "output_tokens": 11}
        });

        let response: ApiResponse = serde_json::from_value(raw).unwrap();
        let completion = response.into_completion();

        assert_eq!(completion.text, "The door creaks open. (Y/N)");
        assert_eq!(completion.usage.total(), 53);
    }

    #[test]
    fn test_request_shape() {
        let payload = ApiRequest {
            model: "claude-sonnet-4-20250514",
            max_tokens: 512,
            messages: vec![ApiMessage {
                role: "user",
                content: "hello",
            }],
            temperature: None,
        };

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["model"], "claude-sonnet-4-20250514");
        assert_eq!(value["messages"][0]["role"], "user");
        assert!(value.get("temperature").is_none());
    }
}
