//! Chat model seam and the OpenAI-compatible client

use crate::config::{LlmConfig, LlmError};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Instant;
use ywt_core::CapabilityError;

/// Single-turn chat completion
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Complete `user` under the `system` instruction, returning the reply text
    async fn complete(&self, system: &str, user: &str) -> Result<String, CapabilityError>;
}

/// Client for `POST {base_url}/chat/completions`
#[derive(Clone)]
pub struct OpenAiChat {
    config: LlmConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// Create client from config
    ///
    /// # Errors
    /// `LlmError::MissingApiKey` without a key; `LlmError::Client` if the
    /// HTTP client cannot be built.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or(LlmError::MissingApiKey)?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| LlmError::Client(e.to_string()))?;
        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Get configuration
    #[must_use]
    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn build_request_body(&self, system: &str, user: &str) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
        });
        if let Some(max_tokens) = self.config.max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }
        body
    }

    fn map_send_error(&self, err: &reqwest::Error) -> CapabilityError {
        if err.is_timeout() {
            CapabilityError::Timeout {
                duration_secs: self.config.request_timeout_secs,
            }
        } else {
            CapabilityError::transport(err.to_string(), err.is_connect() || err.is_request())
        }
    }
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChatModel for OpenAiChat {
    async fn complete(&self, system: &str, user: &str) -> Result<String, CapabilityError> {
        let started = Instant::now();
        let body = self.build_request_body(system, user);

        let response = self
            .client
            .post(self.config.endpoint())
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_send_error(&e))?;

        let status = response.status().as_u16();
        let body_text = response.text().await.map_err(|e| self.map_send_error(&e))?;

        if !(200..300).contains(&status) {
            tracing::warn!(status, model = %self.config.model, "chat completion failed");
            return Err(parse_http_error(status, &body_text));
        }

        let content = parse_completion(&body_text)?;
        tracing::debug!(
            model = %self.config.model,
            elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            chars = content.len(),
            "chat completion"
        );
        Ok(content)
    }
}

/// Map a non-success HTTP status to a capability error
#[must_use]
pub fn parse_http_error(status: u16, body: &str) -> CapabilityError {
    match status {
        401 => CapabilityError::Rejected(format!("invalid API key: {body}")),
        403 => CapabilityError::Rejected(format!("access denied: {body}")),
        400 | 404 | 422 => CapabilityError::Rejected(format!("HTTP {status}: {body}")),
        429 => CapabilityError::transport(format!("rate limited: {body}"), true),
        500..=599 => CapabilityError::transport(format!("server error {status}: {body}"), true),
        _ => CapabilityError::transport(format!("HTTP {status}: {body}"), false),
    }
}

/// Completions response, only the fields read here
#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Extract the first choice's text
fn parse_completion(body: &str) -> Result<String, CapabilityError> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| CapabilityError::malformed(format!("failed to parse response: {e}")))?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| CapabilityError::malformed("response has no message content"))
}
