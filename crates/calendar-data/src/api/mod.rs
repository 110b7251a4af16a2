//! External content provider.
//!
//! Profile and personal-event generation call out to a language model
//! through the [`ContentProvider`] contract: a free-text prompt plus an
//! optional JSON schema in, a JSON document out. Callers treat any error as
//! "skip this unit". [`ChatCompletionsProvider`] talks to an
//! OpenAI-compatible `/chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::ProviderConfig;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("Provider temporarily unavailable: {0}")]
    Retryable(String),
    #[error("Provider rejected request: {0}")]
    Fatal(String),
    #[error("Malformed provider response: {0}")]
    Malformed(String),
    #[error("API key not set in {0}")]
    MissingApiKey(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::Retryable(_) => true,
            ProviderError::Request(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// One request to the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    pub prompt: String,
    /// Name and JSON schema the response should follow.
    pub schema: Option<(String, Value)>,
}

impl ContentRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
        }
    }

    pub fn with_schema(mut self, name: impl Into<String>, schema: Value) -> Self {
        self.schema = Some((name.into(), schema));
        self
    }
}

/// Produces JSON content for a prompt.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    async fn generate(&self, request: &ContentRequest) -> Result<Value, ProviderError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    response_format: Value,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

const SYSTEM_PROMPT: &str =
    "You generate realistic fictional data for a company calendar. Respond with JSON only.";

/// OpenAI-compatible chat completions client.
pub struct ChatCompletionsProvider {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    max_attempts: u32,
}

impl ChatCompletionsProvider {
    /// Creates a provider, reading the API key from the configured variable.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| ProviderError::MissingApiKey(config.api_key_env.clone()))?;
        Ok(Self::new(config, api_key))
    }

    pub fn new(config: &ProviderConfig, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            max_attempts: config.max_attempts.max(1),
        }
    }

    async fn request_once(&self, request: &ContentRequest) -> Result<Value, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let response_format = match &request.schema {
            Some((name, schema)) => serde_json::json!({
                "type": "json_schema",
                "json_schema": { "name": name, "schema": schema },
            }),
            None => serde_json::json!({ "type": "json_object" }),
        };
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &request.prompt,
                },
            ],
            response_format,
        };

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = format!("Status {status}: {text}");
            return Err(
                if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    ProviderError::Retryable(message)
                } else {
                    ProviderError::Fatal(message)
                },
            );
        }

        let chat: ChatResponse = resp.json().await?;
        let content = chat
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| ProviderError::Malformed("response has no content".to_string()))?;

        serde_json::from_str(&content).map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

#[async_trait]
impl ContentProvider for ChatCompletionsProvider {
    async fn generate(&self, request: &ContentRequest) -> Result<Value, ProviderError> {
        let mut attempt = 1;
        loop {
            match self.request_once(request).await {
                Ok(value) => {
                    debug!("Provider responded on attempt {}", attempt);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < self.max_attempts => {
                    warn!("Provider attempt {} failed, retrying: {}", attempt, e);
                    tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ProviderError::Retryable("503".into()).is_retryable());
        assert!(!ProviderError::Fatal("400".into()).is_retryable());
        assert!(!ProviderError::Malformed("not json".into()).is_retryable());
    }

    #[test]
    fn test_request_builder() {
        let request = ContentRequest::new("hello")
            .with_schema("profile", serde_json::json!({ "type": "object" }));
        assert_eq!(request.prompt, "hello");
        assert_eq!(request.schema.unwrap().0, "profile");
    }

    #[test]
    fn test_missing_api_key() {
        let config = ProviderConfig {
            api_key_env: "CALENDAR_DATA_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            ChatCompletionsProvider::from_config(&config),
            Err(ProviderError::MissingApiKey(_))
        ));
    }

    #[test]
    fn test_base_url_trimmed() {
        let config = ProviderConfig {
            base_url: "http://localhost:8080/v1/".to_string(),
            ..Default::default()
        };
        let provider = ChatCompletionsProvider::new(&config, "key");
        assert_eq!(provider.base_url, "http://localhost:8080/v1");
    }
}
