//! Remote completion collaborator (OpenAI-compatible chat completions)

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use super::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use super::prompts::{render_user_message, SYSTEM_PROMPT};
use crate::config::AssistantConfig;
use crate::error::{ContextError, Result};
use crate::metrics::METRICS;

const OPERATION: &str = "complete";

/// Completion errors
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: HTTP {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Completion was empty")]
    EmptyCompletion,

    #[error("Circuit breaker is open: {0}")]
    CircuitOpen(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl CompletionError {
    /// Short label for logs, metrics and fallback notices
    pub fn reason(&self) -> &'static str {
        match self {
            CompletionError::Initialization(_) => "initialization",
            CompletionError::Network(_) => "network",
            CompletionError::Api { .. } => "api",
            CompletionError::EmptyCompletion => "empty",
            CompletionError::CircuitOpen(_) => "circuit_open",
            CompletionError::InvalidResponse(_) => "invalid_response",
        }
    }

    fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Network(_) => true,
            CompletionError::Api { status, .. } => {
                *status == StatusCode::TOO_MANY_REQUESTS.as_u16() || *status >= 500
            }
            _ => false,
        }
    }
}

/// Per-request overrides
#[derive(Debug, Clone, Default)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    pub system_prompt: Option<String>,
}

impl CompletionOptions {
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }
}

/// Produces a completion for a prompt and its context
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        context: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, CompletionError>;
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
pub struct OpenAiCompletionClient {
    http: Client,
    endpoint: String,
    api_key: SecretString,
    config: AssistantConfig,
    breaker: CircuitBreaker,
}

impl OpenAiCompletionClient {
    /// Create a client. Fails without an API key.
    pub fn new(config: AssistantConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.clone();

        let http = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| CompletionError::Initialization(e.to_string()))?;

        let breaker = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: config.circuit_breaker_failures,
            reset_timeout: config.breaker_reset_timeout(),
        });

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", config.api_url.trim_end_matches('/')),
            api_key,
            config,
            breaker,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    fn build_request(
        &self,
        prompt: &str,
        context: &str,
        options: &CompletionOptions,
    ) -> ChatCompletionRequest {
        let system = options
            .system_prompt
            .clone()
            .unwrap_or_else(|| SYSTEM_PROMPT.to_string());

        ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: Some(system),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: Some(render_user_message(context, prompt)),
                },
            ],
            max_tokens: Some(options.max_tokens.unwrap_or(self.config.max_tokens)),
            temperature: Some(options.temperature.unwrap_or(self.config.temperature)),
        }
    }

    async fn send_once(
        &self,
        request: &ChatCompletionRequest,
    ) -> std::result::Result<String, CompletionError> {
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(self.api_key.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(|e| CompletionError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(CompletionError::EmptyCompletion);
        }
        Ok(content)
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let base = self.config.retry_backoff_ms;
        Duration::from_millis(base.saturating_mul(1 << (attempt - 1).min(10)))
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletionClient {
    async fn complete(
        &self,
        prompt: &str,
        context: &str,
        options: &CompletionOptions,
    ) -> std::result::Result<String, CompletionError> {
        if self.breaker.is_open(OPERATION) {
            METRICS.circuit_open.inc();
            error!("Circuit breaker is open for completion requests");
            return Err(CompletionError::CircuitOpen(OPERATION.to_string()));
        }

        let request = self.build_request(prompt, context, options);
        let max_attempts = self.config.max_retries + 1;
        let start = Instant::now();

        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.send_once(&request).await {
                Ok(content) => {
                    self.breaker.mark_success(OPERATION);
                    debug!(
                        "Completion succeeded on attempt {} in {:?}",
                        attempt,
                        start.elapsed()
                    );
                    return Ok(content);
                }
                Err(e) => {
                    self.breaker.mark_failure(OPERATION);

                    if attempt >= max_attempts || !e.is_retryable() {
                        warn!("Completion failed after {} attempt(s): {}", attempt, e);
                        return Err(e);
                    }

                    let backoff = self.backoff(attempt);
                    warn!(
                        "Completion attempt {} failed: {}, retrying in {:?}",
                        attempt, e, backoff
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

impl From<CompletionError> for ContextError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Initialization(msg) => ContextError::Configuration(msg),
            other => ContextError::Completion(other),
        }
    }
}

// OpenAI-compatible API types
#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
