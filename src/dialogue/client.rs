use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::BotError;

use super::prompt::Prompt;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "o4-mini";

/// Attempts per generation call, first try included.
pub const MAX_ATTEMPTS: u32 = 3;

// -- Error taxonomy ----------------------------------------------------------

/// Closed set of generation failure kinds. Values stay tagged inside the
/// pipeline; only the facade renders them into a user-visible string.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GenerationError {
    /// No API key configured. Detected before any network call.
    #[error("OPENAI_API_KEY is not set")]
    ConfigMissing,

    /// The service rejected the credential. Retrying cannot help.
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// The service asked us to slow down.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Connection failures and 5xx-style service faults.
    #[error("{0}")]
    Transient(String),

    /// A success-shaped response that is unusable (empty or undecodable).
    /// Never retried.
    #[error("{0}")]
    Malformed(String),
}

impl GenerationError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            GenerationError::RateLimited(_)
                | GenerationError::Timeout
                | GenerationError::Transient(_)
        )
    }
}

// -- Backend trait -----------------------------------------------------------

/// One completion round-trip. Implemented by the HTTP backend and by
/// scripted mocks in tests; the retry loop only sees this seam.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError>;
}

// -- Retry loop --------------------------------------------------------------

/// Backoff before re-attempting: 1.5 s after the first failure, 3.0 s
/// after the second.
pub fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(1500 * u64::from(attempt))
}

/// Run a completion with up to [`MAX_ATTEMPTS`] attempts and linear
/// backoff. Attempts are strictly sequential; an in-flight attempt is
/// never cancelled. Non-retryable failures and empty-but-successful
/// responses return immediately.
pub async fn complete_with_retry(
    backend: &dyn CompletionBackend,
    prompt: &Prompt,
) -> Result<String, GenerationError> {
    let mut last_err: Option<GenerationError> = None;

    for attempt in 1..=MAX_ATTEMPTS {
        match backend.complete(prompt).await {
            Ok(text) => {
                let text = text.trim().to_string();
                if text.is_empty() {
                    // Success-shaped failure: surface it, do not retry.
                    return Err(GenerationError::Malformed("AI returned empty text.".into()));
                }
                return Ok(text);
            }
            Err(err) if !err.is_retryable() => return Err(err),
            Err(err) => {
                warn!(attempt, error = %err, "completion attempt failed");
                last_err = Some(err);
                if attempt < MAX_ATTEMPTS {
                    tokio::time::sleep(backoff_delay(attempt)).await;
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| GenerationError::Transient(String::new())))
}

// -- OpenAI-compatible HTTP backend ------------------------------------------

/// Completion backend speaking the OpenAI-compatible chat completions API.
///
/// Configuration priority (highest to lowest):
///   1. Environment variables (`OPENAI_API_KEY`, `DIALOGUE_MODEL`,
///      `OPENAI_BASE_URL`)
///   2. `[llm]` section of `config.toml`
///   3. Built-in defaults
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
}

#[derive(Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

impl OpenAiBackend {
    /// Build the backend from config. Returns `Ok(None)` when no API key
    /// is configured; the caller degrades to diagnostics instead of
    /// refusing to start.
    pub fn from_config(config: &Config) -> crate::error::Result<Option<Self>> {
        let api_key = match std::env::var("OPENAI_API_KEY").ok().or_else(|| {
            if config.llm.api_key.is_empty() {
                None
            } else {
                Some(config.llm.api_key.clone())
            }
        }) {
            Some(key) => key,
            None => return Ok(None),
        };

        let base_url = std::env::var("OPENAI_BASE_URL")
            .ok()
            .or_else(|| {
                if config.llm.base_url.is_empty() {
                    None
                } else {
                    Some(config.llm.base_url.clone())
                }
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
            .trim_end_matches('/')
            .to_string();

        let model = std::env::var("DIALOGUE_MODEL")
            .ok()
            .or_else(|| {
                if config.llm.model.is_empty() {
                    None
                } else {
                    Some(config.llm.model.clone())
                }
            })
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let timeout_secs = config.llm.timeout_secs;

        let client = Client::builder()
            .timeout(if timeout_secs > 0 {
                Duration::from_secs(timeout_secs)
            } else {
                Duration::from_secs(30)
            })
            .build()
            .map_err(|e| BotError::Config(format!("failed to create HTTP client: {e}")))?;

        info!(
            model = %model,
            base_url = %base_url,
            max_tokens = config.llm.max_tokens,
            temperature = config.llm.temperature,
            timeout_secs,
            "dialogue backend initialized"
        );

        Ok(Some(Self {
            client,
            api_key,
            base_url,
            model,
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
        }))
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    async fn complete(&self, prompt: &Prompt) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: prompt.system.clone(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.user.clone(),
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        debug!(
            model = %self.model,
            prompt_len = prompt.user.len(),
            max_tokens = self.max_tokens,
            "invoking completion API"
        );

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(classify_request_error)?;

        let status = resp.status();

        if !status.is_success() {
            let error_text = resp.text().await.unwrap_or_default();
            let message = match serde_json::from_str::<ErrorResponse>(&error_text) {
                Ok(err_resp) => err_resp
                    .error
                    .map(|e| e.message)
                    .unwrap_or_else(|| error_text.clone()),
                Err(_) => error_text,
            };
            warn!(status = %status, error = %message, "completion API error");
            return Err(classify_status(status, message));
        }

        let chat_resp: ChatResponse = resp.json().await.map_err(|e| {
            GenerationError::Malformed(format!("failed to decode AI response: {e}"))
        })?;

        let text = chat_resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .unwrap_or_default()
            .trim()
            .to_string();

        info!(response_len = text.len(), model = %self.model, "completion received");

        Ok(text)
    }
}

fn classify_request_error(err: reqwest::Error) -> GenerationError {
    if err.is_timeout() {
        GenerationError::Timeout
    } else {
        GenerationError::Transient(format!("request failed: {err}"))
    }
}

fn classify_status(status: StatusCode, message: String) -> GenerationError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => GenerationError::AuthFailed(message),
        StatusCode::TOO_MANY_REQUESTS => GenerationError::RateLimited(message),
        _ => GenerationError::Transient(format!("service returned {status}: {message}")),
    }
}
