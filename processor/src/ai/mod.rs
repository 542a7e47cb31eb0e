//! AI module for charge selection and rewording.
//!
//! Talks to an OpenAI-compatible chat-completion endpoint. The pipeline only
//! depends on the [`ChatModel`] trait, so tests can swap the HTTP client for
//! a scripted fake.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use mugshot_charges::ai::{AiClient, ChatModel, ChatRequest};
//! use mugshot_charges::config::AiSettings;
//!
//! let client = AiClient::new(AiSettings::from_env(None)?)?;
//! client.verify_model().await?;
//! let text = client.complete(&ChatRequest::new("system", "user", 100, 0.2)).await?;
//! ```

pub mod prompt;

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::AiSettings;
use crate::error::{AiError, AiResult};

/// Default number of attempts per request
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Delay before the first retry; doubles on each further retry
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// One system/user prompt pair with generation limits.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl ChatRequest {
    pub fn new(
        system: impl Into<String>,
        user: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
            max_tokens,
            temperature,
        }
    }
}

/// Something that turns a prompt pair into a reply.
#[allow(async_fn_in_trait)]
pub trait ChatModel {
    /// Trimmed reply text, or the error of the last failed attempt.
    async fn complete(&self, request: &ChatRequest) -> AiResult<String>;
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: [Message<'a>; 2],
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// OpenAI API error response
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

// =============================================================================
// Client
// =============================================================================

/// Chat-completion API client
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    settings: AiSettings,
    max_retries: u32,
    retry_delay: Duration,
}

impl AiClient {
    /// Create a client from resolved settings
    pub fn new(settings: AiSettings) -> AiResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;

        Ok(Self {
            http,
            settings,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay: RETRY_BASE_DELAY,
        })
    }

    /// Set the number of attempts per request (at least one)
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the delay before the first retry
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    /// Check that the configured model exists and the key can use it.
    pub async fn verify_model(&self) -> AiResult<()> {
        let start = Instant::now();
        info!("Verifying model '{}'...", self.settings.model);

        let url = format!("{}/models/{}", self.settings.base_url, self.settings.model);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.settings.api_key)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(api_error(status, &body));
        }

        info!(
            "Model '{}' verified successfully in {:.2} seconds",
            self.settings.model,
            start.elapsed().as_secs_f64()
        );
        Ok(())
    }

    /// Single attempt, no retries
    async fn call_api(&self, request: &ChatRequest) -> AiResult<String> {
        let body = CompletionBody {
            model: &self.settings.model,
            messages: [
                Message {
                    role: "system",
                    content: &request.system,
                },
                Message {
                    role: "user",
                    content: &request.user,
                },
            ],
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        };

        let url = format!("{}/chat/completions", self.settings.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        debug!("Response status: {}", status);
        let text = response.text().await?;

        if !status.is_success() {
            return Err(api_error(status, &text));
        }

        parse_completion(&text)
    }
}

impl ChatModel for AiClient {
    async fn complete(&self, request: &ChatRequest) -> AiResult<String> {
        let mut last_error = None;

        for attempt in 1..=self.max_retries {
            info!(
                "Calling API (model: {}, attempt {}/{})...",
                self.settings.model, attempt, self.max_retries
            );
            let start = Instant::now();

            match self.call_api(request).await {
                Ok(text) => {
                    info!("API call successful in {:.2} seconds.", start.elapsed().as_secs_f64());
                    return Ok(text);
                }
                Err(e) => {
                    warn!("API error (attempt {}/{}): {}", attempt, self.max_retries, e);
                    last_error = Some(e);

                    if attempt < self.max_retries {
                        let delay = self.retry_delay * 2u32.pow(attempt - 1);
                        debug!("Retrying in {}ms...", delay.as_millis());
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        warn!("Max retries reached. API call failed.");
        Err(AiError::RetriesExhausted {
            attempts: self.max_retries,
            last: Box::new(last_error.unwrap_or(AiError::EmptyResponse)),
        })
    }
}

/// Build an [`AiError::ApiError`] from a non-success response.
fn api_error(status: reqwest::StatusCode, body: &str) -> AiError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(500).collect());

    AiError::ApiError {
        status: status.as_u16(),
        message,
    }
}

/// Extract the first choice's text from a completion response body.
fn parse_completion(body: &str) -> AiResult<String> {
    let response: CompletionResponse =
        serde_json::from_str(body).map_err(|e| AiError::InvalidJson(e.to_string()))?;

    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|t| t.trim().to_string())
        .unwrap_or_default();

    if text.is_empty() {
        return Err(AiError::EmptyResponse);
    }
    Ok(text)
}
