//! Client module - generation service boundary.
//!
//! A service turns one prompt into one text response. Clients make exactly
//! one HTTP request per call; retries belong to the processor.

mod anthropic;
mod chat_completions;

pub use anthropic::*;
pub use chat_completions::*;

use crate::models::{Config, ConfigError, Provider, Result, ServiceError};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::Deserialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Text produced by a single generation call.
#[derive(Debug, Clone)]
pub struct Generation {
    /// Response text, expected to hold the JSON question array
    pub text: String,
    /// Model that answered (may differ from requested)
    pub model: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    /// Request duration
    pub duration: Duration,
}

/// External service that synthesizes trivia from a prompt.
#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Send `prompt` and return the raw response text.
    ///
    /// Transport, auth and rate-limit failures surface as
    /// [`crate::TriviaError::Service`].
    async fn generate(&self, prompt: &str) -> Result<Generation>;

    /// Model identifier, for logging.
    fn model(&self) -> &str;
}

/// Credential header value, checked once when a client is built.
///
/// A key that cannot travel in a header is a configuration mistake, not a
/// per-request failure.
fn credential_header(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value).map_err(|_| {
        ConfigError::Invalid(
            "service API key contains characters not allowed in an HTTP header".into(),
        )
    })?;
    header.set_sensitive(true);
    Ok(header)
}

/// Build the service selected by `config.service.provider`.
pub fn from_config(config: &Config) -> Result<Arc<dyn GenerationService>> {
    let api_key = config.resolve_api_key()?;
    let service = &config.service;

    Ok(match service.provider {
        Provider::Anthropic => Arc::new(AnthropicClient::new(
            api_key,
            service.resolved_base_url(),
            service.model.clone(),
            service.max_tokens,
            service.temperature,
            service.timeout(),
        )?),
        Provider::OpenaiCompatible => Arc::new(ChatCompletionsClient::new(
            Some(api_key),
            service.resolved_base_url(),
            service.model.clone(),
            service.max_tokens,
            service.temperature,
            service.timeout(),
        )?),
    })
}

/// Error body shape shared by Anthropic and OpenAI-compatible APIs.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Map a non-success HTTP response onto a [`ServiceError`].
fn status_error(status: u16, headers: &HeaderMap, body: String, model: &str) -> ServiceError {
    let message = serde_json::from_str::<ApiErrorResponse>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    match status {
        401 => ServiceError::AuthenticationFailed,
        404 => ServiceError::ModelNotFound(model.to_string()),
        429 => ServiceError::RateLimited {
            message,
            retry_after_secs: headers
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<f64>().ok()),
        },
        _ => ServiceError::Api { status, message },
    }
}

/// Map a transport failure onto a [`ServiceError`].
fn transport_error(err: reqwest::Error, timeout: Duration) -> ServiceError {
    if err.is_timeout() {
        ServiceError::Timeout(timeout)
    } else {
        ServiceError::Network(err)
    }
}

/// Running token totals for a client.
#[derive(Debug, Default)]
pub struct UsageTracker {
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    requests: AtomicU64,
}

impl UsageTracker {
    fn record(&self, input_tokens: u32, output_tokens: u32) {
        self.input_tokens
            .fetch_add(input_tokens as u64, Ordering::Relaxed);
        self.output_tokens
            .fetch_add(output_tokens as u64, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
    }

    /// (input, output) tokens across successful requests.
    pub fn total_tokens(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Number of successful requests.
    pub fn requests(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }
}
