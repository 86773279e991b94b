//! Error types for hero-trivia.
//!
//! Epistemic taxonomy:
//! - B_i falsified: Expected failures (bad input, unusable reply, bad config)
//! - I^B materialized: Service failures (auth, rate limit, network, timeout)
//! - K_i violated: Internal invariant violations (bugs)
//!
//! Falsified replies and materialized service failures consume one attempt
//! each; everything else stops the run.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for hero-trivia.
#[derive(Debug, Error)]
pub enum TriviaError {
    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED: Belief proven wrong (input, config, or a reply)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Format error: {0}")]
    Format(String),

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    /// Retryable: the reply was not a JSON question array
    #[error("Parse error: {0}")]
    Parse(String),

    /// Retryable: the reply had the wrong shape
    #[error("Validation error: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED: Bounded ignorance became known-bad
    // ═══════════════════════════════════════════════════════════════════

    /// Retryable
    #[error("Generation service error: {0}")]
    Service(#[from] ServiceError),

    #[error("Giving up on '{hero}' after {attempts} attempts: {last}")]
    RetriesExhausted {
        hero: String,
        attempts: u32,
        #[source]
        last: Box<TriviaError>,
    },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // K_i VIOLATED: Invariant broken (bug, should not happen)
    // ═══════════════════════════════════════════════════════════════════

    #[error("Internal error: {0}")]
    Internal(String),

    // ═══════════════════════════════════════════════════════════════════
    // I^B UNRESOLVABLE: Truly unknown failure
    // ═══════════════════════════════════════════════════════════════════

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Failures reported by the generation service boundary.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        retry_after_secs: Option<f64>,
    },

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl TriviaError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Whether this error consumes an attempt rather than stopping the run.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::Validation(_) | Self::Service(_))
    }

    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Format(_) => "format",
            Self::Config(_) => "config",
            Self::Parse(_) => "parse",
            Self::Validation(_) => "validation",
            Self::Service(_) => "service",
            Self::RetriesExhausted { .. } => "retries_exhausted",
            Self::Io { .. } => "io",
            Self::Internal(_) => "internal",
            Self::Unknown(_) => "unknown",
        }
    }

    /// Retry delay hint in seconds, if the service sent one.
    pub fn retry_after(&self) -> Option<f64> {
        match self {
            Self::Service(ServiceError::RateLimited {
                retry_after_secs, ..
            }) => *retry_after_secs,
            _ => None,
        }
    }
}

/// Result type alias for hero-trivia.
pub type Result<T> = std::result::Result<T, TriviaError>;
