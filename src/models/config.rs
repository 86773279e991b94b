//! Configuration models for hero-trivia.
//!
//! Every section is optional; a missing config file yields the defaults the
//! batch job has always run with.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration for hero-trivia.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Generation service endpoint
    #[serde(default)]
    pub service: ServiceConfig,

    /// Prompt and validation settings
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Retry policy for a single record
    #[serde(default)]
    pub retry: RetryConfig,

    /// File locations
    #[serde(default)]
    pub paths: PathsConfig,
}

/// Wire protocol spoken by the generation service.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    /// Anthropic Messages API
    #[default]
    Anthropic,
    /// OpenAI-compatible chat completions (OpenRouter, vLLM, Ollama, ...)
    OpenaiCompatible,
}

/// Generation service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub provider: Provider,

    /// API key (may contain ${ENV_VAR} placeholders)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Base URL; defaults depend on the provider
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f64,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_model() -> String {
    "claude-3-sonnet-20240229".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f64 {
    0.2
}

fn default_timeout() -> u64 {
    180
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_timeout(),
        }
    }
}

impl ServiceConfig {
    /// Base URL, falling back to the provider's public endpoint.
    pub fn resolved_base_url(&self) -> String {
        match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => match self.provider {
                Provider::Anthropic => "https://api.anthropic.com".to_string(),
                Provider::OpenaiCompatible => "https://openrouter.ai/api/v1".to_string(),
            },
        }
    }

    /// Environment variable consulted when no explicit key is configured.
    pub fn resolved_api_key_env(&self) -> String {
        match &self.api_key_env {
            Some(var) => var.clone(),
            None => match self.provider {
                Provider::Anthropic => "ANTHROPIC_API_KEY".to_string(),
                Provider::OpenaiCompatible => "OPENROUTER_API_KEY".to_string(),
            },
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Prompt and validation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Questions required per hero
    #[serde(default = "default_question_count")]
    pub question_count: usize,

    /// Maximum words allowed in an answer
    #[serde(default = "default_max_answer_words")]
    pub max_answer_words: usize,

    /// Entities that must not appear as employment options
    #[serde(default = "default_excluded_options")]
    pub excluded_options: Vec<String>,

    /// Reject questions without exactly four options or whose answer is not an option
    #[serde(default = "default_true")]
    pub strict_items: bool,

    /// Optional file replacing the built-in instruction block
    #[serde(default)]
    pub prompt_template: Option<PathBuf>,
}

fn default_question_count() -> usize {
    crate::models::DEFAULT_QUESTION_COUNT
}

fn default_max_answer_words() -> usize {
    5
}

fn default_excluded_options() -> Vec<String> {
    ["Amazon", "Google", "AWS", "Microsoft"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_true() -> bool {
    true
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            max_answer_words: default_max_answer_words(),
            excluded_options: default_excluded_options(),
            strict_items: true,
            prompt_template: None,
        }
    }
}

/// Delay growth between attempts.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backoff {
    #[default]
    Fixed,
    Exponential,
}

/// Largest accepted retry delay, in seconds (one day).
pub const MAX_RETRY_DELAY_SECS: f64 = 86_400.0;

/// Retry policy configuration.
///
/// I^B: Service failures are retried a bounded number of times.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the second attempt, in seconds
    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    #[serde(default)]
    pub backoff: Backoff,

    /// Growth factor for exponential backoff
    #[serde(default = "default_factor")]
    pub factor: f64,

    /// Upper bound on any single delay, in seconds
    #[serde(default = "default_max_delay_secs")]
    pub max_delay_secs: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_delay_secs() -> f64 {
    5.0
}

fn default_factor() -> f64 {
    2.0
}

fn default_max_delay_secs() -> f64 {
    60.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            delay_secs: default_delay_secs(),
            backoff: Backoff::default(),
            factor: default_factor(),
            max_delay_secs: default_max_delay_secs(),
        }
    }
}

/// How the output document is persisted after each success.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceMode {
    /// Rewrite the whole JSON document
    #[default]
    Rewrite,
    /// Append one JSON line per success; compact later
    AppendLog,
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_input")]
    pub input: PathBuf,

    #[serde(default = "default_output")]
    pub output: PathBuf,

    #[serde(default = "default_checkpoint")]
    pub checkpoint: PathBuf,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    #[serde(default)]
    pub persistence: PersistenceMode,
}

fn default_input() -> PathBuf {
    PathBuf::from("aws_heroes.json")
}

fn default_output() -> PathBuf {
    PathBuf::from("aws_heroes_questions.json")
}

fn default_checkpoint() -> PathBuf {
    PathBuf::from("processing_state.json")
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            input: default_input(),
            output: default_output(),
            checkpoint: default_checkpoint(),
            log_dir: default_log_dir(),
            persistence: PersistenceMode::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.to_owned(),
            source: e,
        })?;

        Self::from_toml(&content).map_err(|e| ConfigError::Parse {
            path: path.to_owned(),
            source: e,
        })
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load the file if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Resolve the API key from config or environment.
    ///
    /// B_i(api key available) → Result
    pub fn resolve_api_key(&self) -> Result<String, ConfigError> {
        if let Some(key) = &self.service.api_key {
            return Ok(expand_env_vars(key));
        }

        let env_var = self.service.resolved_api_key_env();
        match std::env::var(&env_var) {
            Ok(key) if !key.trim().is_empty() => Ok(key),
            _ => Err(ConfigError::MissingApiKey { env_var }),
        }
    }

    /// Check values that serde cannot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        for (name, secs) in [
            ("retry.delay_secs", self.retry.delay_secs),
            ("retry.max_delay_secs", self.retry.max_delay_secs),
        ] {
            if !(0.0..=MAX_RETRY_DELAY_SECS).contains(&secs) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be between 0 and {MAX_RETRY_DELAY_SECS}, got {secs}"
                )));
            }
        }
        if !self.retry.factor.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "retry.factor must be a finite number, got {}",
                self.retry.factor
            )));
        }
        if self.retry.backoff == Backoff::Exponential && self.retry.factor < 1.0 {
            return Err(ConfigError::Invalid(
                "retry.factor must be >= 1.0 for exponential backoff".to_string(),
            ));
        }
        if self.generation.question_count == 0 {
            return Err(ConfigError::Invalid(
                "generation.question_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand environment variables in a string.
///
/// Supports ${VAR_NAME} syntax.
/// If the variable is not set, the placeholder is left unchanged.
pub fn expand_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    let Ok(re) = regex::Regex::new(r"\$\{([^}]+)\}") else {
        return result;
    };

    for cap in re.captures_iter(s) {
        if let Ok(value) = std::env::var(&cap[1]) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing API key: set {env_var} env var or service.api_key in config")]
    MissingApiKey { env_var: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
