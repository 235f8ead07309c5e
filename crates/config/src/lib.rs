//! Configuration loading, validation, and management for Wayfarer.
//!
//! Loads configuration from `~/.wayfarer/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.wayfarer/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Reasoning provider settings
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Agent loop policy
    #[serde(default)]
    pub agent: AgentConfig,

    /// External capability settings
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,

    /// HTTP gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

fn default_true() -> bool {
    true
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// openai | openrouter | gemini | ollama | custom
    #[serde(default = "default_provider_kind")]
    pub kind: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL override (required for `custom`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    /// Temperature used when asking for the next action
    #[serde(default = "default_decision_temperature")]
    pub decision_temperature: f32,

    /// Temperature used for the final answer
    #[serde(default = "default_synthesis_temperature")]
    pub synthesis_temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_provider_kind() -> String {
    "gemini".into()
}
fn default_model() -> String {
    "gemini-1.5-flash".into()
}
fn default_decision_temperature() -> f32 {
    0.2
}
fn default_synthesis_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_provider_timeout() -> u64 {
    120
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            model: default_model(),
            api_key: None,
            api_url: None,
            decision_temperature: default_decision_temperature(),
            synthesis_temperature: default_synthesis_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("kind", &self.kind)
            .field("model", &self.model)
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("decision_temperature", &self.decision_temperature)
            .field("synthesis_temperature", &self.synthesis_temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// How two capability calls are compared for duplicate suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateDetection {
    /// Argument values compared as-is (key order never matters).
    Exact,
    /// Strings trimmed and lower-cased, numbers compared numerically.
    #[default]
    Normalized,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Step ceiling; the loop synthesizes once this many steps are recorded
    #[serde(default = "default_max_steps")]
    pub max_steps: usize,

    /// Extra attempts after a failed reasoning call
    #[serde(default = "default_decision_retries")]
    pub decision_retries: u32,

    /// Linear backoff per retry attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default)]
    pub duplicate_detection: DuplicateDetection,

    /// Capacity of the channel between the loop and the transport
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

fn default_max_steps() -> usize {
    6
}
fn default_decision_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    250
}
fn default_event_buffer() -> usize {
    64
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            decision_retries: default_decision_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            duplicate_detection: DuplicateDetection::default(),
            event_buffer: default_event_buffer(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitiesConfig {
    /// Per-call timeout for external capability requests
    #[serde(default = "default_capability_timeout")]
    pub timeout_secs: u64,

    /// Result cache lifetime; 0 disables caching
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// Summary length when `wikipedia_search` is called without `sentences`
    #[serde(default = "default_sentences")]
    pub default_sentences: u32,

    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,

    #[serde(default = "default_forecast_url")]
    pub forecast_url: String,

    #[serde(default = "default_exchange_url")]
    pub exchange_url: String,

    #[serde(default = "default_wikipedia_url")]
    pub wikipedia_url: String,
}

fn default_capability_timeout() -> u64 {
    10
}
fn default_cache_ttl() -> u64 {
    300
}
fn default_sentences() -> u32 {
    3
}
fn default_geocoding_url() -> String {
    "https://geocoding-api.open-meteo.com/v1/search".into()
}
fn default_forecast_url() -> String {
    "https://api.open-meteo.com/v1/forecast".into()
}
fn default_exchange_url() -> String {
    "https://api.exchangerate-api.com/v4/latest".into()
}
fn default_wikipedia_url() -> String {
    "https://en.wikipedia.org".into()
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_capability_timeout(),
            cache_ttl_secs: default_cache_ttl(),
            default_sentences: default_sentences(),
            geocoding_url: default_geocoding_url(),
            forecast_url: default_forecast_url(),
            exchange_url: default_exchange_url(),
            wikipedia_url: default_wikipedia_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Requests per client per minute; 0 disables the limiter
    #[serde(default = "default_rate_limit")]
    pub rate_limit_per_minute: u32,

    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,

    #[serde(default = "default_true")]
    pub security_headers: bool,
}

fn default_port() -> u16 {
    8000
}
fn default_host() -> String {
    "127.0.0.1".into()
}
fn default_rate_limit() -> u32 {
    60
}
fn default_allowed_origins() -> Vec<String> {
    vec!["http://localhost:3000".into()]
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            rate_limit_per_minute: default_rate_limit(),
            allowed_origins: default_allowed_origins(),
            security_headers: true,
        }
    }
}

/// Upper bound accepted for `agent.max_steps`.
pub const MAX_STEP_CEILING: usize = 32;

/// Upper bound accepted for `agent.decision_retries`.
pub const MAX_DECISION_RETRIES: u32 = 10;

/// Upper bound accepted for `agent.retry_backoff_ms`.
pub const MAX_RETRY_BACKOFF_MS: u64 = 60_000;

impl AppConfig {
    /// Load configuration from the default path (~/.wayfarer/config.toml).
    ///
    /// Also checks environment variables for API keys:
    /// - `WAYFARER_API_KEY` (highest priority)
    /// - `GEMINI_API_KEY`
    /// - `OPENAI_API_KEY`
    /// - `OPENROUTER_API_KEY`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides through `lookup`, then re-validate.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup("WAYFARER_API_KEY")
                .or_else(|| lookup("GEMINI_API_KEY"))
                .or_else(|| lookup("OPENAI_API_KEY"))
                .or_else(|| lookup("OPENROUTER_API_KEY"));
        }

        if let Some(kind) = lookup("WAYFARER_PROVIDER") {
            self.provider.kind = kind;
        }

        if let Some(model) = lookup("WAYFARER_MODEL") {
            self.provider.model = model;
        }

        if let Some(steps) = lookup("WAYFARER_MAX_STEPS") {
            self.agent.max_steps = steps.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!(
                    "WAYFARER_MAX_STEPS must be a positive integer, got '{steps}'"
                ))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".wayfarer")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("decision_temperature", self.provider.decision_temperature),
            ("synthesis_temperature", self.provider.synthesis_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(ConfigError::ValidationError(format!(
                    "provider.{name} must be between 0.0 and 2.0"
                )));
            }
        }

        if self.agent.max_steps == 0 || self.agent.max_steps > MAX_STEP_CEILING {
            return Err(ConfigError::ValidationError(format!(
                "agent.max_steps must be between 1 and {MAX_STEP_CEILING}"
            )));
        }

        if self.agent.decision_retries > MAX_DECISION_RETRIES {
            return Err(ConfigError::ValidationError(format!(
                "agent.decision_retries must be at most {MAX_DECISION_RETRIES}"
            )));
        }

        if self.agent.retry_backoff_ms > MAX_RETRY_BACKOFF_MS {
            return Err(ConfigError::ValidationError(format!(
                "agent.retry_backoff_ms must be at most {MAX_RETRY_BACKOFF_MS}"
            )));
        }

        if self.agent.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "agent.event_buffer must be > 0".into(),
            ));
        }

        if self.provider.kind == "custom" && self.provider.api_url.is_none() {
            return Err(ConfigError::ValidationError(
                "provider.api_url is required when provider.kind = \"custom\"".into(),
            ));
        }

        Ok(())
    }

    /// Check if an API key is available (from config or environment).
    pub fn has_api_key(&self) -> bool {
        self.provider.api_key.is_some()
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
