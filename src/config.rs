//! Configuration loading.
//!
//! Values come from an optional TOML file overlaid with `STUDY_BUDDY__*`
//! environment variables (`__` separates nesting, e.g.
//! `STUDY_BUDDY__ASSISTANT__MODEL`). The API key may also be given as
//! `STUDY_BUDDY_API_KEY` or `OPENAI_API_KEY`.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::CacheConfig;
use crate::context::ContextBudgets;
use crate::document::StructuringConfig;
use crate::error::{ContextError, Result};

pub const ENV_PREFIX: &str = "STUDY_BUDDY";
pub const API_KEY_VARS: [&str; 2] = ["STUDY_BUDDY_API_KEY", "OPENAI_API_KEY"];

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub assistant: AssistantConfig,
    #[serde(default)]
    pub context: ContextBudgets,
    #[serde(default)]
    pub structuring: StructuringConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Completion API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Base URL of an OpenAI-compatible API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing)]
    pub api_key: Option<SecretString>,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base backoff in milliseconds, doubled per retry
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    #[serde(default = "default_breaker_failures")]
    pub circuit_breaker_failures: usize,

    #[serde(default = "default_breaker_reset")]
    pub circuit_breaker_reset_secs: u64,
}

fn default_api_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> usize {
    800
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    200
}

fn default_breaker_failures() -> usize {
    5
}

fn default_breaker_reset() -> u64 {
    30
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: default_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_ms: default_timeout_ms(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            circuit_breaker_failures: default_breaker_failures(),
            circuit_breaker_reset_secs: default_breaker_reset(),
        }
    }
}

impl AssistantConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn breaker_reset_timeout(&self) -> Duration {
        Duration::from_secs(self.circuit_breaker_reset_secs)
    }

    /// The API key, or a configuration error naming where to set it
    pub fn require_api_key(&self) -> Result<&SecretString> {
        self.api_key.as_ref().ok_or_else(|| {
            ContextError::Configuration(format!(
                "No completion API key configured; set {} or {}",
                API_KEY_VARS[0], API_KEY_VARS[1]
            ))
        })
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Config {
    /// Load from a TOML file with environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let builder = ::config::Config::builder()
            .add_source(::config::File::from(path.as_ref()))
            .add_source(environment());
        Self::finish(builder.build()?.try_deserialize()?, env_lookup)
    }

    /// Parse TOML text, without environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::from_str(toml, ::config::FileFormat::Toml))
            .build()?;
        Self::finish(settings.try_deserialize()?, |_| None)
    }

    /// Load `.env` if present, then read configuration from the environment
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!("Loaded environment from {}", path.display());
        }
        let settings = ::config::Config::builder()
            .add_source(environment())
            .build()?;
        Self::finish(settings.try_deserialize()?, env_lookup)
    }

    fn finish(mut config: Config, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if config.assistant.api_key.is_none() {
            config.assistant.api_key = api_key_from(lookup);
        }
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the core cannot work with
    pub fn validate(&self) -> Result<()> {
        let zero = self.context.zero_budgets();
        if !zero.is_empty() {
            return Err(ContextError::Configuration(format!(
                "Context budgets must be positive: {}",
                zero.join(", ")
            )));
        }
        if !(0.0..=2.0).contains(&self.assistant.temperature) {
            return Err(ContextError::Configuration(format!(
                "Temperature must be within [0, 2], got {}",
                self.assistant.temperature
            )));
        }
        if self.assistant.max_tokens == 0 || self.assistant.timeout_ms == 0 {
            return Err(ContextError::Configuration(
                "max_tokens and timeout_ms must be positive".to_string(),
            ));
        }
        if self.structuring.words_per_page == 0 {
            return Err(ContextError::Configuration(
                "words_per_page must be positive".to_string(),
            ));
        }
        if self.cache.max_documents == 0 {
            return Err(ContextError::Configuration(
                "cache.max_documents must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn environment() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

fn env_lookup(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// First non-blank key among [`API_KEY_VARS`]
fn api_key_from(lookup: impl Fn(&str) -> Option<String>) -> Option<SecretString> {
    API_KEY_VARS
        .iter()
        .filter_map(|name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(SecretString::new)
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.context.visible_chars, 900);
        assert_eq!(config.structuring.words_per_page, 250);
        assert_eq!(config.assistant.timeout(), Duration::from_secs(30));
        assert!(config.assistant.require_api_key().is_err());
    }

    #[test]
    fn test_from_toml_overrides_sections() {
        let config = Config::from_toml_str(
            r#"
            [assistant]
            model = "local-model"
            api_url = "http://localhost:8080/v1"
            api_key = "sk-test"
            temperature = 0.2

            [context]
            visible_chars = 500

            [logging]
            json = true
            "#,
        )
        .unwrap();

        assert_eq!(config.assistant.model, "local-model");
        assert_eq!(config.assistant.max_retries, 2);
        assert_eq!(
            config.assistant.require_api_key().unwrap().expose_secret(),
            "sk-test"
        );
        assert_eq!(config.context.visible_chars, 500);
        assert_eq!(config.context.chapter_chars, 600);
        assert!(config.logging.json);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let err = Config::from_toml_str("[assistant]\ntemperature = 3.5").unwrap_err();
        assert!(matches!(err, ContextError::Configuration(_)));

        let err = Config::from_toml_str("[context]\npreview_chars = 0").unwrap_err();
        assert!(err.to_string().contains("preview_chars"));
    }

    #[test]
    fn test_api_key_lookup_order() {
        let key = api_key_from(|name| match name {
            "STUDY_BUDDY_API_KEY" => Some("  ".to_string()),
            "OPENAI_API_KEY" => Some("sk-openai".to_string()),
            _ => None,
        });
        assert_eq!(key.unwrap().expose_secret(), "sk-openai");
        assert!(api_key_from(|_| None).is_none());
    }

    #[test]
    fn test_api_key_is_not_serialized() {
        let mut config = Config::default();
        config.assistant.api_key = Some(SecretString::new("sk-hidden".to_string()));
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("sk-hidden"));
        assert!(!format!("{:?}", config).contains("sk-hidden"));
    }
}
