//! Configuration for the lesson generator, provider and HTTP service.
//!
//! Loaded from `lingo.json`. Every field has a default, so a missing file or
//! a partial file is fine. The provider API key is never read from the file;
//! only the name of the environment variable holding it.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{GeneratorError, Result};

/// The default config file name.
pub const CONFIG_FILE_NAME: &str = "lingo.json";

/// Default number of whole-lesson attempts.
const fn default_max_attempts() -> u32 {
    3
}

/// Default per-attempt timeout in seconds.
const fn default_attempt_timeout() -> u64 {
    60
}

/// Default OpenAI-compatible base URL.
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

/// Default model.
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Default sampling temperature.
const fn default_temperature() -> f32 {
    0.7
}

/// Default environment variable holding the API key.
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default HTTP port.
const fn default_port() -> u16 {
    3000
}

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Retry loop settings.
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Content provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// HTTP service settings.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Retry loop settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorConfig {
    /// Maximum number of whole-lesson provider calls per invocation.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Timeout for a single provider call, in seconds.
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout_secs: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            attempt_timeout_secs: default_attempt_timeout(),
        }
    }
}

impl GeneratorConfig {
    /// Returns the per-attempt timeout as a [`Duration`].
    #[must_use]
    pub const fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// OpenAI-compatible provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Base URL; `/chat/completions` is appended.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Name of the environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            temperature: default_temperature(),
            api_key_env: default_api_key_env(),
        }
    }
}

/// HTTP service settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

impl Config {
    /// Loads configuration from `lingo.json` in the current working directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but is invalid.
    pub fn load() -> Result<Self> {
        let current_dir = std::env::current_dir().map_err(|e| {
            GeneratorError::config_parse(
                "<current directory>",
                format!("cannot determine current directory: {e}"),
            )
        })?;
        Self::load_from_dir(&current_dir)
    }

    /// Loads configuration from `lingo.json` in the given directory.
    pub fn load_from_dir(dir: &Path) -> Result<Self> {
        Self::load_from_file(&dir.join(CONFIG_FILE_NAME))
    }

    /// Loads configuration from a specific file path.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::ConfigParseError` if the file cannot be read or
    /// is not valid JSON, and `GeneratorError::ConfigValidationError` if a
    /// value is out of range.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let config = Self::default();
                config.validate()?;
                return Ok(config);
            }
            Err(e) => {
                return Err(GeneratorError::config_parse(
                    path,
                    format!("failed to read file: {e}"),
                ));
            }
        };

        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| GeneratorError::config_parse(path, e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `GeneratorError::ConfigValidationError` if any check fails.
    pub fn validate(&self) -> Result<()> {
        if self.generator.max_attempts == 0 {
            return Err(GeneratorError::config_validation(
                "generator.maxAttempts must be greater than 0",
                "Set generator.maxAttempts to at least 1 in your lingo.json",
            ));
        }

        if self.generator.attempt_timeout_secs == 0 {
            return Err(GeneratorError::config_validation(
                "generator.attemptTimeoutSecs must be greater than 0",
                "Set generator.attemptTimeoutSecs to at least 1 second in your lingo.json",
            ));
        }

        if self.provider.base_url.trim().is_empty() {
            return Err(GeneratorError::config_validation(
                "provider.baseUrl must not be empty",
                "Provide the provider's base URL, e.g. https://api.openai.com/v1",
            ));
        }

        if self.provider.model.trim().is_empty() {
            return Err(GeneratorError::config_validation(
                "provider.model must not be empty",
                "Provide a model name in your lingo.json",
            ));
        }

        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(GeneratorError::config_validation(
                format!(
                    "provider.temperature must be between 0 and 2 (got {})",
                    self.provider.temperature
                ),
                "Use a temperature such as 0.7",
            ));
        }

        if self.provider.api_key_env.trim().is_empty() {
            return Err(GeneratorError::config_validation(
                "provider.apiKeyEnv must not be empty",
                "Name the environment variable holding your API key, e.g. OPENAI_API_KEY",
            ));
        }

        if self.server.port == 0 {
            return Err(GeneratorError::config_validation(
                "server.port must be greater than 0",
                "Set server.port to a free port such as 3000",
            ));
        }

        Ok(())
    }
}
