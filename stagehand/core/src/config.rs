//! Configuration
//!
//! Settings resolve in three layers, later layers winning:
//!
//! 1. Built-in defaults (local Ollama, 30 chars/sec reveal).
//! 2. A TOML file at `$XDG_CONFIG_HOME/stagehand/stagehand.toml`, or an
//!    explicit path.
//! 3. `STAGEHAND_*` environment variables.
//!
//! The file shape is all-optional; anything absent keeps the value from the
//! layer below:
//!
//! ```toml
//! bot_name = "Ada"
//!
//! [provider]
//! kind = "ollama"
//! api_url = "http://localhost:11434"
//! model = "llama3.2"
//! temperature = 0.8
//!
//! [writer]
//! reveal_rate = 30.0
//! ```

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Provider kinds [`StagehandConfig::validate`] accepts.
pub const KNOWN_PROVIDERS: [&str; 4] = ["echo", "scripted", "ollama", "mistral"];

/// Why configuration could not be loaded.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path that failed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid TOML for the expected shape.
    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    /// The resolved values are out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    ValidationError(String),
}

// ============================================================================
// File shape
// ============================================================================

/// The on-disk TOML shape; every field optional.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StagehandToml {
    /// Character name, used both as persona and transcript speaker.
    pub bot_name: Option<String>,
    /// `[provider]` section.
    pub provider: ProviderToml,
    /// `[writer]` section.
    pub writer: WriterToml,
}

/// The `[provider]` file section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderToml {
    /// Backend kind; see [`KNOWN_PROVIDERS`].
    pub kind: Option<String>,
    /// Backend base URL.
    pub api_url: Option<String>,
    /// API key, for backends that need one.
    pub api_key: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: Option<f64>,
    /// Whole-request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// The `[writer]` file section.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterToml {
    /// Characters revealed per second.
    pub reveal_rate: Option<f64>,
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Fully resolved settings.
#[derive(Clone, Debug)]
pub struct StagehandConfig {
    /// Character name.
    pub bot_name: String,
    /// Backend settings.
    pub provider: ProviderConfig,
    /// Characters revealed per second.
    pub reveal_rate: f64,
}

/// Resolved backend settings.
#[derive(Clone, Debug)]
pub struct ProviderConfig {
    /// Backend kind.
    pub kind: String,
    /// Backend base URL.
    pub api_url: String,
    /// API key; may stay empty for local backends.
    pub api_key: String,
    /// Model name.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Whole-request timeout.
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: "ollama".to_string(),
            api_url: "http://localhost:11434".to_string(),
            api_key: String::new(),
            model: "llama3.2".to_string(),
            temperature: 0.8,
            timeout: Duration::from_secs(300),
        }
    }
}

impl Default for StagehandConfig {
    fn default() -> Self {
        Self {
            bot_name: "Bot".to_string(),
            provider: ProviderConfig::default(),
            reveal_rate: 30.0,
        }
    }
}

/// Default config file location under the user's config directory.
#[must_use]
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("stagehand").join("stagehand.toml"))
}

impl StagehandConfig {
    /// Load from the default path (if it exists), apply environment
    /// overrides, and validate.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match default_config_path() {
            Some(path) if path.exists() => Self::load_from_path(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Load and validate one specific file, over defaults.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        let file: StagehandToml = toml::from_str(&raw)?;
        let mut config = Self::default();
        config.merge(file);
        config.validate()?;
        Ok(config)
    }

    fn merge(&mut self, file: StagehandToml) {
        if let Some(bot_name) = file.bot_name {
            self.bot_name = bot_name;
        }
        if let Some(kind) = file.provider.kind {
            self.provider.kind = kind;
        }
        if let Some(api_url) = file.provider.api_url {
            self.provider.api_url = api_url;
        }
        if let Some(api_key) = file.provider.api_key {
            self.provider.api_key = api_key;
        }
        if let Some(model) = file.provider.model {
            self.provider.model = model;
        }
        if let Some(temperature) = file.provider.temperature {
            self.provider.temperature = temperature;
        }
        if let Some(secs) = file.provider.timeout_secs {
            self.provider.timeout = Duration::from_secs(secs);
        }
        if let Some(reveal_rate) = file.writer.reveal_rate {
            self.reveal_rate = reveal_rate;
        }
    }

    /// Apply `STAGEHAND_*` overrides via a lookup function, so tests can
    /// pass a map instead of touching the process environment.
    fn apply_overrides(&mut self, get: impl Fn(&str) -> Option<String>) {
        if let Some(value) = get("STAGEHAND_BOT_NAME") {
            self.bot_name = value;
        }
        if let Some(value) = get("STAGEHAND_PROVIDER") {
            self.provider.kind = value;
        }
        if let Some(value) = get("STAGEHAND_API_URL") {
            self.provider.api_url = value;
        }
        if let Some(value) = get("STAGEHAND_API_KEY") {
            self.provider.api_key = value;
        }
        if let Some(value) = get("STAGEHAND_MODEL") {
            self.provider.model = value;
        }
        if let Some(value) = get("STAGEHAND_TEMPERATURE") {
            match value.parse() {
                Ok(parsed) => self.provider.temperature = parsed,
                Err(_) => warn!(%value, "ignoring unparsable STAGEHAND_TEMPERATURE"),
            }
        }
        if let Some(value) = get("STAGEHAND_TIMEOUT_SECS") {
            match value.parse() {
                Ok(parsed) => self.provider.timeout = Duration::from_secs(parsed),
                Err(_) => warn!(%value, "ignoring unparsable STAGEHAND_TIMEOUT_SECS"),
            }
        }
        if let Some(value) = get("STAGEHAND_REVEAL_RATE") {
            match value.parse() {
                Ok(parsed) => self.reveal_rate = parsed,
                Err(_) => warn!(%value, "ignoring unparsable STAGEHAND_REVEAL_RATE"),
            }
        }
    }

    /// Check ranges and cross-field requirements.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !KNOWN_PROVIDERS.contains(&self.provider.kind.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "unknown provider kind '{}', expected one of {KNOWN_PROVIDERS:?}",
                self.provider.kind
            )));
        }
        if self.provider.api_url.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "provider api_url must not be empty".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "temperature {} out of range 0.0..=2.0",
                self.provider.temperature
            )));
        }
        if self.provider.kind == "mistral" && self.provider.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "the mistral provider requires an api_key".to_string(),
            ));
        }
        if !self.reveal_rate.is_finite() || self.reveal_rate <= 0.0 {
            return Err(ConfigError::ValidationError(format!(
                "reveal_rate {} must be a positive number",
                self.reveal_rate
            )));
        }
        if self.bot_name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "bot_name must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write as _;

    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    use super::*;

    fn write_config(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        StagehandConfig::default().validate().unwrap();
    }

    #[test]
    fn file_values_override_defaults() {
        let file = write_config(
            r#"
            bot_name = "Ada"

            [provider]
            kind = "echo"
            temperature = 0.3

            [writer]
            reveal_rate = 55.0
            "#,
        );
        let config = StagehandConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.bot_name, "Ada");
        assert_eq!(config.provider.kind, "echo");
        assert_eq!(config.provider.temperature, 0.3);
        assert_eq!(config.reveal_rate, 55.0);
        // Untouched fields keep their defaults.
        assert_eq!(config.provider.api_url, "http://localhost:11434");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("typo_field = true\n");
        assert!(matches!(
            StagehandConfig::load_from_path(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let result = StagehandConfig::load_from_path(Path::new("/nonexistent/stagehand.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut config = StagehandConfig::default();
        config.apply_overrides(|key| match key {
            "STAGEHAND_PROVIDER" => Some("scripted".to_string()),
            "STAGEHAND_REVEAL_RATE" => Some("120".to_string()),
            "STAGEHAND_TEMPERATURE" => Some("not-a-number".to_string()),
            _ => None,
        });
        assert_eq!(config.provider.kind, "scripted");
        assert_eq!(config.reveal_rate, 120.0);
        // Unparsable values are ignored, not fatal.
        assert_eq!(config.provider.temperature, 0.8);
    }

    #[test]
    fn validation_catches_bad_values() {
        let mut config = StagehandConfig::default();
        config.provider.kind = "imaginary".to_string();
        assert!(config.validate().is_err());

        let mut config = StagehandConfig::default();
        config.provider.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = StagehandConfig::default();
        config.reveal_rate = 0.0;
        assert!(config.validate().is_err());

        let mut config = StagehandConfig::default();
        config.provider.kind = "mistral".to_string();
        assert!(config.validate().is_err());
        config.provider.api_key = "key".to_string();
        config.validate().unwrap();
    }
}
