//! Configuration loading, validation, and management for ctxweave.
//!
//! Loads configuration from `~/.ctxweave/config.toml` with environment
//! variable overrides. Validates all settings before a pipeline is built.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ctxweave/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Model the context is assembled for
    #[serde(default = "default_model")]
    pub model: String,

    /// Total token budget for the assembled context
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,

    /// Content-injection stages
    #[serde(default)]
    pub injection: InjectionConfig,

    /// Count/token history truncation
    #[serde(default)]
    pub history: HistoryConfig,

    /// Importance-ranked token budget enforcement
    #[serde(default)]
    pub token_truncation: TokenTruncationConfig,

    /// Tool-call/tool-response reordering
    #[serde(default)]
    pub tool_reorder: ToolReorderConfig,
}

fn default_model() -> String {
    "gpt-4o".into()
}
fn default_max_tokens() -> usize {
    8192
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    #[serde(default = "default_true")]
    pub system_role: bool,

    #[serde(default = "default_true")]
    pub history: bool,

    #[serde(default = "default_true")]
    pub knowledge: bool,

    /// Maximum knowledge chunks to inject (None = all)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_knowledge_chunks: Option<usize>,

    /// Chunks below this similarity are skipped
    #[serde(default)]
    pub min_similarity: f32,

    #[serde(default = "default_true")]
    pub user_input: bool,

    /// Template for the new user turn; `{{input}}` is replaced by the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_template: Option<String>,
}

impl Default for InjectionConfig {
    fn default() -> Self {
        Self {
            system_role: true,
            history: true,
            knowledge: true,
            max_knowledge_chunks: None,
            min_similarity: 0.0,
            user_input: true,
            input_template: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Keep at most this many recent non-system messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keep_latest_n: Option<usize>,

    /// Token ceiling for the surviving history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Do not count the newest user turn against `keep_latest_n`
    #[serde(default = "default_true")]
    pub include_new_user_message: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keep_latest_n: Some(default_keep_latest_n()),
            max_tokens: None,
            include_new_user_message: true,
        }
    }
}

fn default_keep_latest_n() -> usize {
    20
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenTruncationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Token ceiling; falls back to the top-level `max_tokens`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<usize>,

    /// Safety buffer subtracted from the ceiling (0.0–1.0)
    #[serde(default = "default_buffer_percentage")]
    pub buffer_percentage: f64,

    #[serde(default = "default_true")]
    pub preserve_system_messages: bool,

    #[serde(default = "default_true")]
    pub preserve_last_user_message: bool,
}

fn default_buffer_percentage() -> f64 {
    0.1
}

impl Default for TokenTruncationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_tokens: None,
            buffer_percentage: default_buffer_percentage(),
            preserve_system_messages: true,
            preserve_last_user_message: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolReorderConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ToolReorderConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl PipelineConfig {
    /// Load configuration from the default path (~/.ctxweave/config.toml).
    ///
    /// Environment overrides (highest priority):
    /// - `CTXWEAVE_MODEL`
    /// - `CTXWEAVE_MAX_TOKENS`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        let mut config = Self::load_from(&config_path)?;
        config.apply_env_overrides()?;
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

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(model) = std::env::var("CTXWEAVE_MODEL") {
            self.model = model;
        }

        if let Ok(raw) = std::env::var("CTXWEAVE_MAX_TOKENS") {
            self.max_tokens = raw.trim().parse().map_err(|_| {
                ConfigError::ValidationError(format!("CTXWEAVE_MAX_TOKENS is not a number: {raw}"))
            })?;
        }

        self.validate()
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ctxweave")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "max_tokens must be greater than 0".into(),
            ));
        }

        let buffer = self.token_truncation.buffer_percentage;
        if !(0.0..1.0).contains(&buffer) {
            return Err(ConfigError::ValidationError(
                "token_truncation.buffer_percentage must be in [0.0, 1.0)".into(),
            ));
        }

        if self.token_truncation.max_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "token_truncation.max_tokens must be greater than 0".into(),
            ));
        }

        if self.history.max_tokens == Some(0) {
            return Err(ConfigError::ValidationError(
                "history.max_tokens must be greater than 0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.injection.min_similarity) {
            return Err(ConfigError::ValidationError(
                "injection.min_similarity must be between 0.0 and 1.0".into(),
            ));
        }

        Ok(())
    }

    /// Effective ceiling for the token-based truncator.
    pub fn token_truncation_limit(&self) -> usize {
        self.token_truncation.max_tokens.unwrap_or(self.max_tokens)
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            injection: InjectionConfig::default(),
            history: HistoryConfig::default(),
            token_truncation: TokenTruncationConfig::default(),
            tool_reorder: ToolReorderConfig::default(),
        }
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_tokens, 8192);
        assert_eq!(config.history.keep_latest_n, Some(20));
        assert!((config.token_truncation.buffer_percentage - 0.1).abs() < f64::EPSILON);
        assert!(config.tool_reorder.enabled);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = PipelineConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: PipelineConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.model, config.model);
        assert_eq!(parsed.history.keep_latest_n, config.history.keep_latest_n);
    }

    #[test]
    fn invalid_buffer_rejected() {
        let mut config = PipelineConfig::default();
        config.token_truncation.buffer_percentage = 1.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_budget_rejected() {
        let config = PipelineConfig {
            max_tokens: 0,
            ..PipelineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = PipelineConfig::load_from(Path::new("/nonexistent/config.toml"));
        let config = result.unwrap();
        assert_eq!(config.model, "gpt-4o");
    }

    #[test]
    fn partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
model = "claude-sonnet"
max_tokens = 32000

[history]
keep_latest_n = 8
max_tokens = 16000

[token_truncation]
buffer_percentage = 0.2
preserve_last_user_message = false
"#,
        )
        .unwrap();

        let config = PipelineConfig::load_from(&path).unwrap();
        assert_eq!(config.model, "claude-sonnet");
        assert_eq!(config.history.keep_latest_n, Some(8));
        assert_eq!(config.history.max_tokens, Some(16000));
        assert!(config.history.include_new_user_message);
        assert!(!config.token_truncation.preserve_last_user_message);
        assert!(config.token_truncation.preserve_system_messages);
        assert_eq!(config.token_truncation_limit(), 32000);
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "max_tokens = \"lots\"").unwrap();

        let err = PipelineConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = PipelineConfig::default_toml();
        assert!(toml_str.contains("gpt-4o"));
        assert!(toml_str.contains("[history]"));
        assert!(toml_str.contains("buffer_percentage"));
    }
}
