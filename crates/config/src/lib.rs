//! Configuration loading, validation, and management for ChatRelay.
//!
//! Loads configuration from `~/.chatrelay/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chatrelay_core::Language;

/// The root configuration structure.
///
/// Maps directly to `~/.chatrelay/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Language for users who never picked one
    #[serde(default)]
    pub default_language: Language,

    /// Allow-list of user IDs. Empty = deny all. ["*"] = allow all.
    #[serde(default)]
    pub allowed_users: Vec<String>,

    /// Ordered backend pool; index 0 is every new session's first choice
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    #[serde(default)]
    pub moderation: ModerationConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub context: ContextConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub prompt: PromptConfig,

    #[serde(default)]
    pub audit: AuditConfig,

    /// Catalog overrides: language code → message key → text
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub messages: HashMap<String, HashMap<String, String>>,
}

fn default_backends() -> Vec<BackendConfig> {
    vec![BackendConfig::default()]
}

/// Wire protocol spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hugging Face Inference API text generation
    Huggingface,
    /// Any `/chat/completions` endpoint (OpenAI, OpenRouter, Ollama, vLLM…)
    OpenaiCompat,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub name: String,

    pub kind: BackendKind,

    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    pub model: String,

    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
}

fn default_max_new_tokens() -> u32 {
    512
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            name: "mixtral".into(),
            kind: BackendKind::Huggingface,
            api_url: "https://api-inference.huggingface.co/models".into(),
            api_key: None,
            model: "mistralai/Mixtral-8x7B-Instruct-v0.1".into(),
            max_new_tokens: default_max_new_tokens(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_new_tokens", &self.max_new_tokens)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    /// Maximum message length in characters
    #[serde(default = "default_max_length")]
    pub max_length: usize,

    /// Case-insensitive substrings that get a message rejected
    #[serde(default)]
    pub banned_terms: Vec<String>,
}

fn default_max_length() -> usize {
    500
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            max_length: default_max_length(),
            banned_terms: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_per_attempt_timeout_secs")]
    pub per_attempt_timeout_secs: u64,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_base_delay_ms() -> u64 {
    2000
}
fn default_backoff_factor() -> f64 {
    2.0
}
fn default_per_attempt_timeout_secs() -> u64 {
    30
}

impl RetryConfig {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.per_attempt_timeout_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            backoff_factor: default_backoff_factor(),
            per_attempt_timeout_secs: default_per_attempt_timeout_secs(),
        }
    }
}

/// What to do with a newest turn that alone exceeds the trim bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OversizePolicy {
    /// Keep the turn whole
    #[default]
    Keep,
    /// Keep only its first `max_chars` characters
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Character budget for history sent to a backend
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,

    #[serde(default)]
    pub oversize_turn: OversizePolicy,
}

fn default_max_chars() -> usize {
    4000
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            oversize_turn: OversizePolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Whether a reset also restores `default_language`
    #[serde(default)]
    pub reset_language: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Leading system line; `{language}` expands to the user's language name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Entries kept in memory before the oldest are dropped
    #[serde(default = "default_audit_max_entries")]
    pub max_entries: usize,
}

fn default_audit_max_entries() -> usize {
    1000
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            max_entries: default_audit_max_entries(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path, then apply environment
    /// variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_env(&Self::config_path())
    }

    /// Like [`AppConfig::load`], for an explicit file.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
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

    /// Apply overrides from an environment lookup.
    ///
    /// - `CHATRELAY_API_KEY`, then `HF_API_TOKEN`: key for backends without one
    /// - `CHATRELAY_ALLOWED_USERS`: comma-separated allow-list (replaces the file's)
    /// - `CHATRELAY_LANGUAGE`: default language
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let api_key = lookup("CHATRELAY_API_KEY").or_else(|| lookup("HF_API_TOKEN"));
        if let Some(key) = api_key {
            for backend in self.backends.iter_mut().filter(|b| b.api_key.is_none()) {
                backend.api_key = Some(key.clone());
            }
        }

        if let Some(users) = lookup("CHATRELAY_ALLOWED_USERS") {
            self.allowed_users = users
                .split(',')
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(code) = lookup("CHATRELAY_LANGUAGE") {
            match Language::parse(&code) {
                Some(language) => self.default_language = language,
                None => tracing::warn!(language = %code, "Ignoring unknown CHATRELAY_LANGUAGE"),
            }
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".chatrelay")
    }

    /// Default configuration file path.
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backends.is_empty() {
            return Err(ConfigError::ValidationError(
                "at least one backend must be configured".into(),
            ));
        }

        if let Some(b) = self.backends.iter().find(|b| b.api_url.trim().is_empty()) {
            return Err(ConfigError::ValidationError(format!(
                "backend '{}' has an empty api_url",
                b.name
            )));
        }

        if self.retry.max_attempts < 1 {
            return Err(ConfigError::ValidationError(
                "retry.max_attempts must be >= 1".into(),
            ));
        }

        if !self.retry.backoff_factor.is_finite() || self.retry.backoff_factor < 1.0 {
            return Err(ConfigError::ValidationError(
                "retry.backoff_factor must be a finite number >= 1.0".into(),
            ));
        }

        if self.retry.per_attempt_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "retry.per_attempt_timeout_secs must be > 0".into(),
            ));
        }

        if self.context.max_chars == 0 {
            return Err(ConfigError::ValidationError(
                "context.max_chars must be > 0".into(),
            ));
        }

        if self.moderation.max_length == 0 {
            return Err(ConfigError::ValidationError(
                "moderation.max_length must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `init`).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_language: Language::default(),
            allowed_users: Vec::new(),
            backends: default_backends(),
            moderation: ModerationConfig::default(),
            retry: RetryConfig::default(),
            context: ContextConfig::default(),
            session: SessionConfig::default(),
            prompt: PromptConfig::default(),
            audit: AuditConfig::default(),
            messages: HashMap::new(),
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
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].kind, BackendKind::Huggingface);
        assert_eq!(config.moderation.max_length, 500);
        assert_eq!(config.retry.max_attempts, 3);
        assert!(config.allowed_users.is_empty());
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backends[0].model, config.backends[0].model);
        assert_eq!(parsed.context.max_chars, config.context.max_chars);
    }

    #[test]
    fn parses_full_file() {
        let toml_str = r#"
default_language = "ar"
allowed_users = ["1001", "1002"]

[[backends]]
name = "primary"
kind = "openai_compat"
api_url = "https://openrouter.ai/api/v1"
model = "mistralai/mixtral-8x7b-instruct"

[[backends]]
name = "fallback"
kind = "huggingface"
api_url = "https://api-inference.huggingface.co/models"
model = "HuggingFaceH4/zephyr-7b-beta"
max_new_tokens = 256

[moderation]
max_length = 300
banned_terms = ["hack", "crack"]

[retry]
max_attempts = 2
base_delay_ms = 500

[context]
max_chars = 1200
oversize_turn = "truncate"

[session]
reset_language = true

[prompt]
preamble = "Answer questions about Cinema 4D in {language}."

[messages.en]
ready = "Go ahead."
"#;
        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_language, Language::Ar);
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].kind, BackendKind::OpenaiCompat);
        assert_eq!(config.backends[0].max_new_tokens, 512);
        assert_eq!(config.backends[1].max_new_tokens, 256);
        assert_eq!(config.retry.max_attempts, 2);
        assert!((config.retry.backoff_factor - 2.0).abs() < f64::EPSILON);
        assert_eq!(config.retry.base_delay(), Duration::from_millis(500));
        assert_eq!(config.context.oversize_turn, OversizePolicy::Truncate);
        assert!(config.session.reset_language);
        assert_eq!(config.messages["en"]["ready"], "Go ahead.");
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn shrinking_backoff_rejected() {
        let mut config = AppConfig::default();
        config.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());
        config.retry.backoff_factor = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn infinite_backoff_rejected() {
        let mut config = AppConfig::default();
        config.retry.backoff_factor = f64::INFINITY;
        assert!(config.validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[retry]\nbackoff_factor = inf\n").unwrap();
        assert!(matches!(
            AppConfig::load_from(&path),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn many_attempts_accepted() {
        let mut config = AppConfig::default();
        config.retry.max_attempts = 100;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_backend_list_rejected() {
        let config = AppConfig {
            backends: vec![],
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_trim_bound_rejected() {
        let mut config = AppConfig::default();
        config.context.max_chars = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().backends.len(), 1);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "allowed_users = [\"42\"]\n[retry]\nmax_attempts = 5\n").unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.allowed_users, vec!["42".to_string()]);
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn invalid_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retry = 7").unwrap();

        match AppConfig::load_from(&path) {
            Err(ConfigError::ParseError { .. }) => {}
            other => panic!("Expected ParseError, got: {other:?}"),
        }
    }

    #[test]
    fn env_overrides() {
        let mut config = AppConfig::default();
        config.backends.push(BackendConfig {
            name: "keyed".into(),
            api_key: Some("own-key".into()),
            ..BackendConfig::default()
        });

        let env: HashMap<&str, &str> = HashMap::from([
            ("HF_API_TOKEN", "hf_token"),
            ("CHATRELAY_ALLOWED_USERS", " 7, 8 ,,9"),
            ("CHATRELAY_LANGUAGE", "ar"),
        ]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.backends[0].api_key.as_deref(), Some("hf_token"));
        assert_eq!(config.backends[1].api_key.as_deref(), Some("own-key"));
        assert_eq!(config.allowed_users, vec!["7", "8", "9"]);
        assert_eq!(config.default_language, Language::Ar);
    }

    #[test]
    fn chatrelay_key_wins_over_hf_token() {
        let mut config = AppConfig::default();
        let env: HashMap<&str, &str> =
            HashMap::from([("HF_API_TOKEN", "hf"), ("CHATRELAY_API_KEY", "relay")]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.backends[0].api_key.as_deref(), Some("relay"));
    }

    #[test]
    fn debug_redacts_api_keys() {
        let backend = BackendConfig {
            api_key: Some("sk-secret".into()),
            ..BackendConfig::default()
        };
        let debug = format!("{backend:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("Mixtral"));
        assert!(toml_str.contains("max_attempts"));
    }
}
