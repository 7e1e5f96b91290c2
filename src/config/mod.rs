//! Configuration system for Storyboard
//!
//! Supports loading configuration from:
//! 1. CLI --config argument
//! 2. ~/.config/storyboard/config.{STORYBOARD_ENV}.json
//! 3. Default values
//!
//! Where STORYBOARD_ENV can be: production (default), development, test
//!
//! # Examples
//!
//! ```no_run
//! use storyboard::config::AppConfig;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::load(None)?;
//! println!("Backend: {} ({})", config.backend, config.defaults.model);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variables
//!
//! Environment variables override config file values:
//! - STORYBOARD_BACKEND
//! - STORYBOARD_PROXY_URL
//! - STORYBOARD_GEMINI_URL
//! - STORYBOARD_MODEL
//! - STORYBOARD_ASPECT_RATIO
//! - STORYBOARD_OUTPUT_DIR
//! - API_KEY (default name of the credential variable)

use crate::settings::GenerationSettings;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse config JSON: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    #[error("Missing credential: {0} is not set")]
    MissingCredential(String),
}

/// Which remote image service to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorBackend {
    /// Server-side proxy holding the credential
    #[default]
    Proxy,
    /// Direct calls to the Gemini API with a local credential
    Gemini,
}

impl std::fmt::Display for GeneratorBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Proxy => write!(f, "proxy"),
            Self::Gemini => write!(f, "gemini"),
        }
    }
}

impl std::str::FromStr for GeneratorBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "proxy" => Ok(Self::Proxy),
            "gemini" | "direct" => Ok(Self::Gemini),
            _ => Err(ConfigError::ValidationError(format!(
                "Unknown backend: {}",
                s
            ))),
        }
    }
}

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: GeneratorBackend,

    /// Proxy endpoint accepting `{ prompt, settings }`
    #[serde(default = "default_proxy_url")]
    pub proxy_url: String,

    /// Gemini API base URL
    #[serde(default = "default_gemini_url")]
    pub gemini_url: String,

    /// API key (can be environment variable name like "API_KEY")
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,

    /// Connect timeout in seconds. Generation itself is never timed out.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Settings used when the CLI does not override them
    #[serde(default)]
    pub defaults: GenerationSettings,

    /// Where zip exports are written
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub debug: bool,
}

fn default_proxy_url() -> String {
    "http://localhost:3000/api/generate".to_string()
}

fn default_gemini_url() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_key() -> Option<String> {
    Some("API_KEY".to_string())
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: GeneratorBackend::default(),
            proxy_url: default_proxy_url(),
            gemini_url: default_gemini_url(),
            api_key: default_api_key(),
            connect_timeout_secs: default_connect_timeout(),
            defaults: GenerationSettings::default(),
            output_dir: default_output_dir(),
            debug: false,
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: AppConfig = serde_json::from_str(&content)?;

        config.apply_env_overrides()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration with standard priority:
    /// 1. Explicit path
    /// 2. ~/.config/storyboard/config.{STORYBOARD_ENV}.json
    /// 3. Defaults
    pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit_path {
            if path.exists() {
                tracing::info!("Loading config from: {:?}", path);
                return Self::from_file(path);
            } else {
                return Err(ConfigError::ValidationError(format!(
                    "Config file not found: {:?}",
                    path
                )));
            }
        }

        let env = std::env::var("STORYBOARD_ENV").unwrap_or_else(|_| "production".to_string());

        if let Some(config_dir) = Self::config_dir() {
            let config_path = config_dir.join(format!("config.{}.json", env));

            if config_path.exists() {
                tracing::info!("Loading config from: {:?}", config_path);
                return Self::from_file(&config_path);
            }
        }

        tracing::info!("Using default configuration with environment overrides");
        let mut config = Self::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(backend) = std::env::var("STORYBOARD_BACKEND") {
            self.backend = backend.parse()?;
        }

        if let Ok(url) = std::env::var("STORYBOARD_PROXY_URL") {
            self.proxy_url = url;
        }

        if let Ok(url) = std::env::var("STORYBOARD_GEMINI_URL") {
            self.gemini_url = url;
        }

        if let Ok(model) = std::env::var("STORYBOARD_MODEL") {
            self.defaults.model = model
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("{}", e)))?;
        }

        if let Ok(ratio) = std::env::var("STORYBOARD_ASPECT_RATIO") {
            self.defaults.aspect_ratio = ratio
                .parse()
                .map_err(|e| ConfigError::ValidationError(format!("{}", e)))?;
        }

        if let Ok(dir) = std::env::var("STORYBOARD_OUTPUT_DIR") {
            self.output_dir = PathBuf::from(dir);
        }

        // The API key is resolved on demand via resolve_api_key()
        Ok(())
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.backend {
            GeneratorBackend::Proxy if self.proxy_url.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "proxy_url cannot be empty".to_string(),
                ));
            }
            GeneratorBackend::Gemini if self.gemini_url.is_empty() => {
                return Err(ConfigError::ValidationError(
                    "gemini_url cannot be empty".to_string(),
                ));
            }
            _ => {}
        }

        if self.connect_timeout_secs == 0 {
            return Err(ConfigError::ValidationError(
                "connect_timeout_secs must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Resolve API key from environment variable if needed
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key.as_ref().and_then(|key| {
            if is_env_var_name(key) {
                std::env::var(key).ok().filter(|v| !v.is_empty())
            } else {
                Some(key.clone())
            }
        })
    }

    /// Like `resolve_api_key`, but a missing key is a configuration error
    pub fn require_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_api_key().ok_or_else(|| {
            ConfigError::MissingCredential(
                self.api_key
                    .clone()
                    .unwrap_or_else(|| "api_key".to_string()),
            )
        })
    }

    /// Get the config directory path
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("storyboard"))
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn is_env_var_name(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AspectRatio, ModelType};

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.backend, GeneratorBackend::Proxy);
        assert_eq!(config.defaults.model, ModelType::Flash);
        assert_eq!(config.defaults.aspect_ratio, AspectRatio::Landscape);
    }

    #[test]
    fn test_validation() {
        let mut config = AppConfig::default();
        config.connect_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.proxy_url.clear();
        assert!(config.validate().is_err());

        // An empty proxy URL is irrelevant for the direct backend
        config.backend = GeneratorBackend::Gemini;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("proxy".parse::<GeneratorBackend>().unwrap(), GeneratorBackend::Proxy);
        assert_eq!("Gemini".parse::<GeneratorBackend>().unwrap(), GeneratorBackend::Gemini);
        assert!("dalle".parse::<GeneratorBackend>().is_err());
    }

    #[test]
    fn test_literal_api_key() {
        let mut config = AppConfig::default();
        config.api_key = Some("sk-literal-key".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("sk-literal-key"));
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let mut config = AppConfig::default();
        config.api_key = Some("STORYBOARD_TEST_UNSET_KEY_9F2A".to_string());
        assert!(matches!(
            config.require_api_key(),
            Err(ConfigError::MissingCredential(name)) if name == "STORYBOARD_TEST_UNSET_KEY_9F2A"
        ));

        config.api_key = None;
        assert!(config.require_api_key().is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "backend": "gemini", "defaults": { "aspectRatio": "9:16", "theme": "noir" } }"#,
        )
        .unwrap();
        assert_eq!(config.backend, GeneratorBackend::Gemini);
        assert_eq!(config.defaults.aspect_ratio, AspectRatio::Portrait);
        assert_eq!(config.defaults.theme, "noir");
        assert_eq!(config.connect_timeout_secs, 10);
        assert_eq!(config.api_key.as_deref(), Some("API_KEY"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.test.json");

        let mut config = AppConfig::default();
        config.backend = GeneratorBackend::Gemini;
        config.defaults.global_color_palette = "sepia".to_string();
        config.save_to_file(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let parsed: AppConfig = serde_json::from_str(&content).unwrap();
        assert_eq!(parsed.backend, GeneratorBackend::Gemini);
        assert_eq!(parsed.defaults.global_color_palette, "sepia");
    }
}
