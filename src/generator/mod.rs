//! Remote image generator abstraction
//!
//! Supports:
//! - Proxy (server-side endpoint that holds the credential)
//! - Gemini (direct calls with a local API key)
//!
//! # Examples
//!
//! ```no_run
//! use storyboard::config::AppConfig;
//! use storyboard::generator::create_generator;
//! use storyboard::settings::GenerationSettings;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let generator = create_generator(&AppConfig::load(None)?)?;
//! let image = generator
//!     .generate("A red cube on a marble table", &GenerationSettings::default())
//!     .await?;
//! println!("{} bytes of {}", image.base64_data().len(), image.mime_type());
//! # Ok(())
//! # }
//! ```

pub mod gemini;
pub mod proxy;

pub use gemini::GeminiGenerator;
pub use proxy::ProxyGenerator;

use crate::config::{AppConfig, ConfigError, GeneratorBackend};
use crate::frame::ImagePayload;
use crate::settings::GenerationSettings;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    /// The generator cannot run at all; fails a whole run up front
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Connection error: {0}")]
    Connection(String),

    /// The service answered with a failure; the message is shown as-is
    #[error("{0}")]
    Remote(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl From<ConfigError> for GenerationError {
    fn from(e: ConfigError) -> Self {
        Self::Configuration(e.to_string())
    }
}

/// Turns a prompt plus settings into an encoded image.
///
/// One call produces one image. Implementations must not retry; a call may
/// block for as long as the service takes.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generate one image
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<ImagePayload, GenerationError>;

    /// Checked once before a run creates any frame
    fn check_configuration(&self, _settings: &GenerationSettings) -> Result<(), GenerationError> {
        Ok(())
    }

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Create an image generator from configuration
pub fn create_generator(config: &AppConfig) -> Result<Box<dyn ImageGenerator>, ConfigError> {
    config.validate()?;
    match config.backend {
        GeneratorBackend::Proxy => Ok(Box::new(ProxyGenerator::new(
            &config.proxy_url,
            connect_timeout(config),
        )?)),
        GeneratorBackend::Gemini => Ok(Box::new(GeminiGenerator::new(
            &config.gemini_url,
            config.require_api_key()?,
            connect_timeout(config),
        )?)),
    }
}

fn connect_timeout(config: &AppConfig) -> Duration {
    Duration::from_secs(config.connect_timeout_secs)
}

/// Shared client construction. Only the connect phase is bounded.
pub(crate) fn build_client(connect_timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .user_agent(format!("storyboard/{}", env!("CARGO_PKG_VERSION")))
        .connect_timeout(connect_timeout)
        .build()
        .map_err(|e| ConfigError::ValidationError(format!("HTTP client: {}", e)))
}

pub(crate) fn parse_url(raw: &str) -> Result<reqwest::Url, ConfigError> {
    reqwest::Url::parse(raw)
        .map_err(|e| ConfigError::ValidationError(format!("Invalid URL {:?}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remote_message_is_verbatim() {
        let err = GenerationError::Remote("Prompt blocked by safety filter".to_string());
        assert_eq!(err.to_string(), "Prompt blocked by safety filter");
        assert!(!matches!(err, GenerationError::Configuration(_)));
    }

    #[test]
    fn test_gemini_without_key_fails_to_build() {
        let config = AppConfig {
            backend: GeneratorBackend::Gemini,
            api_key: Some("STORYBOARD_TEST_UNSET_KEY_41C7".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            create_generator(&config),
            Err(ConfigError::MissingCredential(_))
        ));
    }

    #[test]
    fn test_proxy_builds_without_key() {
        let config = AppConfig {
            api_key: None,
            ..Default::default()
        };
        let generator = create_generator(&config).unwrap();
        assert_eq!(generator.name(), "proxy");
    }

    #[test]
    fn test_invalid_proxy_url() {
        let config = AppConfig {
            proxy_url: "not a url".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
