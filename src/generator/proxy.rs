//! Proxy backend: forwards `{ prompt, settings }` to a server that holds
//! the credential and answers `{ imageUrl }` or `{ error }`.

use super::{build_client, parse_url, GenerationError, ImageGenerator};
use crate::config::ConfigError;
use crate::frame::ImagePayload;
use crate::settings::GenerationSettings;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub struct ProxyGenerator {
    endpoint: Url,
    client: Client,
}

#[derive(Serialize)]
struct ProxyRequest<'a> {
    prompt: &'a str,
    settings: &'a GenerationSettings,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProxyResponse {
    image_url: Option<String>,
    error: Option<String>,
}

impl ProxyGenerator {
    pub fn new(endpoint: &str, connect_timeout: Duration) -> Result<Self, ConfigError> {
        Ok(Self {
            endpoint: parse_url(endpoint)?,
            client: build_client(connect_timeout)?,
        })
    }
}

#[async_trait]
impl ImageGenerator for ProxyGenerator {
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<ImagePayload, GenerationError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&ProxyRequest { prompt, settings })
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;
        let parsed: Option<ProxyResponse> = serde_json::from_str(&body).ok();

        if !status.is_success() {
            let message = parsed
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("Server Error: {}", status.as_u16()));
            return Err(GenerationError::Remote(message));
        }

        let parsed = parsed.ok_or_else(|| {
            GenerationError::MalformedResponse("response body is not JSON".to_string())
        })?;

        match parsed.image_url {
            Some(url) => ImagePayload::parse(url)
                .map_err(|e| GenerationError::MalformedResponse(e.to_string())),
            None => Err(GenerationError::MalformedResponse(
                parsed
                    .error
                    .unwrap_or_else(|| "imageUrl missing from response".to_string()),
            )),
        }
    }

    fn name(&self) -> &str {
        "proxy"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AspectRatio, ModelType};

    #[test]
    fn test_request_body_shape() {
        let settings = GenerationSettings {
            model: ModelType::Flash,
            aspect_ratio: AspectRatio::Cinematic,
            category: "western".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(ProxyRequest {
            prompt: "A dusty saloon",
            settings: &settings,
        })
        .unwrap();

        assert_eq!(body["prompt"], "A dusty saloon");
        assert_eq!(body["settings"]["model"], "gemini-2.5-flash-image");
        // The proxy applies the 21:9 fallback itself
        assert_eq!(body["settings"]["aspectRatio"], "21:9");
        assert_eq!(body["settings"]["category"], "western");
    }

    #[test]
    fn test_response_parsing() {
        let ok: ProxyResponse =
            serde_json::from_str(r#"{"imageUrl":"data:image/png;base64,AAAA"}"#).unwrap();
        assert_eq!(ok.image_url.as_deref(), Some("data:image/png;base64,AAAA"));

        let err: ProxyResponse = serde_json::from_str(r#"{"error":"quota"}"#).unwrap();
        assert!(err.image_url.is_none());
        assert_eq!(err.error.as_deref(), Some("quota"));
    }
}
