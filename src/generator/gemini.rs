//! Direct Gemini backend (`models/{model}:generateContent`)

use super::{build_client, parse_url, GenerationError, ImageGenerator};
use crate::config::ConfigError;
use crate::frame::ImagePayload;
use crate::prompt::build_instruction;
use crate::settings::GenerationSettings;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiGenerator {
    base_url: Url,
    api_key: String,
    client: Client,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    image_config: ImageConfig,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ImageConfig {
    aspect_ratio: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

impl GeminiGenerator {
    pub fn new(
        base_url: &str,
        api_key: String,
        connect_timeout: Duration,
    ) -> Result<Self, ConfigError> {
        if api_key.is_empty() {
            return Err(ConfigError::MissingCredential("api_key".to_string()));
        }
        Ok(Self {
            base_url: parse_url(base_url)?,
            api_key,
            client: build_client(connect_timeout)?,
        })
    }

    fn endpoint(&self, settings: &GenerationSettings) -> Result<Url, GenerationError> {
        let path = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.as_str().trim_end_matches('/'),
            settings.model.id()
        );
        Url::parse(&path).map_err(|e| GenerationError::Configuration(e.to_string()))
    }

    fn request_body(prompt: &str, settings: &GenerationSettings) -> GenerateContentRequest {
        GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(build_instruction(prompt, settings)),
                    inline_data: None,
                }],
            }],
            generation_config: GenerationConfig {
                image_config: ImageConfig {
                    aspect_ratio: settings.aspect_ratio.effective().as_str(),
                },
            },
        }
    }

    /// First inline image of the first candidate
    fn extract_image(response: GenerateContentResponse) -> Result<ImagePayload, GenerationError> {
        let inline = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .and_then(|content| {
                content.parts.into_iter().find_map(|part| {
                    part.inline_data
                        .filter(|d| d.data.as_deref().is_some_and(|s| !s.is_empty()))
                })
            })
            .ok_or_else(|| {
                GenerationError::MalformedResponse("No image data returned from Gemini.".to_string())
            })?;

        let mime = inline.mime_type.unwrap_or_else(|| "image/png".to_string());
        let data = inline.data.unwrap_or_default();
        ImagePayload::from_base64(&mime, &data)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl ImageGenerator for GeminiGenerator {
    async fn generate(
        &self,
        prompt: &str,
        settings: &GenerationSettings,
    ) -> Result<ImagePayload, GenerationError> {
        let url = self.endpoint(settings)?;
        tracing::debug!(model = %settings.model, "calling Gemini");

        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(&Self::request_body(prompt, settings))
            .send()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| GenerationError::Connection(e.to_string()))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| format!("Server Error: {}", status.as_u16()));
            return Err(GenerationError::Remote(message));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&body)
            .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;
        Self::extract_image(parsed)
    }

    fn check_configuration(&self, _settings: &GenerationSettings) -> Result<(), GenerationError> {
        if self.api_key.trim().is_empty() {
            return Err(GenerationError::Configuration(
                "API key required for direct Gemini calls".to_string(),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AspectRatio, ModelType};

    fn generator() -> GeminiGenerator {
        GeminiGenerator::new(
            "https://generativelanguage.googleapis.com/",
            "test-key".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_endpoint_uses_model_id() {
        let settings = GenerationSettings {
            model: ModelType::Pro,
            ..Default::default()
        };
        let url = generator().endpoint(&settings).unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[test]
    fn test_request_body_applies_ratio_fallback() {
        let settings = GenerationSettings {
            aspect_ratio: AspectRatio::Cinematic,
            theme: "stormy".to_string(),
            ..Default::default()
        };
        let body = serde_json::to_value(GeminiGenerator::request_body("A lighthouse", &settings))
            .unwrap();

        assert_eq!(body["generationConfig"]["imageConfig"]["aspectRatio"], "16:9");
        let text = body["contents"][0]["parts"][0]["text"].as_str().unwrap();
        assert!(text.contains("Theme / Mood: stormy."));
        assert!(text.ends_with("Subject / Action: A lighthouse"));
        assert!(body["contents"][0]["parts"][0].get("inlineData").is_none());
    }

    #[test]
    fn test_extract_first_inline_image() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[
                {"text":"Here is your image"},
                {"inlineData":{"mimeType":"image/jpeg","data":"aGVsbG8="}}
            ]}}]}"#,
        )
        .unwrap();
        let image = GeminiGenerator::extract_image(response).unwrap();
        assert_eq!(image.as_uri(), "data:image/jpeg;base64,aGVsbG8=");
    }

    #[test]
    fn test_extract_without_image() {
        let response: GenerateContentResponse =
            serde_json::from_str(r#"{"candidates":[{"content":{"parts":[{"text":"no"}]}}]}"#)
                .unwrap();
        let err = GeminiGenerator::extract_image(response).unwrap_err();
        assert_eq!(
            err,
            GenerationError::MalformedResponse("No image data returned from Gemini.".to_string())
        );
    }

    #[test]
    fn test_empty_key_rejected() {
        assert!(GeminiGenerator::new(
            "https://generativelanguage.googleapis.com",
            String::new(),
            Duration::from_secs(5)
        )
        .is_err());
    }
}
